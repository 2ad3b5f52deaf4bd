//! Check engine
//!
//! This module selects rules from configuration, pairs current and against
//! files by path, runs each rule's file-pair handler and aggregates the
//! annotations.

use crate::check::categories::RuleType;
use crate::check::registry::{self, RuleSpec};
use crate::check::types::{Annotation, ResponseWriter};
use crate::error::CheckError;
use crate::loader::SchemaSet;
use crate::resolve::{ProtovalidateResolver, RuleResolver};
use crate::snapshot::FileSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Configuration for breaking change checks, the `breaking` section of a
/// `buf.yaml` file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Rules to enable (if empty, rules enabled by default run)
    #[serde(default, rename = "use", alias = "use_rules")]
    pub use_rules: Vec<String>,
    /// Rules to explicitly disable
    #[serde(default, rename = "except", alias = "except_rules")]
    pub except_rules: Vec<String>,
    /// Files or directories to ignore
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Rule-specific file ignores
    #[serde(default)]
    pub ignore_only: HashMap<String, Vec<String>>,
}

impl CheckConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        #[derive(serde::Deserialize)]
        struct ConfigFile {
            breaking: Option<CheckConfig>,
        }

        let config_file: ConfigFile = serde_yaml::from_str(yaml)?;
        Ok(config_file.breaking.unwrap_or_default())
    }

    /// Whether a rule runs under this configuration
    pub fn is_rule_enabled(&self, rule: &RuleSpec) -> bool {
        if self.except_rules.iter().any(|id| id == rule.id) {
            return false;
        }
        if !self.use_rules.is_empty() {
            return self.use_rules.iter().any(|id| id == rule.id);
        }
        rule.default
    }

    /// Whether `path` is ignored for `rule_id`
    pub fn is_ignored(&self, rule_id: &str, path: &str) -> bool {
        let matches = |entries: &[String]| entries.iter().any(|entry| path_matches(entry, path));
        matches(self.ignore.as_slice())
            || self
                .ignore_only
                .get(rule_id)
                .is_some_and(|entries| matches(entries.as_slice()))
    }
}

/// An ignore entry matches the path itself or any path beneath it when it
/// names a directory. A trailing `/**` is accepted and means the same.
fn path_matches(entry: &str, path: &str) -> bool {
    let entry = entry.trim_end_matches("/**").trim_end_matches('/');
    if entry.is_empty() || entry == "." {
        return true;
    }
    path == entry
        || path
            .strip_prefix(entry)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Result of a check invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckResult {
    /// All annotations, in rule then file then declaration order
    pub annotations: Vec<Annotation>,
    /// Whether any annotations were produced
    pub has_annotations: bool,
    /// Number of annotations per rule
    pub summary: HashMap<String, usize>,
    /// Rules that were executed
    pub executed_rules: Vec<String>,
    /// Number of (current, against) file pairs compared
    pub checked_file_pairs: usize,
}

impl CheckResult {
    /// Create a new empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Add annotations to the result
    pub fn add_annotations(&mut self, annotations: Vec<Annotation>) {
        self.has_annotations = !annotations.is_empty() || self.has_annotations;

        for annotation in &annotations {
            *self.summary.entry(annotation.rule_id.clone()).or_insert(0) += 1;
        }

        self.annotations.extend(annotations);
    }

    /// Mark a rule as executed successfully
    pub fn mark_rule_executed(&mut self, rule_id: &str) {
        if !self.executed_rules.iter().any(|id| id == rule_id) {
            self.executed_rules.push(rule_id.to_string());
        }
    }
}

/// Runs breaking rules over schema versions
#[derive(Debug, Default)]
pub struct CheckEngine {
    // Engine is stateless; rules come from the registry
}

impl CheckEngine {
    /// Create a new check engine
    pub fn new() -> Self {
        Self {}
    }

    /// Rules a breaking check runs under `config`
    pub fn selected_rules(&self, config: &CheckConfig) -> Vec<&'static RuleSpec> {
        registry::rule_specs()
            .iter()
            .filter(|rule| rule.rule_type == RuleType::Breaking)
            .filter(|rule| config.is_rule_enabled(rule))
            .collect()
    }

    /// Checks every current file against the against file with the same path.
    /// Files present on one side only are skipped.
    pub fn check(
        &self,
        current: &SchemaSet,
        against: &SchemaSet,
        config: &CheckConfig,
    ) -> Result<CheckResult, CheckError> {
        let pairs: Vec<(&FileSnapshot, &FileSnapshot)> = current
            .files
            .iter()
            .filter_map(|file| against.file(&file.path).map(|against_file| (file, against_file)))
            .collect();

        debug!(
            current_files = current.files.len(),
            against_files = against.files.len(),
            pairs = pairs.len(),
            "paired files by path"
        );

        self.run(&resolver_for(current, against), &pairs, config)
    }

    /// Checks one explicit file pair, regardless of the files' paths.
    pub fn check_file_pair(
        &self,
        current: &SchemaSet,
        current_path: &str,
        against: &SchemaSet,
        against_path: &str,
        config: &CheckConfig,
    ) -> anyhow::Result<CheckResult> {
        use anyhow::Context;

        let file = current
            .file(current_path)
            .with_context(|| format!("File '{current_path}' not found in current schema"))?;
        let against_file = against
            .file(against_path)
            .with_context(|| format!("File '{against_path}' not found in against schema"))?;

        Ok(self.run(&resolver_for(current, against), &[(file, against_file)], config)?)
    }

    /// Runs the selected rules over already paired files with `resolver`.
    pub fn run(
        &self,
        resolver: &dyn RuleResolver,
        pairs: &[(&FileSnapshot, &FileSnapshot)],
        config: &CheckConfig,
    ) -> Result<CheckResult, CheckError> {
        let mut result = CheckResult::new();
        result.checked_file_pairs = pairs.len();

        for rule in self.selected_rules(config) {
            let mut writer = ResponseWriter::new(rule.id);

            for (file, against_file) in pairs {
                if config.is_ignored(rule.id, &file.path) {
                    debug!(rule = rule.id, file = %file.path, "file ignored by configuration");
                    continue;
                }

                debug!(rule = rule.id, file = %file.path, against = %against_file.path, "checking file pair");
                (rule.handler)(resolver, &mut writer, file, against_file).map_err(|source| CheckError {
                    rule_id: rule.id.to_string(),
                    file_path: file.path.clone(),
                    source,
                })?;
            }

            let annotations = writer.into_annotations();
            info!(rule = rule.id, annotations = annotations.len(), "rule executed");
            result.mark_rule_executed(rule.id);
            result.add_annotations(annotations);
        }

        Ok(result)
    }
}

/// One resolver per invocation. The current side's `buf.validate` schema
/// decodes both sides, falling back to the against side's.
fn resolver_for(current: &SchemaSet, against: &SchemaSet) -> ProtovalidateResolver {
    let schema = current
        .rule_schema
        .as_ref()
        .or(against.rule_schema.as_ref())
        .cloned();
    ProtovalidateResolver::new(schema)
}
