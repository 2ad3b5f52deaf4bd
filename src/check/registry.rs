//! Rule registry
//!
//! Every rule is a single `RuleSpec` value: its ID, purpose text, type,
//! whether it runs by default, and its file-pair handler.

use crate::check::categories::RuleType;
use crate::check::handlers;
use crate::check::types::AnnotationSink;
use crate::error::ResolveError;
use crate::resolve::RuleResolver;
use crate::snapshot::FileSnapshot;

/// Handler invoked once per (current, against) file pair
pub type FilePairHandler = fn(
    &dyn RuleResolver,
    &mut dyn AnnotationSink,
    &FileSnapshot,
    &FileSnapshot,
) -> Result<(), ResolveError>;

/// Registration metadata and handler of one rule
#[derive(Clone, Copy)]
pub struct RuleSpec {
    pub id: &'static str,
    pub purpose: &'static str,
    pub rule_type: RuleType,
    pub default: bool,
    pub handler: FilePairHandler,
}

impl std::fmt::Debug for RuleSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSpec")
            .field("id", &self.id)
            .field("purpose", &self.purpose)
            .field("rule_type", &self.rule_type)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

pub const PROTOVALIDATE_STRICT: RuleSpec = RuleSpec {
    id: "PROTOVALIDATE_STRICT",
    purpose: "Checks that Protovalidate annotations on all existing messages and fields are unchanged.",
    rule_type: RuleType::Breaking,
    default: true,
    handler: handlers::handle_protovalidate_strict,
};

const RULES: &[RuleSpec] = &[PROTOVALIDATE_STRICT];

/// All registered rules
pub fn rule_specs() -> &'static [RuleSpec] {
    RULES
}

/// Rule by ID
pub fn rule_spec(id: &str) -> Option<&'static RuleSpec> {
    RULES.iter().find(|rule| rule.id == id)
}

/// Checks registry integrity: IDs are unique UPPER_SNAKE_CASE and purposes
/// are full sentences.
pub fn verify_rule_specs() -> Result<(), String> {
    let mut seen = std::collections::HashSet::new();
    for rule in RULES {
        if !seen.insert(rule.id) {
            return Err(format!("Duplicate rule ID: {}", rule.id));
        }
        let valid_id = !rule.id.is_empty()
            && !rule.id.starts_with('_')
            && !rule.id.ends_with('_')
            && rule
                .id
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        if !valid_id {
            return Err(format!("Rule ID is not UPPER_SNAKE_CASE: {}", rule.id));
        }
        let valid_purpose = rule.purpose.chars().next().is_some_and(|c| c.is_uppercase())
            && rule.purpose.ends_with('.');
        if !valid_purpose {
            return Err(format!("Rule {} purpose must be a sentence: {}", rule.id, rule.purpose));
        }
    }
    Ok(())
}
