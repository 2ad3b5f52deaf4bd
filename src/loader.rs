//! Loads `.proto` sources into schema snapshots.
//!
//! Parsing is done with the pure Rust parser from `protobuf-parse`, so no
//! `protoc` binary is needed. Imports, including `buf/validate/validate.proto`,
//! must be reachable from one of the include paths.

use crate::canonical::RuleKind;
use crate::snapshot::FileSnapshot;
use anyhow::Context;
use protobuf::descriptor::FileDescriptorProto;
use protobuf::reflect::{FileDescriptor, MessageDescriptor as ReflectMessageDescriptor};
use protobuf_parse::Parser;
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Field number of `(buf.validate.message)`, `(buf.validate.field)` and
/// `(buf.validate.oneof)`, used when no `buf.validate` schema is loaded.
pub const DEFAULT_EXTENSION_NUMBER: u32 = 1159;

const VALIDATE_PACKAGE: &str = "buf.validate";

/// Parsed input files of one schema version, plus the `buf.validate` schema
/// found among their imports.
pub struct SchemaSet {
    pub files: Vec<FileSnapshot>,
    pub rule_schema: Option<RuleSchema>,
}

/// Dynamic descriptors for the Protovalidate rules messages.
#[derive(Clone)]
pub struct RuleSchema {
    pub message_rules: ReflectMessageDescriptor,
    pub field_rules: ReflectMessageDescriptor,
    pub message_extension: u32,
    pub field_extension: u32,
}

impl SchemaSet {
    /// Parses `inputs`, each of which must live under one of `includes`.
    pub fn load<I, P>(includes: I, inputs: &[PathBuf]) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let includes: Vec<PathBuf> = includes.into_iter().map(|p| p.as_ref().to_path_buf()).collect();

        let mut names = Vec::with_capacity(inputs.len());
        for input in inputs {
            let name = relative_name(input, &includes).with_context(|| {
                format!("Input file '{}' is not under any include path", input.display())
            })?;
            names.push(name);
        }

        // `file_descriptor_set()` keeps only the inputs; the imports are
        // needed to find the buf.validate schema.
        let parsed = Parser::new()
            .pure()
            .includes(&includes)
            .inputs(inputs)
            .parse_and_typecheck()
            .context("Protobuf parsing failed")?;

        debug!(
            inputs = names.len(),
            parsed = parsed.file_descriptors.len(),
            "parsed protobuf sources"
        );

        Self::from_protos(parsed.file_descriptors, &names)
    }

    /// Parses a single file given by its content. The content is written to
    /// a temporary directory under `file_name`; `includes` are searched for
    /// its imports.
    pub fn from_source<I, P>(file_name: &str, content: &str, includes: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let temp_dir = tempfile::tempdir().context("Failed to create temp directory")?;
        let temp_path = temp_dir.path().join(file_name);
        if let Some(parent) = temp_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create parent dirs for: {file_name}"))?;
        }
        std::fs::write(&temp_path, content).context("Failed to write to temp file")?;

        let mut all_includes = vec![temp_dir.path().to_path_buf()];
        all_includes.extend(includes.into_iter().map(|p| p.as_ref().to_path_buf()));

        Self::load(all_includes, &[temp_path])
    }

    /// Builds snapshots for the files named in `input_names`, in that order.
    pub fn from_protos(protos: Vec<FileDescriptorProto>, input_names: &[String]) -> anyhow::Result<Self> {
        let rule_schema = RuleSchema::from_protos(&protos)?;

        let by_name: HashMap<&str, &FileDescriptorProto> =
            protos.iter().map(|p| (p.name(), p)).collect();

        let mut files = Vec::with_capacity(input_names.len());
        for name in input_names {
            let proto = by_name
                .get(name.as_str())
                .with_context(|| format!("Could not find the parsed file descriptor for '{name}'"))?;
            files.push(FileSnapshot::from_proto(proto));
        }

        Ok(SchemaSet { files, rule_schema })
    }

    /// File by its path relative to the include root.
    pub fn file(&self, path: &str) -> Option<&FileSnapshot> {
        self.files.iter().find(|f| f.path == path)
    }
}

impl RuleSchema {
    /// Finds the `buf.validate` file among `protos` and builds dynamic
    /// descriptors for it. Returns `None` when no file defines the
    /// Protovalidate rules messages.
    pub fn from_protos(protos: &[FileDescriptorProto]) -> anyhow::Result<Option<Self>> {
        let Some(validate_file) = protos.iter().find(|p| is_validate_file(p)) else {
            return Ok(None);
        };

        let message_extension = extension_number(validate_file, ".google.protobuf.MessageOptions", RuleKind::Message);
        let field_extension = extension_number(validate_file, ".google.protobuf.FieldOptions", RuleKind::Field);

        let well_known = well_known_file_descriptors();
        let provided: HashSet<&str> = well_known.iter().map(|fd| fd.proto().name()).collect();
        let closure = dependency_closure(validate_file, protos, &provided);

        let built = FileDescriptor::new_dynamic_fds(closure, &well_known).with_context(|| {
            format!("Failed to build descriptors for '{}'", validate_file.name())
        })?;

        let validate = built
            .iter()
            .find(|fd| fd.proto().name() == validate_file.name())
            .context("Built descriptors are missing the buf.validate file")?;

        let find = |kind: RuleKind| {
            validate
                .messages()
                .find(|m| m.full_name() == kind.type_name())
                .with_context(|| format!("{} not found in '{}'", kind.type_name(), validate_file.name()))
        };

        let schema = RuleSchema {
            message_rules: find(RuleKind::Message)?,
            field_rules: find(RuleKind::Field)?,
            message_extension,
            field_extension,
        };

        debug!(
            file = validate_file.name(),
            message_extension, field_extension, "loaded buf.validate schema"
        );

        Ok(Some(schema))
    }

    pub fn rules_descriptor(&self, kind: RuleKind) -> &ReflectMessageDescriptor {
        match kind {
            RuleKind::Message => &self.message_rules,
            RuleKind::Field => &self.field_rules,
        }
    }

    pub fn extension_number(&self, kind: RuleKind) -> u32 {
        match kind {
            RuleKind::Message => self.message_extension,
            RuleKind::Field => self.field_extension,
        }
    }
}

fn is_validate_file(proto: &FileDescriptorProto) -> bool {
    proto.package() == VALIDATE_PACKAGE
        && proto.message_type.iter().any(|m| m.name() == "MessageRules")
        && proto.message_type.iter().any(|m| m.name() == "FieldRules")
}

fn extension_number(validate_file: &FileDescriptorProto, extendee: &str, kind: RuleKind) -> u32 {
    let type_name = format!(".{}", kind.type_name());
    validate_file
        .extension
        .iter()
        .find(|ext| ext.extendee() == extendee && ext.type_name() == type_name)
        .map(|ext| ext.number() as u32)
        .unwrap_or(DEFAULT_EXTENSION_NUMBER)
}

/// Generated descriptors for the well-known files `validate.proto` may
/// import. These take precedence over parsed copies of the same files.
fn well_known_file_descriptors() -> Vec<FileDescriptor> {
    use protobuf::well_known_types::{any, duration, empty, field_mask, struct_, timestamp, wrappers};

    vec![
        protobuf::descriptor::file_descriptor().clone(),
        any::file_descriptor().clone(),
        duration::file_descriptor().clone(),
        empty::file_descriptor().clone(),
        field_mask::file_descriptor().clone(),
        struct_::file_descriptor().clone(),
        timestamp::file_descriptor().clone(),
        wrappers::file_descriptor().clone(),
    ]
}

/// `root` and its transitive imports, dependencies first, leaving out files
/// in `provided`.
fn dependency_closure(
    root: &FileDescriptorProto,
    protos: &[FileDescriptorProto],
    provided: &HashSet<&str>,
) -> Vec<FileDescriptorProto> {
    fn visit<'a>(
        file: &'a FileDescriptorProto,
        by_name: &HashMap<&str, &'a FileDescriptorProto>,
        provided: &HashSet<&str>,
        seen: &mut HashSet<String>,
        out: &mut Vec<FileDescriptorProto>,
    ) {
        if !seen.insert(file.name().to_string()) {
            return;
        }
        for dep in &file.dependency {
            if provided.contains(dep.as_str()) {
                continue;
            }
            if let Some(dep_file) = by_name.get(dep.as_str()) {
                visit(dep_file, by_name, provided, seen, out);
            }
        }
        out.push(file.clone());
    }

    let by_name: HashMap<&str, &FileDescriptorProto> = protos.iter().map(|p| (p.name(), p)).collect();
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    visit(root, &by_name, provided, &mut seen, &mut out);
    out
}

/// Path of `input` relative to the first include that contains it, with
/// `/` separators, matching the names `protobuf-parse` assigns.
fn relative_name(input: &Path, includes: &[PathBuf]) -> Option<String> {
    includes.iter().find_map(|include| {
        let relative = if include.as_os_str().is_empty() || include == Path::new(".") {
            Some(input)
        } else {
            input.strip_prefix(include).ok()
        }?;

        let parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        if parts.is_empty() { None } else { Some(parts.join("/")) }
    })
}
