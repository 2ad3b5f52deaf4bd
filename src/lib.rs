//! Detects changed Protovalidate rules between two versions of a protobuf
//! schema.
//!
//! The single rule, `PROTOVALIDATE_STRICT`, pairs messages by name and fields
//! by number, resolves the `buf.validate` rules attached to each, and reports
//! an annotation wherever the resolved rules differ.

pub mod canonical;
pub mod check;
pub mod diff;
pub mod error;
pub mod loader;
pub mod logging;
pub mod normalize;
pub mod resolve;
pub mod snapshot;

pub use check::{Annotation, CheckConfig, CheckEngine, CheckResult};
pub use error::{CheckError, ResolveError};
pub use loader::SchemaSet;

use std::path::Path;

/// Checks the content of a `.proto` file against a previous version of it.
///
/// Both versions are parsed as `file_name`, so they pair with each other.
/// `includes` must provide every import, including
/// `buf/validate/validate.proto`.
///
/// # Arguments
///
/// * `file_name` - The path the file is parsed under, e.g. `acme/v1/user.proto`.
/// * `current` - Content of the current version.
/// * `against` - Content of the previous version.
/// * `includes` - Import roots.
///
/// # Returns
///
/// The annotations produced by the default rules, or an error if parsing or
/// rule resolution fails.
pub fn check_sources<P: AsRef<Path>>(
    file_name: &str,
    current: &str,
    against: &str,
    includes: &[P],
) -> anyhow::Result<CheckResult> {
    let current_set = SchemaSet::from_source(file_name, current, includes)?;
    let against_set = SchemaSet::from_source(file_name, against, includes)?;

    let result = CheckEngine::new().check(&current_set, &against_set, &CheckConfig::default())?;
    Ok(result)
}
