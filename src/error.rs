//! Error types for rule resolution and rule execution.

use thiserror::Error;

/// Rule resolution failed for a message or field descriptor.
///
/// Resolution failures are fatal to the file pair being compared: no
/// annotation is produced for the entity and traversal stops.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Protovalidate option on \"{descriptor}\" has wire type {wire_type}, expected a length-delimited message")]
    MalformedExtension {
        descriptor: String,
        wire_type: &'static str,
    },

    #[error("\"{descriptor}\" carries Protovalidate rules but {type_name} is not defined in the loaded schema")]
    MissingRuleSchema {
        descriptor: String,
        type_name: &'static str,
    },

    #[error("Failed to decode Protovalidate rules on \"{descriptor}\": {source}")]
    Decode {
        descriptor: String,
        #[source]
        source: protobuf::Error,
    },
}

/// A rule handler failed on a file pair.
#[derive(Debug, Error)]
#[error("Rule {rule_id} failed on \"{file_path}\": {source}")]
pub struct CheckError {
    pub rule_id: String,
    pub file_path: String,
    #[source]
    pub source: ResolveError,
}
