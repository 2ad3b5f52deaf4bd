//! Breaking change rule checking for Protovalidate annotations
//!
//! This module holds the rule registry, the file-pair handlers that walk two
//! schema versions, and the engine that runs them under a configuration.

pub mod categories;
pub mod engine;
pub mod handlers;
pub mod registry;
pub mod types;

pub use categories::RuleType;
pub use engine::{CheckConfig, CheckEngine, CheckResult};
pub use registry::{PROTOVALIDATE_STRICT, RuleSpec};
pub use types::{Annotation, AnnotationSink, DescriptorLocation, ResponseWriter};
