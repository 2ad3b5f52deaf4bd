//! Core types for rule annotations

use crate::snapshot::Descriptor;
use serde::{Deserialize, Serialize};

/// A diagnostic produced by a rule for a current/against descriptor pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// The rule ID that produced this annotation
    pub rule_id: String,
    /// Human-readable description of the change
    pub message: String,
    /// Location of the current-side descriptor
    pub location: DescriptorLocation,
    /// Location of the against-side descriptor
    pub against_location: Option<DescriptorLocation>,
}

/// Location information for an annotated descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorLocation {
    /// File path
    pub file_path: String,
    /// Line number (1-based)
    pub line: Option<u32>,
    /// Column number (1-based)
    pub column: Option<u32>,
    /// Element type (e.g., "field", "message")
    pub element_type: String,
    /// Fully-qualified element name
    pub element_name: String,
}

impl DescriptorLocation {
    /// Location of a descriptor's own declaration. Annotations point here
    /// rather than at the option that changed.
    pub fn of(descriptor: &dyn Descriptor) -> Self {
        let span = descriptor.span();
        Self {
            file_path: descriptor.file_path().to_string(),
            line: span.map(|s| s.line),
            column: span.map(|s| s.column),
            element_type: descriptor.element_type().to_string(),
            element_name: descriptor.full_name().to_string(),
        }
    }
}

impl std::fmt::Display for DescriptorLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_path)?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        write!(f, " ({} {})", self.element_type, self.element_name)
    }
}

/// Accumulates annotations. Rules never read back what they wrote.
pub trait AnnotationSink {
    fn add_annotation(&mut self, message: String, descriptor: &dyn Descriptor, against_descriptor: &dyn Descriptor);
}

/// Collects the annotations of one rule.
#[derive(Debug, Clone)]
pub struct ResponseWriter {
    rule_id: String,
    annotations: Vec<Annotation>,
}

impl ResponseWriter {
    pub fn new(rule_id: &str) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            annotations: Vec::new(),
        }
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn into_annotations(self) -> Vec<Annotation> {
        self.annotations
    }
}

impl AnnotationSink for ResponseWriter {
    fn add_annotation(&mut self, message: String, descriptor: &dyn Descriptor, against_descriptor: &dyn Descriptor) {
        self.annotations.push(Annotation {
            rule_id: self.rule_id.clone(),
            message,
            location: DescriptorLocation::of(descriptor),
            against_location: Some(DescriptorLocation::of(against_descriptor)),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{FieldDescriptor, SourceSpan};

    #[test]
    fn test_location_display() {
        let field = FieldDescriptor {
            name: "total".to_string(),
            number: 2,
            full_name: "shop.v1.Order.total".to_string(),
            file_path: "shop/v1/order.proto".to_string(),
            span: Some(SourceSpan { line: 7, column: 3 }),
            ..Default::default()
        };
        let location = DescriptorLocation::of(&field);
        assert_eq!(
            location.to_string(),
            "shop/v1/order.proto:7:3 (field shop.v1.Order.total)"
        );

        let without_span = DescriptorLocation::of(&FieldDescriptor {
            span: None,
            ..field
        });
        assert_eq!(
            without_span.to_string(),
            "shop/v1/order.proto (field shop.v1.Order.total)"
        );
    }

    #[test]
    fn test_response_writer_stamps_rule_id() {
        let field = FieldDescriptor {
            full_name: "a.B.c".to_string(),
            file_path: "a.proto".to_string(),
            ..Default::default()
        };
        let mut writer = ResponseWriter::new("PROTOVALIDATE_STRICT");
        writer.add_annotation("changed".to_string(), &field, &field);

        let annotations = writer.into_annotations();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].rule_id, "PROTOVALIDATE_STRICT");
        assert_eq!(annotations[0].location.element_type, "field");
        assert!(annotations[0].against_location.is_some());
    }
}
