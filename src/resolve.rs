//! Resolves the effective Protovalidate rules attached to a descriptor.

use crate::canonical::{RuleKind, RuleMessage, RuleSet};
use crate::error::ResolveError;
use crate::loader::{DEFAULT_EXTENSION_NUMBER, RuleSchema};
use crate::normalize::{merge_message, normalize_message};
use crate::snapshot::{FieldDescriptor, MessageDescriptor};
use protobuf::{UnknownFields, UnknownValueRef};

/// Source of resolved rule sets for messages and fields.
///
/// Implementations must be deterministic: resolving the same descriptor twice
/// yields structurally equal rule sets.
pub trait RuleResolver {
    fn resolve_message_rules(&self, message: &MessageDescriptor) -> Result<RuleSet, ResolveError>;
    fn resolve_field_rules(&self, field: &FieldDescriptor) -> Result<RuleSet, ResolveError>;
}

/// Resolves `(buf.validate.message)` and `(buf.validate.field)` options by
/// decoding them against the loaded `buf.validate` schema.
#[derive(Clone, Default)]
pub struct ProtovalidateResolver {
    schema: Option<RuleSchema>,
}

impl ProtovalidateResolver {
    pub fn new(schema: Option<RuleSchema>) -> Self {
        Self { schema }
    }

    fn resolve(&self, kind: RuleKind, descriptor: &str, options: &UnknownFields) -> Result<RuleSet, ResolveError> {
        let number = self
            .schema
            .as_ref()
            .map(|schema| schema.extension_number(kind))
            .unwrap_or(DEFAULT_EXTENSION_NUMBER);

        let occurrences = extension_occurrences(descriptor, number, options)?;
        if occurrences.is_empty() {
            return Ok(RuleSet::empty(kind));
        }

        let Some(schema) = self.schema.as_ref() else {
            return Err(ResolveError::MissingRuleSchema {
                descriptor: descriptor.to_string(),
                type_name: kind.type_name(),
            });
        };

        // Each occurrence decodes on its own; the dynamic decoder would
        // replace rather than merge a message field seen twice.
        let rules_descriptor = schema.rules_descriptor(kind);
        let mut rules = RuleMessage::new(kind.type_name());
        for bytes in occurrences {
            let message = rules_descriptor
                .parse_from_bytes(bytes)
                .map_err(|source| ResolveError::Decode {
                    descriptor: descriptor.to_string(),
                    source,
                })?;
            merge_message(rules_descriptor, &mut rules, normalize_message(&*message));
        }

        Ok(RuleSet::new(kind, rules))
    }
}

impl RuleResolver for ProtovalidateResolver {
    fn resolve_message_rules(&self, message: &MessageDescriptor) -> Result<RuleSet, ResolveError> {
        self.resolve(RuleKind::Message, &message.full_name, &message.options)
    }

    fn resolve_field_rules(&self, field: &FieldDescriptor) -> Result<RuleSet, ResolveError> {
        self.resolve(RuleKind::Field, &field.full_name, &field.options)
    }
}

/// Every occurrence of the extension field, in encoding order. Options
/// such as `(buf.validate.field).string.min_len = 1` each add one.
fn extension_occurrences<'a>(
    descriptor: &str,
    number: u32,
    options: &'a UnknownFields,
) -> Result<Vec<&'a [u8]>, ResolveError> {
    let mut occurrences = Vec::new();
    for (field_number, value) in options.iter() {
        if field_number != number {
            continue;
        }
        match value {
            UnknownValueRef::LengthDelimited(bytes) => occurrences.push(bytes),
            other => {
                return Err(ResolveError::MalformedExtension {
                    descriptor: descriptor.to_string(),
                    wire_type: wire_type_name(&other),
                });
            }
        }
    }
    Ok(occurrences)
}

fn wire_type_name(value: &UnknownValueRef<'_>) -> &'static str {
    match value {
        UnknownValueRef::Varint(_) => "varint",
        UnknownValueRef::Fixed32(_) => "fixed32",
        UnknownValueRef::Fixed64(_) => "fixed64",
        UnknownValueRef::LengthDelimited(_) => "length-delimited",
    }
}
