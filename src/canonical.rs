//! Canonical, serializable representation of resolved Protovalidate rules.
//!
//! Two rule sets that differ only in how they were encoded (field order,
//! split or packed occurrences, map ordering) normalize to the same value.

use serde::Serialize;
use sha2::{Digest, Sha256};

// Note: Using BTreeMap for sorted keys so serialization and comparison
// never depend on declaration or wire order.
use std::collections::BTreeMap;

//==============================================================================
// Rule Set
//==============================================================================

/// Which Protovalidate rules message a rule set was resolved from.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// `buf.validate.MessageRules`, set with `option (buf.validate.message)`.
    Message,
    /// `buf.validate.FieldRules`, set with `[(buf.validate.field)]`.
    Field,
}

impl RuleKind {
    /// Fully-qualified name of the rules message for this kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            RuleKind::Message => "buf.validate.MessageRules",
            RuleKind::Field => "buf.validate.FieldRules",
        }
    }
}

/// The effective Protovalidate rules in force for one message or field.
///
/// `present` tells an absent option apart from an explicitly empty one,
/// such as `[(buf.validate.field) = {}]`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RuleSet {
    pub kind: RuleKind,
    pub present: bool,
    pub rules: RuleMessage,
}

impl RuleSet {
    pub fn new(kind: RuleKind, rules: RuleMessage) -> Self {
        Self {
            kind,
            present: true,
            rules,
        }
    }

    /// The rule set of a descriptor that carries no Protovalidate option.
    pub fn empty(kind: RuleKind) -> Self {
        Self {
            kind,
            present: false,
            rules: RuleMessage::new(kind.type_name()),
        }
    }

    /// Whether the descriptor carries no Protovalidate option at all.
    pub fn is_empty(&self) -> bool {
        !self.present
    }

    /// Hex-encoded SHA-256 of the canonical JSON form of these rules.
    pub fn fingerprint(&self) -> anyhow::Result<String> {
        let json_string = serde_json::to_string(&self.rules)?;
        let mut hasher = Sha256::new();
        hasher.update(json_string.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}

//==============================================================================
// Rule Values
//==============================================================================

/// A decoded rules message: known fields by name, unknown fields by number.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RuleMessage {
    pub type_name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, RuleValue>,
    /// Fields the rules schema does not know about, such as predefined rule
    /// extensions.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub unknown: BTreeMap<u32, Vec<UnknownValue>>,
}

impl RuleMessage {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            ..Default::default()
        }
    }

    /// Builder-style helper for setting a known field.
    pub fn with_field(mut self, name: &str, value: RuleValue) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.unknown.is_empty()
    }
}

/// A single set value inside a rules message.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum RuleValue {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(Float),
    String(String),
    Bytes(Vec<u8>),
    /// Enum values compare by number; the name is representation only.
    Enum(i32),
    List(Vec<RuleValue>),
    /// Map entries keyed by the rendered map key.
    Map(BTreeMap<String, RuleValue>),
    Message(RuleMessage),
}

/// Floating point rule bound. NaN equals NaN so that an unchanged NaN bound
/// is not reported as a change.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(transparent)]
pub struct Float(pub f64);

impl PartialEq for Float {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 || (self.0.is_nan() && other.0.is_nan())
    }
}

/// A raw value of a field the rules schema does not describe.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnknownValue {
    Varint(u64),
    Fixed32(u32),
    Fixed64(u64),
    LengthDelimited(Vec<u8>),
}
