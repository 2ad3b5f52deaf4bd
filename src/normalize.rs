//! Converts a dynamically decoded Protovalidate rules message from the
//! `protobuf` crate's reflection API into the canonical `RuleMessage`
//! representation.

use crate::canonical::{Float, RuleMessage, RuleValue, UnknownValue};
use protobuf::MessageDyn;
use protobuf::UnknownValueRef;
use protobuf::reflect::{
    FieldDescriptor, MessageDescriptor, ReflectFieldRef, ReflectValueRef, RuntimeFieldType, RuntimeType,
};
use std::collections::BTreeMap;

pub fn normalize_message(message: &dyn MessageDyn) -> RuleMessage {
    let descriptor = message.descriptor_dyn();
    let mut canonical_msg = RuleMessage::new(descriptor.full_name());

    for field in descriptor.fields() {
        // Unset fields are left out entirely, so an explicit default and an
        // absent field end up identical only when the schema says so.
        let value = match field.get_reflect(message) {
            ReflectFieldRef::Optional(optional) => optional.value().map(normalize_value),
            ReflectFieldRef::Repeated(repeated) => {
                if repeated.len() == 0 {
                    None
                } else {
                    let items = (0..repeated.len())
                        .map(|i| normalize_value(repeated.get(i)))
                        .collect();
                    Some(RuleValue::List(items))
                }
            }
            ReflectFieldRef::Map(map) => {
                if map.len() == 0 {
                    None
                } else {
                    let entries = map
                        .into_iter()
                        .map(|(key, value)| (render_map_key(key), normalize_value(value)))
                        .collect::<BTreeMap<_, _>>();
                    Some(RuleValue::Map(entries))
                }
            }
        };

        if let Some(value) = value {
            canonical_msg.fields.insert(field.name().to_string(), value);
        }
    }

    for (number, value) in message.special_fields_dyn().unknown_fields().iter() {
        canonical_msg
            .unknown
            .entry(number)
            .or_default()
            .push(normalize_unknown(value));
    }

    canonical_msg
}

fn normalize_value(value: ReflectValueRef<'_>) -> RuleValue {
    match value {
        ReflectValueRef::Bool(v) => RuleValue::Bool(v),
        ReflectValueRef::I32(v) => RuleValue::Int(v as i64),
        ReflectValueRef::I64(v) => RuleValue::Int(v),
        ReflectValueRef::U32(v) => RuleValue::Uint(v as u64),
        ReflectValueRef::U64(v) => RuleValue::Uint(v),
        ReflectValueRef::F32(v) => RuleValue::Float(Float(v as f64)),
        ReflectValueRef::F64(v) => RuleValue::Float(Float(v)),
        ReflectValueRef::String(v) => RuleValue::String(v.to_string()),
        ReflectValueRef::Bytes(v) => RuleValue::Bytes(v.to_vec()),
        ReflectValueRef::Enum(_, number) => RuleValue::Enum(number),
        ReflectValueRef::Message(message) => RuleValue::Message(normalize_message(&*message)),
    }
}

/// Map keys can only be integral, bool or string, so a string rendering is
/// unambiguous within one map.
fn render_map_key(key: ReflectValueRef<'_>) -> String {
    match key {
        ReflectValueRef::Bool(v) => v.to_string(),
        ReflectValueRef::I32(v) => v.to_string(),
        ReflectValueRef::I64(v) => v.to_string(),
        ReflectValueRef::U32(v) => v.to_string(),
        ReflectValueRef::U64(v) => v.to_string(),
        ReflectValueRef::String(v) => v.to_string(),
        other => format!("{other:?}"),
    }
}

pub fn normalize_unknown(value: UnknownValueRef<'_>) -> UnknownValue {
    match value {
        UnknownValueRef::Varint(v) => UnknownValue::Varint(v),
        UnknownValueRef::Fixed32(v) => UnknownValue::Fixed32(v),
        UnknownValueRef::Fixed64(v) => UnknownValue::Fixed64(v),
        UnknownValueRef::LengthDelimited(v) => UnknownValue::LengthDelimited(v.to_vec()),
    }
}

/// Merges `from` into `into` the way protobuf merges a later encoding of the
/// same message. Singular scalars are replaced and singular messages merge
/// recursively. Repeated fields append and map entries replace by key.
/// Setting a oneof member clears the other members of that oneof.
pub fn merge_message(descriptor: &MessageDescriptor, into: &mut RuleMessage, from: RuleMessage) {
    for (name, incoming) in from.fields {
        let field = descriptor.field_by_name(&name);

        if let Some(oneof) = field.as_ref().and_then(|f| f.containing_oneof()) {
            for sibling in oneof.fields() {
                if sibling.name() != name {
                    into.fields.remove(sibling.name());
                }
            }
        }

        let merged = match (into.fields.remove(&name), incoming) {
            (Some(RuleValue::Message(mut existing)), RuleValue::Message(incoming)) => {
                match field.as_ref().and_then(singular_message_type) {
                    Some(nested) => {
                        merge_message(&nested, &mut existing, incoming);
                        RuleValue::Message(existing)
                    }
                    None => RuleValue::Message(incoming),
                }
            }
            (Some(RuleValue::List(mut existing)), RuleValue::List(incoming)) => {
                existing.extend(incoming);
                RuleValue::List(existing)
            }
            (Some(RuleValue::Map(mut existing)), RuleValue::Map(incoming)) => {
                existing.extend(incoming);
                RuleValue::Map(existing)
            }
            (_, incoming) => incoming,
        };
        into.fields.insert(name, merged);
    }

    for (number, values) in from.unknown {
        into.unknown.entry(number).or_default().extend(values);
    }
}

fn singular_message_type(field: &FieldDescriptor) -> Option<MessageDescriptor> {
    match field.runtime_field_type() {
        RuntimeFieldType::Singular(RuntimeType::Message(message)) => Some(message),
        _ => None,
    }
}
