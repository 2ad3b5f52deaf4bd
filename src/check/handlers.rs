//! Rule handlers implementing the Protovalidate breaking change detection
//!
//! Messages are paired by name within their scope and fields by number
//! within a paired message. Entities without a counterpart are skipped; other
//! rules report additions, deletions and renumbering.

use crate::check::types::AnnotationSink;
use crate::diff::diff_rule_sets;
use crate::error::ResolveError;
use crate::resolve::RuleResolver;
use crate::snapshot::{FieldDescriptor, FileSnapshot, MessageDescriptor};
use std::collections::HashMap;
use std::hash::Hash;
use tracing::debug;

/// File-pair handler for PROTOVALIDATE_STRICT
pub fn handle_protovalidate_strict(
    resolver: &dyn RuleResolver,
    sink: &mut dyn AnnotationSink,
    file: &FileSnapshot,
    against_file: &FileSnapshot,
) -> Result<(), ResolveError> {
    compare_protovalidate_rules(resolver, sink, &file.messages, &against_file.messages)
}

/// Compares message and field rules of every paired message, recursing into
/// nested messages.
pub fn compare_protovalidate_rules(
    resolver: &dyn RuleResolver,
    sink: &mut dyn AnnotationSink,
    messages: &[MessageDescriptor],
    against_messages: &[MessageDescriptor],
) -> Result<(), ResolveError> {
    for (message, against_message) in paired(messages, against_messages, |m| m.name.as_str()) {
        debug!(descriptor = %message.full_name, "comparing message");
        compare_protovalidate_message_rules(resolver, sink, message, against_message)?;
        compare_protovalidate_rules(
            resolver,
            sink,
            &message.nested_messages,
            &against_message.nested_messages,
        )?;
    }
    Ok(())
}

fn compare_protovalidate_message_rules(
    resolver: &dyn RuleResolver,
    sink: &mut dyn AnnotationSink,
    message: &MessageDescriptor,
    against_message: &MessageDescriptor,
) -> Result<(), ResolveError> {
    let message_rules = resolver.resolve_message_rules(message)?;
    let against_message_rules = resolver.resolve_message_rules(against_message)?;

    let diffs = diff_rule_sets(&message_rules, &against_message_rules);
    if !diffs.is_empty() {
        for diff in &diffs {
            debug!(descriptor = %message.full_name, %diff, "message rules differ");
        }
        sink.add_annotation(
            format!(
                "Protovalidate message rules on message {:?} have changed.",
                message.name
            ),
            message,
            against_message,
        );
    }

    // Message and field rules are independent: a change to one never
    // short-circuits the other.
    compare_protovalidate_field_rules(resolver, sink, &message.fields, &against_message.fields)
}

fn compare_protovalidate_field_rules(
    resolver: &dyn RuleResolver,
    sink: &mut dyn AnnotationSink,
    fields: &[FieldDescriptor],
    against_fields: &[FieldDescriptor],
) -> Result<(), ResolveError> {
    for (field, against_field) in paired(fields, against_fields, |f| f.number) {
        let field_rules = resolver.resolve_field_rules(field)?;
        let against_field_rules = resolver.resolve_field_rules(against_field)?;

        let diffs = diff_rule_sets(&field_rules, &against_field_rules);
        if !diffs.is_empty() {
            for diff in &diffs {
                debug!(descriptor = %field.full_name, %diff, "field rules differ");
            }
            sink.add_annotation(
                format!(
                    "Protovalidate field rules on field {:?} have changed.",
                    field.full_name
                ),
                field,
                against_field,
            );
        }
    }
    Ok(())
}

/// Pairs each item of `items`, in order, with the item of `against` sharing
/// its identity. Items without a counterpart are dropped.
fn paired<'a, T, K, F>(
    items: &'a [T],
    against: &'a [T],
    identity: F,
) -> impl Iterator<Item = (&'a T, &'a T)> + 'a
where
    K: Eq + Hash + 'a,
    F: Fn(&'a T) -> K + 'a,
{
    let index: HashMap<K, &'a T> = against.iter().map(|item| (identity(item), item)).collect();
    items
        .iter()
        .filter_map(move |item| index.get(&identity(item)).map(|counterpart| (item, *counterpart)))
}
