//! Structural comparison of resolved rule sets.
//!
//! A diff is a list of the paths at which two canonical rule values
//! disagree. An empty diff means the rule sets are semantically equal.

use crate::canonical::{RuleMessage, RuleSet, RuleValue, UnknownValue};
use serde::Serialize;
use std::collections::BTreeSet;

/// One point of disagreement between a current and an against rule set.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RuleDiff {
    /// Dotted path to the differing value, e.g. `string.min_len` or `cel[0].id`.
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<RuleValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub against: Option<RuleValue>,
}

impl std::fmt::Display for RuleDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let render = |value: &Option<RuleValue>| match value {
            Some(value) => serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}")),
            None => "<unset>".to_string(),
        };
        write!(
            f,
            "{}: {} -> {}",
            self.path,
            render(&self.against),
            render(&self.current)
        )
    }
}

/// Returns every difference between two rule sets.
///
/// Adding or removing the option itself is one difference at the rules
/// message's type name, even when the option is explicitly empty.
pub fn diff_rule_sets(current: &RuleSet, against: &RuleSet) -> Vec<RuleDiff> {
    if current.present != against.present {
        let whole = |rules: &RuleSet| rules.present.then(|| RuleValue::Message(rules.rules.clone()));
        return vec![RuleDiff {
            path: current.kind.type_name().to_string(),
            current: whole(current),
            against: whole(against),
        }];
    }

    let mut diffs = Vec::new();
    diff_messages("", &current.rules, &against.rules, &mut diffs);
    diffs
}

/// Whether two rule sets are structurally equal.
pub fn rule_sets_equal(current: &RuleSet, against: &RuleSet) -> bool {
    diff_rule_sets(current, against).is_empty()
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn diff_messages(path: &str, current: &RuleMessage, against: &RuleMessage, diffs: &mut Vec<RuleDiff>) {
    let names: BTreeSet<&String> = current.fields.keys().chain(against.fields.keys()).collect();
    for name in names {
        let field_path = join(path, name);
        match (current.fields.get(name), against.fields.get(name)) {
            (Some(cur), Some(prev)) => diff_values(&field_path, cur, prev, diffs),
            (cur, prev) => diffs.push(RuleDiff {
                path: field_path,
                current: cur.cloned(),
                against: prev.cloned(),
            }),
        }
    }

    let numbers: BTreeSet<&u32> = current.unknown.keys().chain(against.unknown.keys()).collect();
    for number in numbers {
        let cur = current.unknown.get(number);
        let prev = against.unknown.get(number);
        if cur != prev {
            diffs.push(RuleDiff {
                path: join(path, &format!("[{number}]")),
                current: cur.map(|values| unknown_as_value(values)),
                against: prev.map(|values| unknown_as_value(values)),
            });
        }
    }
}

fn diff_values(path: &str, current: &RuleValue, against: &RuleValue, diffs: &mut Vec<RuleDiff>) {
    match (current, against) {
        (RuleValue::Message(cur), RuleValue::Message(prev)) => diff_messages(path, cur, prev, diffs),
        (RuleValue::List(cur), RuleValue::List(prev)) => {
            for i in 0..cur.len().max(prev.len()) {
                let item_path = format!("{path}[{i}]");
                match (cur.get(i), prev.get(i)) {
                    (Some(c), Some(p)) => diff_values(&item_path, c, p, diffs),
                    (c, p) => diffs.push(RuleDiff {
                        path: item_path,
                        current: c.cloned(),
                        against: p.cloned(),
                    }),
                }
            }
        }
        (RuleValue::Map(cur), RuleValue::Map(prev)) => {
            let keys: BTreeSet<&String> = cur.keys().chain(prev.keys()).collect();
            for key in keys {
                let entry_path = format!("{path}[{key:?}]");
                match (cur.get(key), prev.get(key)) {
                    (Some(c), Some(p)) => diff_values(&entry_path, c, p, diffs),
                    (c, p) => diffs.push(RuleDiff {
                        path: entry_path,
                        current: c.cloned(),
                        against: p.cloned(),
                    }),
                }
            }
        }
        (cur, prev) => {
            if cur != prev {
                diffs.push(RuleDiff {
                    path: path.to_string(),
                    current: Some(cur.clone()),
                    against: Some(prev.clone()),
                });
            }
        }
    }
}

fn unknown_as_value(values: &[UnknownValue]) -> RuleValue {
    RuleValue::List(
        values
            .iter()
            .map(|value| match value {
                UnknownValue::Varint(v) => RuleValue::Uint(*v),
                UnknownValue::Fixed32(v) => RuleValue::Uint(*v as u64),
                UnknownValue::Fixed64(v) => RuleValue::Uint(*v),
                UnknownValue::LengthDelimited(v) => RuleValue::Bytes(v.clone()),
            })
            .collect(),
    )
}
