//! End-to-end checks of PROTOVALIDATE_STRICT over parsed `.proto` sources

use protovalidate_breaking::canonical::{RuleKind, RuleValue};
use protovalidate_breaking::resolve::{ProtovalidateResolver, RuleResolver};
use protovalidate_breaking::{CheckResult, SchemaSet, check_sources};

const INCLUDES: &[&str] = &[concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data")];
const FILE: &str = "shop/v1/order.proto";

fn check(current: &str, against: &str) -> CheckResult {
    check_sources(FILE, current, against, INCLUDES).expect("check should succeed")
}

fn messages(result: &CheckResult) -> Vec<&str> {
    result.annotations.iter().map(|a| a.message.as_str()).collect()
}

#[test]
fn test_field_gains_rule() {
    let against = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  string id = 1;
  double total = 2;
}
"#;
    let current = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  string id = 1;
  double total = 2 [(buf.validate.field).double.gt = 0.0];
}
"#;

    let result = check(current, against);

    assert!(result.has_annotations);
    assert_eq!(
        messages(&result),
        vec!["Protovalidate field rules on field \"shop.v1.Order.total\" have changed."]
    );
    let annotation = &result.annotations[0];
    assert_eq!(annotation.rule_id, "PROTOVALIDATE_STRICT");
    assert_eq!(annotation.location.file_path, FILE);
    assert_eq!(annotation.location.element_type, "field");
    assert_eq!(annotation.location.element_name, "shop.v1.Order.total");
    let against_location = annotation.against_location.as_ref().unwrap();
    assert_eq!(against_location.element_name, "shop.v1.Order.total");
}

#[test]
fn test_unchanged_rules_produce_nothing() {
    let proto = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  option (buf.validate.message).disabled = false;
  string id = 1 [(buf.validate.field).string.min_len = 1];
  double total = 2 [(buf.validate.field).double.gte = 0.0];
}
"#;

    let result = check(proto, proto);

    assert!(!result.has_annotations);
    assert_eq!(result.checked_file_pairs, 1);
    assert_eq!(result.executed_rules, vec!["PROTOVALIDATE_STRICT"]);
}

#[test]
fn test_rule_value_change_is_reported() {
    let against = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  string id = 1 [(buf.validate.field).string.min_len = 1];
}
"#;
    let current = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  string id = 1 [(buf.validate.field).string.min_len = 2];
}
"#;

    let result = check(current, against);
    assert_eq!(
        messages(&result),
        vec!["Protovalidate field rules on field \"shop.v1.Order.id\" have changed."]
    );
}

#[test]
fn test_rule_removal_is_reported() {
    let against = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  string id = 1 [(buf.validate.field).required = true];
}
"#;
    let current = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  string id = 1;
}
"#;

    let result = check(current, against);
    assert_eq!(result.annotations.len(), 1);
}

#[test]
fn test_option_order_does_not_matter() {
    let against = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  string id = 1 [
    (buf.validate.field).string.min_len = 1,
    (buf.validate.field).string.max_len = 64
  ];
}
"#;
    let current = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  string id = 1 [
    (buf.validate.field).string.max_len = 64,
    (buf.validate.field).string.min_len = 1
  ];
}
"#;

    let result = check(current, against);
    assert!(!result.has_annotations, "unexpected: {:?}", messages(&result));
}

#[test]
fn test_change_beside_unchanged_split_option_is_reported() {
    let against = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  string id = 1 [
    (buf.validate.field).string.min_len = 1,
    (buf.validate.field).string.max_len = 64
  ];
}
"#;
    let current = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  string id = 1 [
    (buf.validate.field).string.min_len = 5,
    (buf.validate.field).string.max_len = 64
  ];
}
"#;

    let result = check(current, against);
    assert_eq!(
        messages(&result),
        vec!["Protovalidate field rules on field \"shop.v1.Order.id\" have changed."]
    );
}

#[test]
fn test_split_options_resolve_to_all_rules() {
    let proto = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  string id = 1 [
    (buf.validate.field).string.min_len = 1,
    (buf.validate.field).string.max_len = 64
  ];
}
"#;

    let schema_set = SchemaSet::from_source(FILE, proto, INCLUDES).unwrap();
    let resolver = ProtovalidateResolver::new(schema_set.rule_schema.clone());
    let field = schema_set.file(FILE).unwrap().message("Order").unwrap().field(1).unwrap();
    let rules = resolver.resolve_field_rules(field).unwrap();

    let Some(RuleValue::Message(string_rules)) = rules.rules.fields.get("string") else {
        panic!("expected string rules, got {:?}", rules.rules);
    };
    assert_eq!(string_rules.fields.get("min_len"), Some(&RuleValue::Uint(1)));
    assert_eq!(string_rules.fields.get("max_len"), Some(&RuleValue::Uint(64)));
}

#[test]
fn test_message_rule_change() {
    let against = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  string id = 1;
}
"#;
    let current = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  option (buf.validate.message).disabled = true;
  string id = 1;
}
"#;

    let result = check(current, against);
    assert_eq!(
        messages(&result),
        vec!["Protovalidate message rules on message \"Order\" have changed."]
    );
    assert_eq!(result.annotations[0].location.element_type, "message");
    assert_eq!(result.annotations[0].location.element_name, "shop.v1.Order");
}

#[test]
fn test_nested_message_rule_removed() {
    let against = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message User {
  string name = 1;
  message Address {
    option (buf.validate.message).disabled = true;
    string city = 1;
  }
}
"#;
    let current = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message User {
  string name = 1;
  message Address {
    string city = 1;
  }
}
"#;

    let result = check(current, against);
    assert_eq!(
        messages(&result),
        vec!["Protovalidate message rules on message \"Address\" have changed."]
    );
    assert_eq!(result.annotations[0].location.element_name, "shop.v1.User.Address");
}

#[test]
fn test_renamed_message_is_not_compared() {
    let against = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  string id = 1 [(buf.validate.field).string.min_len = 1];
}
"#;
    let current = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Purchase {
  string id = 1 [(buf.validate.field).string.min_len = 5];
}
"#;

    let result = check(current, against);
    assert!(!result.has_annotations);
}

#[test]
fn test_fields_pair_by_number_not_name() {
    let against = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  string id = 1 [(buf.validate.field).string.min_len = 1];
}
"#;
    let current = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  string order_id = 1 [(buf.validate.field).string.min_len = 1];
  string note = 2 [(buf.validate.field).string.max_len = 100];
}
"#;

    // Field 1 was renamed with the same rules and field 2 is new.
    let result = check(current, against);
    assert!(!result.has_annotations, "unexpected: {:?}", messages(&result));
}

#[test]
fn test_deleted_field_is_not_reported() {
    let against = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  string id = 1;
  string note = 2 [(buf.validate.field).string.max_len = 100];
}
"#;
    let current = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  string id = 1;
}
"#;

    let result = check(current, against);
    assert!(!result.has_annotations);
}

#[test]
fn test_resolved_field_rules() {
    let proto = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  string id = 1 [(buf.validate.field).string.min_len = 3];
  int32 quantity = 2;
}
"#;

    let schema_set = SchemaSet::from_source(FILE, proto, INCLUDES).unwrap();
    assert!(schema_set.rule_schema.is_some());

    let resolver = ProtovalidateResolver::new(schema_set.rule_schema.clone());
    let file = schema_set.file(FILE).unwrap();
    let order = file.message("Order").unwrap();

    let id_rules = resolver.resolve_field_rules(order.field(1).unwrap()).unwrap();
    assert_eq!(id_rules.kind, RuleKind::Field);
    assert_eq!(id_rules.rules.type_name, "buf.validate.FieldRules");
    let Some(RuleValue::Message(string_rules)) = id_rules.rules.fields.get("string") else {
        panic!("expected string rules, got {:?}", id_rules.rules);
    };
    assert_eq!(string_rules.fields.get("min_len"), Some(&RuleValue::Uint(3)));

    let quantity_rules = resolver.resolve_field_rules(order.field(2).unwrap()).unwrap();
    assert!(quantity_rules.is_empty());

    let message_rules = resolver.resolve_message_rules(order).unwrap();
    assert!(message_rules.is_empty());
}

#[test]
fn test_fingerprint_is_stable() {
    let proto = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  string id = 1 [(buf.validate.field).string.min_len = 3];
}
"#;

    let fingerprint = || {
        let schema_set = SchemaSet::from_source(FILE, proto, INCLUDES).unwrap();
        let resolver = ProtovalidateResolver::new(schema_set.rule_schema.clone());
        let field = schema_set.file(FILE).unwrap().message("Order").unwrap().field(1).unwrap();
        resolver.resolve_field_rules(field).unwrap().fingerprint().unwrap()
    };

    let first = fingerprint();
    assert_eq!(first, fingerprint());
    assert_eq!(first.len(), 64);
}

#[test]
fn test_repeated_runs_are_identical() {
    let against = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  string id = 1 [(buf.validate.field).string.min_len = 1];
  double total = 2;
}
"#;
    let current = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  option (buf.validate.message).disabled = true;
  string id = 1 [(buf.validate.field).string.min_len = 2];
  double total = 2 [(buf.validate.field).double.lt = 1000.0];
}
"#;

    let first = check(current, against);
    let second = check(current, against);
    assert_eq!(first.annotations, second.annotations);
    assert_eq!(
        messages(&first),
        vec![
            "Protovalidate message rules on message \"Order\" have changed.",
            "Protovalidate field rules on field \"shop.v1.Order.id\" have changed.",
            "Protovalidate field rules on field \"shop.v1.Order.total\" have changed.",
        ]
    );
}

#[test]
fn test_missing_import_fails() {
    let proto = r#"
syntax = "proto3";
package shop.v1;
import "buf/validate/validate.proto";

message Order {
  string id = 1;
}
"#;

    let no_includes: &[&str] = &[];
    assert!(check_sources(FILE, proto, proto, no_includes).is_err());
}

#[test]
fn test_directory_schemas_pair_files_by_path() {
    use protovalidate_breaking::{CheckConfig, CheckEngine};
    use std::path::{Path, PathBuf};

    fn write(root: &Path, name: &str, content: &str) -> PathBuf {
        let path = root.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    let header = "syntax = \"proto3\";\npackage shop.v1;\nimport \"buf/validate/validate.proto\";\n";
    let current_dir = tempfile::tempdir().unwrap();
    let against_dir = tempfile::tempdir().unwrap();

    let current_inputs = vec![
        write(
            current_dir.path(),
            "shop/v1/order.proto",
            &format!("{header}message Order {{ string id = 1 [(buf.validate.field).string.min_len = 2]; }}\n"),
        ),
        write(
            current_dir.path(),
            "shop/v1/added.proto",
            &format!("{header}message Added {{ string id = 1 [(buf.validate.field).required = true]; }}\n"),
        ),
    ];
    let against_inputs = vec![write(
        against_dir.path(),
        "shop/v1/order.proto",
        &format!("{header}message Order {{ string id = 1 [(buf.validate.field).string.min_len = 1]; }}\n"),
    )];

    let current = SchemaSet::load([current_dir.path(), Path::new(INCLUDES[0])], &current_inputs).unwrap();
    let against = SchemaSet::load([against_dir.path(), Path::new(INCLUDES[0])], &against_inputs).unwrap();
    assert!(current.file("shop/v1/added.proto").is_some());

    let result = CheckEngine::new()
        .check(&current, &against, &CheckConfig::default())
        .unwrap();
    assert_eq!(result.checked_file_pairs, 1);
    assert_eq!(
        messages(&result),
        vec!["Protovalidate field rules on field \"shop.v1.Order.id\" have changed."]
    );

    let ignoring = CheckConfig {
        ignore: vec!["shop".to_string()],
        ..Default::default()
    };
    let result = CheckEngine::new().check(&current, &against, &ignoring).unwrap();
    assert!(!result.has_annotations);
}
