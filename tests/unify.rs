//! Algebraic properties of schema unification

use canonical_schemas::error::UnifyError;
use canonical_schemas::unify::{unify, unify_all};
use rstest::rstest;
use serde_json::{json, Value};

#[rstest]
#[case::strings(
    json!({"type": "string", "minLength": 2, "maxLength": 4}),
    json!({"type": "string", "minLength": 1, "maxLength": 8})
)]
#[case::integer_and_number(json!({"type": "integer", "minimum": 0}), json!({"type": "number", "minimum": 5}))]
#[case::records(
    json!({"type": "object", "properties": {"A": {"type": "string"}}, "required": ["A"]}),
    json!({"type": "object", "properties": {"B": {"type": "boolean"}}, "required": ["B"]})
)]
#[case::maps(
    json!({"type": "object", "additionalProperties": {"type": "integer"}}),
    json!({"type": "object", "additionalProperties": {"type": "number"}})
)]
#[case::arrays(
    json!({"type": "array", "items": {"type": "string", "maxLength": 3}}),
    json!({"type": "array", "items": {"type": "string", "maxLength": 9}})
)]
#[case::anything(json!({"description": "free-form"}), json!({"type": "boolean"}))]
#[case::booleans(json!({"type": "boolean", "description": "on"}), json!({"type": "boolean"}))]
#[case::same_reference(json!({"$ref": "#/definitions/Tag", "description": "x"}), json!({"$ref": "#/definitions/Tag"}))]
fn test_unify_is_symmetric(#[case] a: Value, #[case] b: Value) {
    assert_eq!(unify(&a, &b).unwrap(), unify(&b, &a).unwrap());
}

#[rstest]
#[case::string_vs_boolean(json!({"type": "string"}), json!({"type": "boolean"}))]
#[case::record_vs_map(
    json!({"type": "object", "properties": {"A": {}}}),
    json!({"type": "object", "additionalProperties": {"type": "string"}})
)]
#[case::reference_vs_string(json!({"$ref": "#/definitions/Tag"}), json!({"type": "string"}))]
#[case::different_references(json!({"$ref": "#/definitions/A"}), json!({"$ref": "#/definitions/B"}))]
#[case::unconstrained_vs_reference(json!({}), json!({"$ref": "#/definitions/Tag"}))]
#[case::documentation_only_vs_reference(json!({"description": "free-form"}), json!({"$ref": "#/definitions/Tag"}))]
#[case::array_items(
    json!({"type": "array", "items": {"type": "string"}}),
    json!({"type": "array", "items": {"type": "number"}})
)]
fn test_incompatible_kinds_fail_both_ways(#[case] a: Value, #[case] b: Value) {
    assert!(unify(&a, &b).is_err());
    assert!(unify(&b, &a).is_err());
}

#[rstest]
#[case(json!({"type": "string", "enum": ["a"], "pattern": "^a"}))]
#[case(json!({"type": "object", "properties": {"A": {"type": "integer"}}, "required": ["A"]}))]
#[case(json!({"$ref": "#/definitions/Tag"}))]
#[case(json!({"type": "array", "items": {"type": "boolean"}}))]
fn test_unify_with_itself_is_identity(#[case] a: Value) {
    assert_eq!(unify(&a, &a).unwrap(), a);
}

#[test]
fn test_required_is_intersected() {
    let a = json!({
        "type": "object",
        "properties": {"A": {"type": "string"}, "B": {"type": "string"}},
        "required": ["A", "B"]
    });
    let b = json!({
        "type": "object",
        "properties": {"B": {"type": "string"}, "C": {"type": "integer"}},
        "required": ["B", "C"]
    });
    let merged = unify(&a, &b).unwrap();
    assert_eq!(merged["required"], json!(["B"]));
    assert_eq!(
        merged["properties"],
        json!({"A": {"type": "string"}, "B": {"type": "string"}, "C": {"type": "integer"}})
    );
}

#[test]
fn test_incompatible_property_names_the_property() {
    let a = json!({"type": "object", "properties": {"Size": {"type": "string"}}});
    let b = json!({"type": "object", "properties": {"Size": {"type": "boolean"}}});
    match unify(&a, &b).unwrap_err() {
        UnifyError::Property { name, .. } => assert_eq!(name, "Size"),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_unify_all_folds_left() {
    let schemas = vec![
        json!({"type": "integer", "maximum": 3}),
        json!({"type": "integer", "maximum": 10}),
        json!({"type": "number", "maximum": 7}),
    ];
    assert_eq!(unify_all(&schemas).unwrap(), json!({"type": "number", "maximum": 10}));
}
