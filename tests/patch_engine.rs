//! Fixpoint behaviour of the patch engine

use canonical_schemas::error::PatchError;
use canonical_schemas::patch::{at_root, patch_document, Lens, PatchRegistry, StandardRules, MAX_ITERATIONS};
use serde_json::{json, Value};

fn standard() -> PatchRegistry {
    let mut registry = PatchRegistry::new();
    registry.install(&StandardRules);
    registry
}

fn flip_flag(lens: &Lens<'_>) {
    if let Some(object) = lens.as_object() {
        if let Some(flag) = object.get("flag").and_then(Value::as_bool) {
            object.replace_property("flag", Value::Bool(!flag), "flag flipped");
        }
    }
}

#[test]
fn test_one_of_required_folds_into_required() {
    let registry = standard();
    let doc = json!({
        "type": "object",
        "properties": {"A": {"type": "string"}, "B": {"type": "string"}},
        "oneOf": [{"required": ["A"]}]
    });
    let outcome = patch_document("AWS::Demo::Thing", &doc, &registry.patcher_for("AWS::Demo::Thing")).unwrap();

    assert_eq!(
        outcome.document,
        json!({
            "type": "object",
            "properties": {"A": {"type": "string"}, "B": {"type": "string"}},
            "required": ["A"]
        })
    );
    assert!(outcome.mistakes().count() >= 1);
    assert!(outcome.reports.iter().all(|r| r.subject == "AWS::Demo::Thing"));
}

#[test]
fn test_oscillating_rule_does_not_converge() {
    let mut registry = PatchRegistry::new();
    registry.register_global(at_root(flip_flag));
    let doc = json!({"flag": true});

    let err = patch_document("AWS::Demo::Flip", &doc, &registry.patcher_for("AWS::Demo::Flip")).unwrap_err();
    let PatchError::NoConvergence {
        subject,
        iterations,
        last,
        previous,
    } = err;
    assert_eq!(subject, "AWS::Demo::Flip");
    assert_eq!(iterations, MAX_ITERATIONS);
    assert_eq!(last.0.len(), 1);
    assert_eq!(previous.0.len(), 1);
    assert_ne!(last.0[0].new_value, previous.0[0].new_value);
}

#[test]
fn test_patched_output_is_stable() {
    let registry = standard();
    let doc = json!({
        "properties": {
            "Name": {"type": ["string", "null"]},
            "Flag": {"type": "boolean", "default": "FALSE"},
            "Inner": {
                "type": "object",
                "properties": {"X": {"type": ["integer"]}},
                "required": ["X", "Y"]
            },
            "Empty": {"type": "object", "properties": {}, "required": []}
        },
        "allOf": [{"required": ["Name"]}, {"required": ["Flag"]}]
    });
    let patcher = registry.patcher_for("AWS::Demo::Stable");
    let first = patch_document("AWS::Demo::Stable", &doc, &patcher).unwrap();
    assert!(first.iterations > 1);

    let second = patch_document("AWS::Demo::Stable", &first.document, &patcher).unwrap();
    assert_eq!(second.iterations, 1);
    assert!(second.reports.is_empty());
    assert_eq!(second.document, first.document);

    assert_eq!(first.document["required"], json!(["Name", "Flag"]));
    assert_eq!(first.document["properties"]["Flag"]["default"], json!(false));
    assert_eq!(first.document["properties"]["Inner"]["required"], json!(["X"]));
    assert_eq!(first.document["properties"]["Empty"], json!({"type": "object", "properties": {}}));
    assert_eq!(
        first.document["properties"]["Name"],
        json!({"anyOf": [{"type": "string"}, {"type": "null"}]})
    );
}

#[test]
fn test_subject_rules_only_apply_to_their_subject() {
    let mut registry = standard();
    registry.register_for("AWS::Demo::Special", at_root(flip_flag));
    let doc = json!({"flag": true, "properties": {}});

    let other = patch_document("AWS::Demo::Other", &doc, &registry.patcher_for("AWS::Demo::Other")).unwrap();
    assert_eq!(other.document, doc);

    let special = patch_document("AWS::Demo::Special", &doc, &registry.patcher_for("AWS::Demo::Special"));
    assert!(special.is_err());
}
