//! Comparing two builds of the model

use canonical_schemas::build::{BuildOptions, ModelBuilder};
use canonical_schemas::model::{diff_databases, render_tree, SpecDatabase};
use canonical_schemas::patch::{PatchRegistry, StandardRules};
use serde_json::{json, Value};

fn build(documents: &[(&str, Value)]) -> SpecDatabase {
    let mut registry = PatchRegistry::new();
    registry.install(&StandardRules);
    let mut builder = ModelBuilder::new(registry, BuildOptions::default());
    for (type_name, doc) in documents {
        builder.import_resource(type_name, doc, None).unwrap();
    }
    builder.finish().0
}

#[test]
fn test_rebuilding_the_same_sources_shows_no_changes() {
    let doc = json!({
        "definitions": {"Tag": {"type": "object", "properties": {"Key": {"type": "string"}}}},
        "properties": {"Tags": {"type": "array", "items": {"$ref": "#/definitions/Tag"}}}
    });
    let old = build(&[("AWS::S3::Bucket", doc.clone())]);
    let new = build(&[("AWS::S3::Bucket", doc)]);

    let diff = diff_databases(&old, &new).unwrap();
    assert!(diff.is_empty());
    assert_eq!(render_tree(&diff), "No changes\n");
}

#[test]
fn test_changes_between_builds() {
    let old = build(&[
        (
            "AWS::S3::Bucket",
            json!({"properties": {"Name": {"type": "string"}, "Legacy": {"type": "boolean"}}}),
        ),
        ("AWS::S3::Gone", json!({"properties": {}})),
    ]);
    let new = build(&[
        (
            "AWS::S3::Bucket",
            json!({"properties": {"Name": {"type": "integer"}, "Versioning": {"type": "boolean"}}}),
        ),
        ("AWS::SNS::Topic", json!({"properties": {}})),
    ]);

    let diff = diff_databases(&old, &new).unwrap();
    assert_eq!(diff.resources.added, vec!["AWS::SNS::Topic"]);
    assert_eq!(diff.resources.removed, vec!["AWS::S3::Gone"]);
    assert_eq!(diff.resources.updated.len(), 1);
    assert_eq!(diff.services.added, vec!["AWS::SNS"]);

    let bucket = &diff.resources.updated[0];
    assert_eq!(bucket.type_name, "AWS::S3::Bucket");
    assert_eq!(bucket.properties.added, vec!["Versioning"]);
    assert_eq!(bucket.properties.removed, vec!["Legacy"]);

    let tree = render_tree(&diff);
    assert!(tree.contains("+ AWS::SNS::Topic"));
    assert!(tree.contains("- AWS::S3::Gone"));
    assert!(tree.contains("~ AWS::S3::Bucket"));
    assert!(tree.contains("type: \"string\" -> \"number\""));
}
