//! Standard Canonicalization Rules
//!
//! Structural defects seen across the registry corpus, corrected the same
//! way for every resource type.
//!
//! | Rule | Correction |
//! |------|------------|
//! | required-only combinators | fold into `required`, or drop alternatives |
//! | type arrays | `["string"]` → `"string"`, several types → `anyOf` carrying their keywords |
//! | empty required | remove |
//! | undeclared required | drop names not in `properties` |
//! | boolean defaults | `"true"` → `true` on boolean schemas |

use serde_json::{json, Map, Value};
use std::sync::OnceLock;

use regex::Regex;

use super::lens::{Lens, ObjectLens, PathKey};
use super::patcher::{only_objects, Patcher, RuleProvider};
use super::NO_MISTAKE;

/// Keys whose object value maps names to schemas
const NAME_MAP_KEYS: &[&str] = &["properties", "patternProperties", "definitions", "$defs"];

/// Keys whose array value is a list of schemas
const SCHEMA_LIST_KEYS: &[&str] = &["anyOf", "oneOf", "allOf", "prefixItems"];

/// Keys whose value is a single schema
const SCHEMA_KEYS: &[&str] = &["items", "additionalProperties", "not", "if", "then", "else", "contains"];

const COMBINATORS: &[&str] = &["oneOf", "anyOf", "allOf"];

/// What a document position holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// A schema
    Schema,
    /// A map from names to schemas
    NameMap,
    /// A list of schemas
    SchemaList,
    /// Anything else: keywords' values, enum members, defaults
    Data,
}

/// Classify the position of `lens` by walking its path from the root
pub fn position(lens: &Lens<'_>) -> Position {
    let Some(parent) = lens.parent() else {
        return Position::Schema;
    };
    match (position(parent), lens.key()) {
        (Position::NameMap, Some(PathKey::Property(_))) => Position::Schema,
        (Position::SchemaList, Some(PathKey::Index(_))) => Position::Schema,
        (Position::Schema, Some(PathKey::Property(key))) => {
            let key = key.as_str();
            if NAME_MAP_KEYS.contains(&key) && lens.is_object() {
                Position::NameMap
            } else if SCHEMA_LIST_KEYS.contains(&key) && lens.is_array() {
                Position::SchemaList
            } else if key == "items" && lens.is_array() {
                Position::SchemaList
            } else if SCHEMA_KEYS.contains(&key) && lens.is_object() {
                Position::Schema
            } else {
                Position::Data
            }
        }
        _ => Position::Data,
    }
}

/// Runs a rule only on objects in schema position
struct SchemaRule(fn(&Lens<'_>));

impl Patcher for SchemaRule {
    fn patch(&self, lens: &Lens<'_>) {
        if position(lens) == Position::Schema {
            (self.0)(lens);
        }
    }
}

fn on_schemas(rule: fn(&Lens<'_>)) -> impl Patcher {
    only_objects(SchemaRule(rule))
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

// =============================================================================
// Rules
// =============================================================================

/// Required lists of a combinator whose branches hold nothing but `required`
fn required_only(branches: &[Value]) -> Option<Vec<Vec<String>>> {
    branches
        .iter()
        .map(|branch| {
            let branch = branch.as_object()?;
            if branch.len() != 1 {
                return None;
            }
            string_list(branch.get("required")?)
        })
        .collect()
}

/// Whether the combinator rule rewrites `required` of this object in the
/// current pass. Other rules touching `required` wait for the next one.
fn folds_required(object: &ObjectLens<'_>) -> bool {
    COMBINATORS
        .iter()
        .filter_map(|key| object.get(key).and_then(Value::as_array))
        .any(|branches| required_only(branches).is_some())
}

/// `oneOf: [{required: [A]}]` and friends
///
/// A single alternative (or any `allOf`) is a plain requirement and is folded
/// into `required`. Several alternatives cannot be expressed in the model and
/// are dropped.
pub fn collapse_required_combinators(lens: &Lens<'_>) {
    let Some(object) = lens.as_object() else {
        return;
    };

    let mut merged = object.get("required").and_then(string_list).unwrap_or_default();
    let mut folded = false;

    for key in COMBINATORS {
        let Some(branches) = object.get(key).and_then(Value::as_array) else {
            continue;
        };
        let Some(required) = required_only(branches) else {
            continue;
        };

        if *key == "allOf" || required.len() == 1 {
            for name in required.into_iter().flatten() {
                if !merged.contains(&name) {
                    merged.push(name);
                }
            }
            folded = true;
            object.remove_property(key, &format!("{} only lists required properties", key));
        } else {
            object.remove_property(key, NO_MISTAKE);
        }
    }

    if folded {
        let value = json!(merged);
        if object.contains("required") {
            object.replace_property("required", value, "required properties folded from combinator");
        } else {
            object.add_property("required", value, "required properties folded from combinator");
        }
    }
}

/// Keywords that only constrain values of one JSON type
fn type_keywords(ty: &str) -> &'static [&'static str] {
    match ty {
        "array" => &["items", "prefixItems", "contains", "minItems", "maxItems", "uniqueItems"],
        "object" => &[
            "properties",
            "required",
            "additionalProperties",
            "patternProperties",
            "minProperties",
            "maxProperties",
        ],
        "string" => &["minLength", "maxLength", "pattern", "format"],
        "number" | "integer" => &["minimum", "maximum", "exclusiveMinimum", "exclusiveMaximum", "multipleOf"],
        _ => &[],
    }
}

/// Whether the type-array rule splits this object into `anyOf` branches in
/// the current pass
fn splits_type(object: &ObjectLens<'_>) -> bool {
    object.get("type").and_then(Value::as_array).is_some_and(|t| t.len() > 1)
        && !object.contains("anyOf")
        && !folds_required(object)
}

/// `type: ["string"]` becomes `type: "string"`; several types become `anyOf`
///
/// Keywords belonging to one of the types move into that type's branch, so
/// `{type: ["array", "null"], items: X}` becomes
/// `{anyOf: [{type: "array", items: X}, {type: "null"}]}`.
pub fn normalize_type_arrays(lens: &Lens<'_>) {
    let Some(object) = lens.as_object() else {
        return;
    };
    let Some(types) = object.get("type").and_then(Value::as_array) else {
        return;
    };

    match types.as_slice() {
        [] => object.remove_property("type", "empty type list"),
        [single] => object.replace_property("type", single.clone(), "type list with a single type"),
        several => {
            if !splits_type(&object) {
                return;
            }
            let mut moved: Vec<&str> = Vec::new();
            let branches: Vec<Value> = several
                .iter()
                .map(|ty| {
                    let mut branch = Map::new();
                    branch.insert("type".to_string(), ty.clone());
                    for key in ty.as_str().map(type_keywords).unwrap_or_default() {
                        if let Some(value) = object.get(key) {
                            branch.insert(key.to_string(), value.clone());
                            if !moved.contains(key) {
                                moved.push(*key);
                            }
                        }
                    }
                    Value::Object(branch)
                })
                .collect();

            object.remove_property("type", NO_MISTAKE);
            for key in moved {
                object.remove_property(key, NO_MISTAKE);
            }
            object.add_property("anyOf", Value::Array(branches), NO_MISTAKE);
        }
    }
}

pub fn remove_empty_required(lens: &Lens<'_>) {
    let Some(object) = lens.as_object() else {
        return;
    };
    if folds_required(&object) || splits_type(&object) {
        return;
    }
    if object.get("required").and_then(Value::as_array).is_some_and(|r| r.is_empty()) {
        object.remove_property("required", "empty required list");
    }
}

/// Names in `required` that `properties` does not declare
pub fn drop_undeclared_required(lens: &Lens<'_>) {
    let Some(object) = lens.as_object() else {
        return;
    };
    if folds_required(&object) || splits_type(&object) {
        return;
    }
    let (Some(properties), Some(required)) = (
        object.get("properties").and_then(Value::as_object),
        object.get("required").and_then(string_list),
    ) else {
        return;
    };

    let declared: Vec<String> = required.iter().filter(|n| properties.contains_key(*n)).cloned().collect();
    if declared.len() == required.len() {
        return;
    }
    let undeclared: Vec<&str> = required
        .iter()
        .filter(|n| !properties.contains_key(*n))
        .map(String::as_str)
        .collect();
    let reason = format!("required lists undeclared properties: {}", undeclared.join(", "));
    if declared.is_empty() {
        object.remove_property("required", &reason);
    } else {
        object.replace_property("required", json!(declared), &reason);
    }
}

fn boolean_string() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(?i)(true|false)$").expect("valid regex"))
}

/// `default: "true"` on a boolean schema
pub fn boolean_string_defaults(lens: &Lens<'_>) {
    let Some(object) = lens.as_object() else {
        return;
    };
    if object.get("type").and_then(Value::as_str) != Some("boolean") {
        return;
    }
    let Some(default) = object.get("default").and_then(Value::as_str) else {
        return;
    };
    if boolean_string().is_match(default) {
        let value = Value::Bool(default.eq_ignore_ascii_case("true"));
        object.replace_property("default", value, "boolean default given as a string");
    }
}

// =============================================================================
// Provider
// =============================================================================

/// The rules every registry document goes through
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl RuleProvider for StandardRules {
    fn name(&self) -> &str {
        "standard"
    }

    fn global_rules(&self) -> Vec<Box<dyn Patcher>> {
        vec![
            Box::new(on_schemas(collapse_required_combinators)),
            Box::new(on_schemas(normalize_type_arrays)),
            Box::new(on_schemas(remove_empty_required)),
            Box::new(on_schemas(drop_undeclared_required)),
            Box::new(on_schemas(boolean_string_defaults)),
        ]
    }
}
