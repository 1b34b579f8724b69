//! Schema Unification
//!
//! Merges two schema fragments that describe the same real-world type into
//! the most permissive schema accepting everything either one accepts.
//!
//! | Kind | Rule |
//! |------|------|
//! | string | enums unioned, length bounds widened, patterns alternated |
//! | number | `integer` widens to `number`, bounds widened, enums unioned |
//! | boolean, null | always unify |
//! | array | element schemas unified |
//! | record | properties unioned (shared ones unified), required intersected |
//! | map | every value schema unified into one `additionalProperties` |
//!
//! Keywords without a rule survive only when both sides agree on them.

use serde_json::{Map, Value};
use std::fmt;

use crate::error::UnifyError;

/// Keys whose value maps pattern or name to a value schema of a map-like object
const PATTERN_PROPERTIES: &str = "patternProperties";
const ADDITIONAL_PROPERTIES: &str = "additionalProperties";

/// Keys that describe a schema's shape. A schema with none of them accepts anything.
const SHAPE_KEYS: &[&str] = &[
    "type",
    "$ref",
    "enum",
    "const",
    "properties",
    "additionalProperties",
    "patternProperties",
    "items",
    "anyOf",
    "oneOf",
    "allOf",
    "not",
];

#[derive(Debug, Clone, PartialEq)]
enum Kind {
    Any,
    Ref(String),
    String,
    Number,
    Boolean,
    Null,
    Array,
    Record,
    Map,
    OpenObject,
    Unsupported(String),
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Any => write!(f, "any"),
            Kind::Ref(r) => write!(f, "reference {}", r),
            Kind::String => write!(f, "string"),
            Kind::Number => write!(f, "number"),
            Kind::Boolean => write!(f, "boolean"),
            Kind::Null => write!(f, "null"),
            Kind::Array => write!(f, "array"),
            Kind::Record => write!(f, "record object"),
            Kind::Map => write!(f, "map object"),
            Kind::OpenObject => write!(f, "open object"),
            Kind::Unsupported(why) => write!(f, "unsupported ({})", why),
        }
    }
}

/// Whether a schema constrains anything at all
pub fn is_unconstrained(schema: &Value) -> bool {
    match schema {
        Value::Bool(true) => true,
        Value::Object(map) => !SHAPE_KEYS.iter().any(|k| map.contains_key(*k)),
        _ => false,
    }
}

/// Whether an object schema declares named properties
pub fn is_record_like(schema: &Value) -> bool {
    schema.get("properties").is_some_and(Value::is_object)
}

/// Whether an object schema declares value schemas for arbitrary keys
pub fn is_map_like(schema: &Value) -> bool {
    !is_record_like(schema)
        && (schema.get(ADDITIONAL_PROPERTIES).is_some_and(|v| v.is_object() || v == &Value::Bool(true))
            || schema.get(PATTERN_PROPERTIES).is_some_and(Value::is_object))
}

/// Value schemas of a map-like object: `additionalProperties` first, then
/// every `patternProperties` entry
pub fn map_value_schemas(schema: &Value) -> Vec<Value> {
    let mut out = Vec::new();
    match schema.get(ADDITIONAL_PROPERTIES) {
        Some(Value::Bool(true)) => out.push(Value::Object(Map::new())),
        Some(v @ Value::Object(_)) => out.push(v.clone()),
        _ => {}
    }
    if let Some(Value::Object(patterns)) = schema.get(PATTERN_PROPERTIES) {
        out.extend(patterns.values().cloned());
    }
    out
}

fn kind(schema: &Value) -> Kind {
    let map = match schema {
        Value::Bool(true) => return Kind::Any,
        Value::Object(map) => map,
        other => return Kind::Unsupported(format!("schema {}", other)),
    };

    if let Some(reference) = map.get("$ref") {
        return match reference.as_str() {
            Some(r) => Kind::Ref(r.to_string()),
            None => Kind::Unsupported("non-string $ref".to_string()),
        };
    }
    if ["anyOf", "oneOf", "allOf", "not"].iter().any(|k| map.contains_key(*k)) {
        return Kind::Unsupported("combinator".to_string());
    }

    match map.get("type") {
        Some(Value::String(t)) => match t.as_str() {
            "string" => Kind::String,
            "number" | "integer" => Kind::Number,
            "boolean" => Kind::Boolean,
            "null" => Kind::Null,
            "array" => Kind::Array,
            "object" => object_kind(schema),
            other => Kind::Unsupported(format!("type {}", other)),
        },
        Some(other) => Kind::Unsupported(format!("type {}", other)),
        None if map.contains_key("properties")
            || map.contains_key(ADDITIONAL_PROPERTIES)
            || map.contains_key(PATTERN_PROPERTIES) =>
        {
            object_kind(schema)
        }
        None if map.contains_key("items") => Kind::Array,
        None => match map.get("enum").and_then(Value::as_array) {
            Some(values) if !values.is_empty() && values.iter().all(Value::is_string) => Kind::String,
            Some(_) => Kind::Unsupported("untyped enum".to_string()),
            None => Kind::Any,
        },
    }
}

fn object_kind(schema: &Value) -> Kind {
    if is_record_like(schema) {
        Kind::Record
    } else if is_map_like(schema) {
        Kind::Map
    } else {
        Kind::OpenObject
    }
}

// =============================================================================
// Unification
// =============================================================================

/// Most permissive schema accepting everything `a` or `b` accepts
pub fn unify(a: &Value, b: &Value) -> Result<Value, UnifyError> {
    if a == b {
        return Ok(a.clone());
    }

    match (kind(a), kind(b)) {
        (Kind::Unsupported(why), _) | (_, Kind::Unsupported(why)) => Err(UnifyError::Unsupported(why)),
        (Kind::Ref(left), Kind::Ref(right)) if left == right => Ok(Value::Object(common(a, b, &[]))),
        (Kind::Ref(left), right) | (right, Kind::Ref(left)) => Err(UnifyError::ReferenceMismatch {
            left,
            right: right.to_string(),
        }),
        (Kind::Any, _) | (_, Kind::Any) => Ok(Value::Object(Map::new())),
        (Kind::String, Kind::String) => Ok(unify_string(a, b)),
        (Kind::Number, Kind::Number) => Ok(unify_number(a, b)),
        (Kind::Boolean, Kind::Boolean) | (Kind::Null, Kind::Null) => Ok(Value::Object(common(a, b, &[]))),
        (Kind::Array, Kind::Array) => unify_array(a, b),
        (Kind::Record, Kind::Record) => unify_record(a, b),
        (Kind::Map, Kind::Map) => unify_map(a, b),
        (Kind::Record, Kind::Map) | (Kind::Map, Kind::Record) => Err(UnifyError::ObjectShapeMismatch),
        (Kind::OpenObject, Kind::Record | Kind::Map | Kind::OpenObject)
        | (Kind::Record | Kind::Map, Kind::OpenObject) => {
            let mut out = common(a, b, &["properties", ADDITIONAL_PROPERTIES, PATTERN_PROPERTIES, "required"]);
            out.insert("type".to_string(), Value::String("object".to_string()));
            Ok(Value::Object(out))
        }
        (left, right) => Err(UnifyError::KindMismatch {
            left: left.to_string(),
            right: right.to_string(),
        }),
    }
}

/// Fold [`unify`] left to right, stopping at the first failure
pub fn unify_all(schemas: &[Value]) -> Result<Value, UnifyError> {
    let (first, rest) = schemas.split_first().ok_or(UnifyError::Empty)?;
    rest.iter().try_fold(first.clone(), |acc, next| unify(&acc, next))
}

/// Keys present on both sides with equal values, skipping `handled`
fn common(a: &Value, b: &Value, handled: &[&str]) -> Map<String, Value> {
    let (Some(left), Some(right)) = (a.as_object(), b.as_object()) else {
        return Map::new();
    };
    left.iter()
        .filter(|(k, _)| !handled.contains(&k.as_str()))
        .filter(|(k, v)| right.get(*k) == Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn union_enums(a: &Value, b: &Value, out: &mut Map<String, Value>) {
    if let (Some(Value::Array(left)), Some(Value::Array(right))) = (a.get("enum"), b.get("enum")) {
        let mut values = left.clone();
        for v in right {
            if !values.contains(v) {
                values.push(v.clone());
            }
        }
        out.insert("enum".to_string(), Value::Array(values));
    }
}

/// Keep the wider of two numeric bounds; a bound missing on either side is dropped
fn widen(a: &Value, b: &Value, key: &str, lower: bool, out: &mut Map<String, Value>) {
    let (Some(x), Some(y)) = (a.get(key), b.get(key)) else {
        return;
    };
    let (Some(fx), Some(fy)) = (x.as_f64(), y.as_f64()) else {
        return;
    };
    let pick = if (fx <= fy) == lower { x } else { y };
    out.insert(key.to_string(), pick.clone());
}

fn unify_string(a: &Value, b: &Value) -> Value {
    let mut out = common(a, b, &["enum", "minLength", "maxLength", "pattern"]);
    union_enums(a, b, &mut out);
    widen(a, b, "minLength", true, &mut out);
    widen(a, b, "maxLength", false, &mut out);
    if let (Some(Value::String(x)), Some(Value::String(y))) = (a.get("pattern"), b.get("pattern")) {
        let pattern = if x == y { x.clone() } else { format!("({})|({})", x, y) };
        out.insert("pattern".to_string(), Value::String(pattern));
    }
    Value::Object(out)
}

fn unify_number(a: &Value, b: &Value) -> Value {
    let mut out = common(a, b, &["type", "enum", "minimum", "maximum"]);
    let both_integer = a.get("type") == Some(&Value::from("integer")) && b.get("type") == Some(&Value::from("integer"));
    let ty = if both_integer { "integer" } else { "number" };
    out.insert("type".to_string(), Value::String(ty.to_string()));
    union_enums(a, b, &mut out);
    widen(a, b, "minimum", true, &mut out);
    widen(a, b, "maximum", false, &mut out);
    Value::Object(out)
}

fn unify_array(a: &Value, b: &Value) -> Result<Value, UnifyError> {
    let mut out = common(a, b, &["items", "minItems", "maxItems"]);
    widen(a, b, "minItems", true, &mut out);
    widen(a, b, "maxItems", false, &mut out);
    if let (Some(x), Some(y)) = (a.get("items"), b.get("items")) {
        let items = unify(x, y).map_err(|e| UnifyError::Items(Box::new(e)))?;
        out.insert("items".to_string(), items);
    }
    Ok(Value::Object(out))
}

fn unify_record(a: &Value, b: &Value) -> Result<Value, UnifyError> {
    let mut out = common(a, b, &["properties", "required"]);
    let empty = Map::new();
    let left = a.get("properties").and_then(Value::as_object).unwrap_or(&empty);
    let right = b.get("properties").and_then(Value::as_object).unwrap_or(&empty);

    let mut properties = Map::new();
    for (name, schema) in left {
        let merged = match right.get(name) {
            Some(other) => unify(schema, other).map_err(|e| UnifyError::Property {
                name: name.clone(),
                source: Box::new(e),
            })?,
            None => schema.clone(),
        };
        properties.insert(name.clone(), merged);
    }
    for (name, schema) in right {
        if !left.contains_key(name) {
            properties.insert(name.clone(), schema.clone());
        }
    }
    out.insert("properties".to_string(), Value::Object(properties));

    let required_of = |schema: &Value| -> Vec<String> {
        schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(|n| n.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    };
    let right_required = required_of(b);
    let required: Vec<Value> = required_of(a)
        .into_iter()
        .filter(|name| right_required.contains(name))
        .map(Value::String)
        .collect();
    if !required.is_empty() {
        out.insert("required".to_string(), Value::Array(required));
    }
    Ok(Value::Object(out))
}

fn unify_map(a: &Value, b: &Value) -> Result<Value, UnifyError> {
    let mut out = common(a, b, &[ADDITIONAL_PROPERTIES, PATTERN_PROPERTIES]);
    let mut values = map_value_schemas(a);
    values.extend(map_value_schemas(b));
    out.insert(ADDITIONAL_PROPERTIES.to_string(), unify_all(&values)?);
    Ok(Value::Object(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity() {
        let a = json!({"type": "string", "pattern": "^a"});
        assert_eq!(unify(&a, &a).unwrap(), a);
    }

    #[test]
    fn test_string_rules() {
        let a = json!({"type": "string", "enum": ["a", "b"], "minLength": 2, "maxLength": 5, "format": "uri", "pattern": "x"});
        let b = json!({"type": "string", "enum": ["b", "c"], "minLength": 1, "maxLength": 9, "format": "email", "pattern": "y"});
        assert_eq!(
            unify(&a, &b).unwrap(),
            json!({"type": "string", "enum": ["a", "b", "c"], "minLength": 1, "maxLength": 9, "pattern": "(x)|(y)"})
        );
    }

    #[test]
    fn test_number_widens() {
        let a = json!({"type": "integer", "minimum": 0});
        let b = json!({"type": "number", "minimum": -1.5, "maximum": 3});
        assert_eq!(unify(&a, &b).unwrap(), json!({"type": "number", "minimum": -1.5}));
        let i = json!({"type": "integer", "maximum": 3});
        let j = json!({"type": "integer", "maximum": 8});
        assert_eq!(unify(&i, &j).unwrap(), json!({"type": "integer", "maximum": 8}));
    }

    #[test]
    fn test_kind_mismatch() {
        let err = unify(&json!({"type": "string"}), &json!({"type": "boolean"})).unwrap_err();
        assert_eq!(
            err,
            UnifyError::KindMismatch {
                left: "string".into(),
                right: "boolean".into()
            }
        );
    }

    #[test]
    fn test_references() {
        let a = json!({"$ref": "#/definitions/Tag", "description": "x"});
        let b = json!({"$ref": "#/definitions/Tag"});
        assert_eq!(unify(&a, &b).unwrap(), b);
        assert!(matches!(
            unify(&a, &json!({"type": "object"})),
            Err(UnifyError::ReferenceMismatch { .. })
        ));
    }

    #[test]
    fn test_unify_all_short_circuits() {
        let schemas = vec![json!({"type": "string"}), json!({"type": "null"}), json!({"type": "bogus"})];
        assert!(matches!(unify_all(&schemas), Err(UnifyError::KindMismatch { .. })));
        assert_eq!(unify_all(&[]), Err(UnifyError::Empty));
    }

    #[test]
    fn test_map_collapses_value_schemas() {
        let a = json!({"type": "object", "additionalProperties": {"type": "string", "maxLength": 3}});
        let b = json!({"type": "object", "patternProperties": {"^x": {"type": "string", "maxLength": 7}}});
        assert_eq!(
            unify(&a, &b).unwrap(),
            json!({"type": "object", "additionalProperties": {"type": "string", "maxLength": 7}})
        );
    }

    #[test]
    fn test_unconstrained() {
        assert!(is_unconstrained(&json!({"description": "doc only"})));
        assert!(!is_unconstrained(&json!({"type": "string"})));
        assert!(is_map_like(&json!({"additionalProperties": true})));
        assert!(!is_map_like(&json!({"properties": {}, "additionalProperties": {}})));
    }
}
