//! Checksum utilities for snapshots and schema fingerprints

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Keys that carry documentation only and never affect a schema's shape
const DOCUMENTATION_KEYS: &[&str] = &["description", "title", "$comment", "markdownDescription"];

/// SHA256 checksum
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum from a JSON value
    ///
    /// `serde_json` objects serialize with sorted keys, so equal values hash equally.
    pub fn from_json(value: &Value) -> Self {
        let canonical = serde_json::to_string(value).unwrap_or_default();
        Self::from_bytes(canonical.as_bytes())
    }

    /// Structural fingerprint of a schema fragment: documentation is ignored
    /// at every level, everything else counts.
    pub fn fingerprint(schema: &Value) -> Self {
        Self::from_json(&strip_documentation(schema))
    }
}

/// Keys whose value maps names to schemas rather than being a schema itself
const NAME_MAP_KEYS: &[&str] = &["properties", "patternProperties", "definitions", "$defs"];

fn strip_documentation(value: &Value) -> Value {
    strip(value, false)
}

fn strip(value: &Value, is_name_map: bool) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| is_name_map || !DOCUMENTATION_KEYS.contains(&k.as_str()))
                .map(|(k, v)| {
                    let child_is_name_map = !is_name_map && NAME_MAP_KEYS.contains(&k.as_str());
                    (k.clone(), strip(v, child_is_name_map))
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| strip(v, false)).collect()),
        other => other.clone(),
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checksum_consistency() {
        let value = json!({"name": "test", "version": "1.0.0"});
        assert_eq!(Checksum::from_json(&value), Checksum::from_json(&value.clone()));
    }

    #[test]
    fn test_checksum_different_content() {
        assert_ne!(
            Checksum::from_json(&json!({"name": "test1"})),
            Checksum::from_json(&json!({"name": "test2"}))
        );
    }

    #[test]
    fn test_fingerprint_ignores_documentation() {
        let a = json!({
            "type": "object",
            "description": "A tag",
            "properties": {"Key": {"type": "string", "description": "The key"}}
        });
        let b = json!({
            "type": "object",
            "description": "Another tag",
            "properties": {"Key": {"type": "string"}}
        });
        assert_eq!(Checksum::fingerprint(&a), Checksum::fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_keeps_properties_named_like_documentation() {
        let a = json!({"type": "object", "properties": {"description": {"type": "string"}}});
        let b = json!({"type": "object", "properties": {}});
        assert_ne!(Checksum::fingerprint(&a), Checksum::fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_sees_shape() {
        let a = json!({"type": "object", "properties": {"Key": {"type": "string"}}});
        let b = json!({"type": "object", "properties": {"Key": {"type": "integer"}}});
        assert_ne!(Checksum::fingerprint(&a), Checksum::fingerprint(&b));
    }
}
