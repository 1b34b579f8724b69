//! Legacy Resource Specification
//!
//! The older single-file specification lists, per resource type, the
//! attributes a resource exposes. Only the parts the builder needs are read:
//!
//! ```json
//! {
//!   "ResourceSpecificationVersion": "1.0.0",
//!   "ResourceTypes": {
//!     "AWS::S3::Bucket": {
//!       "Documentation": "http://...",
//!       "Attributes": { "Arn": {...}, "DomainName": {...} }
//!     }
//!   }
//! }
//! ```

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{ModelError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LegacyResourceType {
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

/// Parsed legacy specification
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LegacySpec {
    #[serde(default)]
    pub resource_specification_version: Option<String>,
    #[serde(default)]
    pub resource_types: BTreeMap<String, LegacyResourceType>,
}

impl LegacySpec {
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| ModelError::InvalidDocument {
            subject: "legacy specification".to_string(),
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;
        Self::from_value(value)
    }

    /// Attribute names of a resource type, possibly dotted (`Endpoint.Address`)
    pub fn attribute_names(&self, type_name: &str) -> Vec<String> {
        self.resource_types
            .get(type_name)
            .map(|r| r.attributes.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn documentation(&self, type_name: &str) -> Option<&str> {
        self.resource_types.get(type_name)?.documentation.as_deref()
    }

    pub fn len(&self) -> usize {
        self.resource_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resource_types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_names() {
        let spec = LegacySpec::from_value(json!({
            "ResourceSpecificationVersion": "1.0.0",
            "ResourceTypes": {
                "AWS::S3::Bucket": {
                    "Documentation": "http://docs/bucket",
                    "Attributes": {"Arn": {"PrimitiveType": "String"}, "DomainName": {}}
                },
                "AWS::SNS::Topic": {}
            }
        }))
        .unwrap();

        assert_eq!(spec.attribute_names("AWS::S3::Bucket"), vec!["Arn", "DomainName"]);
        assert!(spec.attribute_names("AWS::SNS::Topic").is_empty());
        assert!(spec.attribute_names("AWS::Nope::Nope").is_empty());
        assert_eq!(spec.documentation("AWS::S3::Bucket"), Some("http://docs/bucket"));
        assert_eq!(spec.len(), 2);
    }

    #[test]
    fn test_invalid_document() {
        let err = LegacySpec::from_value(json!({"ResourceTypes": []})).unwrap_err();
        assert!(matches!(err, ModelError::InvalidDocument { .. }));
    }
}
