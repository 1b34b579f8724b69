//! Canonical Model Types
//!
//! The entities of the canonical model and the [`PropertyType`] union every
//! schema fragment is reduced to.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::store::{Entity, EntityCollection, EntityId, IndexDef};

// =============================================================================
// Property Types
// =============================================================================

/// Shape of a single value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PropertyType {
    String,
    Number,
    Boolean,
    DateTime,
    /// Opaque document, no further structure known
    Json,
    Null,
    /// Reference to a [`TypeDefinition`] in the same store
    Ref { reference: EntityId },
    Array { element: Box<PropertyType> },
    /// String-keyed map
    Map { element: Box<PropertyType> },
    Union { types: Vec<PropertyType> },
}

impl PropertyType {
    pub fn array(element: PropertyType) -> Self {
        Self::Array {
            element: Box::new(element),
        }
    }

    pub fn map(element: PropertyType) -> Self {
        Self::Map {
            element: Box::new(element),
        }
    }

    /// Canonical string form, resolving references through `type_definitions`
    ///
    /// Two types from different stores are equal exactly when their renderings are.
    pub fn render(&self, type_definitions: &EntityCollection<TypeDefinition>) -> Result<String, StoreError> {
        Ok(match self {
            Self::String => "string".to_string(),
            Self::Number => "number".to_string(),
            Self::Boolean => "boolean".to_string(),
            Self::DateTime => "date-time".to_string(),
            Self::Json => "json".to_string(),
            Self::Null => "null".to_string(),
            Self::Ref { reference } => type_definitions.get(*reference)?.name.clone(),
            Self::Array { element } => format!("Array<{}>", element.render(type_definitions)?),
            Self::Map { element } => format!("Map<string, {}>", element.render(type_definitions)?),
            Self::Union { types } => types
                .iter()
                .map(|t| t.render(type_definitions))
                .collect::<Result<Vec<_>, _>>()?
                .join(" | "),
        })
    }

    /// Every type definition this type mentions, directly or inside containers
    pub fn references(&self) -> Vec<EntityId> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references(&self, out: &mut Vec<EntityId>) {
        match self {
            Self::Ref { reference } => out.push(*reference),
            Self::Array { element } | Self::Map { element } => element.collect_references(out),
            Self::Union { types } => types.iter().for_each(|t| t.collect_references(out)),
            _ => {}
        }
    }
}

// =============================================================================
// Properties
// =============================================================================

/// A named slot on a resource or type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    #[serde(rename = "type")]
    pub ty: PropertyType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub causes_replacement: bool,
    /// Earlier types of this property, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_types: Vec<PropertyType>,
}

impl Property {
    pub fn new(ty: PropertyType) -> Self {
        Self {
            ty,
            required: false,
            documentation: None,
            default_value: None,
            deprecated: false,
            causes_replacement: false,
            previous_types: Vec::new(),
        }
    }

    /// Replace the type, keeping the old one in the history when it renders differently
    pub fn update_type(
        &mut self,
        ty: PropertyType,
        type_definitions: &EntityCollection<TypeDefinition>,
    ) -> Result<bool, StoreError> {
        if self.ty.render(type_definitions)? == ty.render(type_definitions)? {
            return Ok(false);
        }
        let old = std::mem::replace(&mut self.ty, ty);
        self.previous_types.push(old);
        Ok(true)
    }
}

pub type PropertyMap = BTreeMap<String, Property>;

// =============================================================================
// Entities
// =============================================================================

/// A service grouping resource types (`AWS::S3`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    /// Second segment of the name (`S3`)
    pub short_name: String,
}

impl Service {
    /// Derive a service from a resource type name, `Org::Service::Thing`
    pub fn for_type_name(type_name: &str) -> Option<Self> {
        let mut parts = type_name.split("::");
        let org = parts.next().filter(|s| !s.is_empty())?;
        let short = parts.next().filter(|s| !s.is_empty())?;
        parts.next()?;
        Some(Self {
            name: format!("{}::{}", org, short),
            short_name: short.to_string(),
        })
    }
}

impl Entity for Service {
    const COLLECTION: &'static str = "service";

    fn indexes() -> Vec<IndexDef<Self>> {
        vec![IndexDef::new("name", |s: &Service| s.name.clone())]
    }
}

/// One resource type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// External type name, e.g. `AWS::S3::Bucket`
    pub type_name: String,
    /// Last segment of the type name
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default)]
    pub properties: PropertyMap,
    #[serde(default)]
    pub attributes: PropertyMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_identifier: Vec<String>,
    #[serde(default)]
    pub is_stateful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_property: Option<String>,
}

impl Resource {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            name: type_name.rsplit("::").next().unwrap_or(type_name).to_string(),
            documentation: None,
            properties: PropertyMap::new(),
            attributes: PropertyMap::new(),
            primary_identifier: Vec::new(),
            is_stateful: false,
            tag_property: None,
        }
    }
}

impl Entity for Resource {
    const COLLECTION: &'static str = "resource";

    fn indexes() -> Vec<IndexDef<Self>> {
        vec![IndexDef::new("type_name", |r: &Resource| r.type_name.clone())]
    }
}

/// Reusable compound shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default)]
    pub properties: PropertyMap,
}

impl TypeDefinition {
    /// An empty shell, populated after allocation
    pub fn shell(name: &str) -> Self {
        Self {
            name: name.to_string(),
            documentation: None,
            properties: PropertyMap::new(),
        }
    }
}

impl Entity for TypeDefinition {
    const COLLECTION: &'static str = "type_definition";

    fn indexes() -> Vec<IndexDef<Self>> {
        vec![IndexDef::new("name", |t: &TypeDefinition| t.name.clone())]
    }
}

/// A deployment region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
}

impl Entity for Region {
    const COLLECTION: &'static str = "region";

    fn indexes() -> Vec<IndexDef<Self>> {
        vec![IndexDef::new("name", |r: &Region| r.name.clone())]
    }
}

/// Edge attribute of `uses_type`: the dotted property path holding the reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsesType {
    pub via: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_scalars_and_containers() {
        let defs = EntityCollection::new();
        let ty = PropertyType::Union {
            types: vec![
                PropertyType::array(PropertyType::String),
                PropertyType::map(PropertyType::DateTime),
                PropertyType::Null,
            ],
        };
        assert_eq!(
            ty.render(&defs).unwrap(),
            "Array<string> | Map<string, date-time> | null"
        );
    }

    #[test]
    fn test_render_reference_uses_name() {
        let mut defs = EntityCollection::new();
        let tag = defs.allocate(TypeDefinition::shell("Tag")).id;
        let ty = PropertyType::array(PropertyType::Ref { reference: tag });
        assert_eq!(ty.render(&defs).unwrap(), "Array<Tag>");
        assert_eq!(ty.references(), vec![tag]);
    }

    #[test]
    fn test_render_dangling_reference() {
        let defs = EntityCollection::new();
        let ty = PropertyType::Ref {
            reference: EntityId::fresh(),
        };
        assert!(ty.render(&defs).is_err());
    }

    #[test]
    fn test_update_type_keeps_history() {
        let defs = EntityCollection::new();
        let mut prop = Property::new(PropertyType::String);
        assert!(!prop.update_type(PropertyType::String, &defs).unwrap());
        assert!(prop.update_type(PropertyType::Number, &defs).unwrap());
        assert_eq!(prop.ty, PropertyType::Number);
        assert_eq!(prop.previous_types, vec![PropertyType::String]);
    }

    #[test]
    fn test_service_from_type_name() {
        let svc = Service::for_type_name("AWS::S3::Bucket").unwrap();
        assert_eq!(svc.name, "AWS::S3");
        assert_eq!(svc.short_name, "S3");
        assert!(Service::for_type_name("Bucket").is_none());
        assert!(Service::for_type_name("AWS::S3").is_none());
    }

    #[test]
    fn test_property_type_serde_shape() {
        let json = serde_json::to_value(PropertyType::array(PropertyType::DateTime)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "array", "element": {"type": "date-time"}})
        );
    }
}
