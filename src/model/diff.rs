//! Database Diffing
//!
//! Compares two databases keyed by natural keys: services and type
//! definitions by name, resources by type name. Identity tokens are never
//! compared across stores; every structured value is rendered to its
//! canonical string inside its own store first.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::database::SpecDatabase;
use super::types::{Property, PropertyMap, Resource, TypeDefinition};
use crate::error::StoreError;
use crate::store::{EntityCollection, EntityId};

// =============================================================================
// Diff Types
// =============================================================================

/// One changed scalar field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub old: String,
    pub new: String,
}

/// Added, removed and updated entries of a keyed set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyedDiff<U> {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub updated: Vec<U>,
}

impl<U> Default for KeyedDiff<U> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            updated: Vec::new(),
        }
    }
}

impl<U> KeyedDiff<U> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyDiff {
    pub name: String,
    pub changes: Vec<FieldChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDefinitionDiff {
    pub name: String,
    pub changes: Vec<FieldChange>,
    pub properties: KeyedDiff<PropertyDiff>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceDiff {
    pub type_name: String,
    pub changes: Vec<FieldChange>,
    pub properties: KeyedDiff<PropertyDiff>,
    pub attributes: KeyedDiff<PropertyDiff>,
    pub type_definitions: KeyedDiff<TypeDefinitionDiff>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceDiff {
    pub name: String,
    pub changes: Vec<FieldChange>,
}

/// Complete comparison of two databases
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatabaseDiff {
    pub services: KeyedDiff<ServiceDiff>,
    pub resources: KeyedDiff<ResourceDiff>,
}

impl DatabaseDiff {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.resources.is_empty()
    }
}

// =============================================================================
// Diffing
// =============================================================================

/// Compare `old` against `new`
pub fn diff_databases(old: &SpecDatabase, new: &SpecDatabase) -> Result<DatabaseDiff, StoreError> {
    let old_services: BTreeMap<_, _> = old.services.all().map(|s| (s.name.clone(), s)).collect();
    let new_services: BTreeMap<_, _> = new.services.all().map(|s| (s.name.clone(), s)).collect();
    let services = diff_keyed(&old_services, &new_services, |name, a, b| {
        let changes = field_changes(
            &[("short_name", a.short_name.clone())],
            &[("short_name", b.short_name.clone())],
        );
        Ok((!changes.is_empty()).then(|| ServiceDiff {
            name: name.to_string(),
            changes,
        }))
    })?;

    let old_resources: BTreeMap<_, _> = old.resources.all().map(|r| (r.type_name.clone(), r)).collect();
    let new_resources: BTreeMap<_, _> = new.resources.all().map(|r| (r.type_name.clone(), r)).collect();
    let resources = diff_keyed(&old_resources, &new_resources, |type_name, a, b| {
        let diff = ResourceDiff {
            type_name: type_name.to_string(),
            changes: field_changes(&resource_fields(a), &resource_fields(b)),
            properties: diff_properties(&a.properties, &old.type_definitions, &b.properties, &new.type_definitions)?,
            attributes: diff_properties(&a.attributes, &old.type_definitions, &b.attributes, &new.type_definitions)?,
            type_definitions: diff_type_definitions(old, a.id, new, b.id)?,
        };
        let unchanged = diff.changes.is_empty()
            && diff.properties.is_empty()
            && diff.attributes.is_empty()
            && diff.type_definitions.is_empty();
        Ok((!unchanged).then_some(diff))
    })?;

    Ok(DatabaseDiff { services, resources })
}

fn diff_keyed<V, U, F>(
    old: &BTreeMap<String, V>,
    new: &BTreeMap<String, V>,
    mut compare: F,
) -> Result<KeyedDiff<U>, StoreError>
where
    F: FnMut(&str, &V, &V) -> Result<Option<U>, StoreError>,
{
    let mut diff = KeyedDiff::default();
    for (key, old_value) in old {
        match new.get(key) {
            None => diff.removed.push(key.clone()),
            Some(new_value) => {
                if let Some(updated) = compare(key, old_value, new_value)? {
                    diff.updated.push(updated);
                }
            }
        }
    }
    diff.added = new.keys().filter(|k| !old.contains_key(*k)).cloned().collect();
    Ok(diff)
}

fn field_changes(old: &[(&str, String)], new: &[(&str, String)]) -> Vec<FieldChange> {
    old.iter()
        .zip(new)
        .filter(|((_, a), (_, b))| a != b)
        .map(|((field, a), (_, b))| FieldChange {
            field: field.to_string(),
            old: a.clone(),
            new: b.clone(),
        })
        .collect()
}

fn resource_fields(resource: &Resource) -> Vec<(&'static str, String)> {
    vec![
        ("documentation", resource.documentation.clone().unwrap_or_default()),
        ("primary_identifier", resource.primary_identifier.join(", ")),
        ("is_stateful", resource.is_stateful.to_string()),
        ("tag_property", resource.tag_property.clone().unwrap_or_default()),
    ]
}

fn property_fields(
    property: &Property,
    type_definitions: &EntityCollection<TypeDefinition>,
) -> Result<Vec<(&'static str, String)>, StoreError> {
    Ok(vec![
        ("type", property.ty.render(type_definitions)?),
        ("required", property.required.to_string()),
        ("documentation", property.documentation.clone().unwrap_or_default()),
        (
            "default",
            property.default_value.as_ref().map(|v| v.to_string()).unwrap_or_default(),
        ),
        ("deprecated", property.deprecated.to_string()),
        ("causes_replacement", property.causes_replacement.to_string()),
    ])
}

fn diff_properties(
    old: &PropertyMap,
    old_defs: &EntityCollection<TypeDefinition>,
    new: &PropertyMap,
    new_defs: &EntityCollection<TypeDefinition>,
) -> Result<KeyedDiff<PropertyDiff>, StoreError> {
    let old: BTreeMap<String, &Property> = old.iter().map(|(k, v)| (k.clone(), v)).collect();
    let new: BTreeMap<String, &Property> = new.iter().map(|(k, v)| (k.clone(), v)).collect();
    diff_keyed(&old, &new, |name, a, b| {
        let changes = field_changes(&property_fields(a, old_defs)?, &property_fields(b, new_defs)?);
        Ok((!changes.is_empty()).then(|| PropertyDiff {
            name: name.to_string(),
            changes,
        }))
    })
}

fn reachable_types(
    db: &SpecDatabase,
    resource: EntityId,
) -> Result<BTreeMap<String, &TypeDefinition>, StoreError> {
    let mut seen = BTreeSet::new();
    let mut out = BTreeMap::new();
    for (def, _) in db.types_of(resource)? {
        if seen.insert(def.id) {
            out.entry(def.name.clone()).or_insert(&def.entity);
        }
    }
    Ok(out)
}

fn diff_type_definitions(
    old: &SpecDatabase,
    old_resource: EntityId,
    new: &SpecDatabase,
    new_resource: EntityId,
) -> Result<KeyedDiff<TypeDefinitionDiff>, StoreError> {
    let old_types = reachable_types(old, old_resource)?;
    let new_types = reachable_types(new, new_resource)?;
    diff_keyed(&old_types, &new_types, |name, a, b| {
        let changes = field_changes(
            &[("documentation", a.documentation.clone().unwrap_or_default())],
            &[("documentation", b.documentation.clone().unwrap_or_default())],
        );
        let properties = diff_properties(&a.properties, &old.type_definitions, &b.properties, &new.type_definitions)?;
        Ok((!changes.is_empty() || !properties.is_empty()).then(|| TypeDefinitionDiff {
            name: name.to_string(),
            changes,
            properties,
        }))
    })
}

// =============================================================================
// Tree Rendering
// =============================================================================

struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeNode {
    fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            children: Vec::new(),
        }
    }

    fn with(mut self, child: TreeNode) -> Self {
        self.children.push(child);
        self
    }

    fn push_if_any(&mut self, child: TreeNode) {
        if !child.children.is_empty() {
            self.children.push(child);
        }
    }
}

fn changes_nodes(changes: &[FieldChange]) -> Vec<TreeNode> {
    changes
        .iter()
        .map(|c| TreeNode::new(format!("{}: {:?} -> {:?}", c.field, c.old, c.new)))
        .collect()
}

fn keyed_node<U>(label: &str, diff: &KeyedDiff<U>, updated: impl Fn(&U) -> TreeNode) -> TreeNode {
    let mut node = TreeNode::new(label);
    node.children.extend(diff.added.iter().map(|k| TreeNode::new(format!("+ {}", k))));
    node.children.extend(diff.removed.iter().map(|k| TreeNode::new(format!("- {}", k))));
    node.children.extend(diff.updated.iter().map(updated));
    node
}

fn property_node(diff: &PropertyDiff) -> TreeNode {
    let mut node = TreeNode::new(format!("~ {}", diff.name));
    node.children = changes_nodes(&diff.changes);
    node
}

fn resource_node(diff: &ResourceDiff) -> TreeNode {
    let mut node = TreeNode::new(format!("~ {}", diff.type_name));
    node.children = changes_nodes(&diff.changes);
    node.push_if_any(keyed_node("properties", &diff.properties, property_node));
    node.push_if_any(keyed_node("attributes", &diff.attributes, property_node));
    node.push_if_any(keyed_node("type definitions", &diff.type_definitions, |t| {
        let mut def = TreeNode::new(format!("~ {}", t.name));
        def.children = changes_nodes(&t.changes);
        def.push_if_any(keyed_node("properties", &t.properties, property_node));
        def
    }));
    node
}

/// Human-readable tree of a diff
pub fn render_tree(diff: &DatabaseDiff) -> String {
    if diff.is_empty() {
        return "No changes\n".to_string();
    }
    let mut root = TreeNode::new("changes");
    root.push_if_any(keyed_node("services", &diff.services, |s| {
        let mut node = TreeNode::new(format!("~ {}", s.name));
        node.children = changes_nodes(&s.changes);
        node
    }));
    root.push_if_any(keyed_node("resources", &diff.resources, resource_node));

    let mut out = format!("{}\n", root.label);
    render_children(&root.children, "", &mut out);
    out
}

fn render_children(children: &[TreeNode], prefix: &str, out: &mut String) {
    for (i, child) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        out.push_str(prefix);
        out.push_str(if last { "└── " } else { "├── " });
        out.push_str(&child.label);
        out.push('\n');
        let next = format!("{}{}", prefix, if last { "    " } else { "│   " });
        render_children(&child.children, &next, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::{PropertyType, Service, UsesType};

    fn db_with(bucket_props: &[(&str, PropertyType)]) -> SpecDatabase {
        let mut db = SpecDatabase::new();
        db.upsert_service(Service::for_type_name("AWS::S3::Bucket").unwrap()).unwrap();
        let id = db.upsert_resource("AWS::S3::Bucket").unwrap();
        let props: Vec<_> = bucket_props.iter().map(|(n, t)| (n.to_string(), t.clone())).collect();
        db.resources
            .update(id, |r| {
                for (name, ty) in props {
                    r.properties.insert(name, Property::new(ty));
                }
            })
            .unwrap();
        db
    }

    #[test]
    fn test_identical_databases() {
        let a = db_with(&[("Name", PropertyType::String)]);
        let b = db_with(&[("Name", PropertyType::String)]);
        let diff = diff_databases(&a, &b).unwrap();
        assert!(diff.is_empty());
        assert_eq!(render_tree(&diff), "No changes\n");
    }

    #[test]
    fn test_property_type_change() {
        let a = db_with(&[("Name", PropertyType::String), ("Old", PropertyType::Boolean)]);
        let b = db_with(&[("Name", PropertyType::Number), ("New", PropertyType::Boolean)]);
        let diff = diff_databases(&a, &b).unwrap();

        assert_eq!(diff.resources.updated.len(), 1);
        let props = &diff.resources.updated[0].properties;
        assert_eq!(props.added, vec!["New"]);
        assert_eq!(props.removed, vec!["Old"]);
        assert_eq!(props.updated[0].changes[0].field, "type");
        assert_eq!(props.updated[0].changes[0].new, "number");

        let tree = render_tree(&diff);
        assert!(tree.contains("└── resources"));
        assert!(tree.contains("+ New"));
        assert!(tree.contains("type: \"string\" -> \"number\""));
    }

    #[test]
    fn test_references_compare_by_rendering() {
        let build = || {
            let mut db = db_with(&[]);
            let id = db.upsert_resource("AWS::S3::Bucket").unwrap();
            // Burn an id so the two stores assign different tokens
            EntityId::fresh();
            let tag = db.type_definitions.allocate(TypeDefinition::shell("Tag")).id;
            db.resources
                .update(id, |r| {
                    r.properties
                        .insert("Tags".into(), Property::new(PropertyType::Ref { reference: tag }));
                })
                .unwrap();
            db.uses_type.add(id, tag, UsesType { via: "Tags".into() });
            db
        };
        let a = build();
        let b = build();
        assert!(diff_databases(&a, &b).unwrap().is_empty());
    }

    #[test]
    fn test_added_resource() {
        let a = db_with(&[]);
        let mut b = db_with(&[]);
        b.upsert_resource("AWS::S3::AccessPoint").unwrap();
        let diff = diff_databases(&a, &b).unwrap();
        assert_eq!(diff.resources.added, vec!["AWS::S3::AccessPoint"]);
        assert!(diff.resources.updated.is_empty());
    }
}
