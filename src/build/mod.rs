//! Model Builder
//!
//! Imports one resource document at a time:
//!
//! ```text
//! raw document ──► patch engine ──► patched document
//!                                        │
//!              resolve + translate ◄─────┘
//!                     │
//!                     ▼
//!   Resource, TypeDefinitions, uses_type / has_resource edges
//! ```
//!
//! Interpretation failures are recorded in the [`BuildReport`] and the
//! offending property is left out. Store errors and non-convergent patching
//! abort the build.

pub mod resolve;
pub mod translate;

pub use resolve::{Combinator, ResolvedSchema, Resolver, Shape};
pub use translate::{join_path, Failure, TypeTranslator};

use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, error, info, info_span};

use crate::error::{InterpretError, Result};
use crate::legacy::LegacySpec;
use crate::model::{Property, PropertyMap, PropertyType, Service, SpecDatabase, TypeDefinition};
use crate::patch::{patch_document, pointer, PatchRegistry};
use crate::report::{BuildReport, Phase};
use crate::store::{EntityCollection, EntityId};

/// Pointer of the attribute list in registry documents
pub const DEFAULT_ATTRIBUTE_POINTER: &str = "/readOnlyProperties";

/// Builder settings
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Pointer to the list of attribute property pointers in each document
    pub attribute_pointer: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            attribute_pointer: DEFAULT_ATTRIBUTE_POINTER.to_string(),
        }
    }
}

/// Single writer of the canonical database during a build
pub struct ModelBuilder {
    db: SpecDatabase,
    registry: PatchRegistry,
    report: BuildReport,
    options: BuildOptions,
    imported: usize,
}

impl ModelBuilder {
    pub fn new(registry: PatchRegistry, options: BuildOptions) -> Self {
        Self::with_database(SpecDatabase::new(), registry, options)
    }

    /// Continue building on an existing database
    pub fn with_database(db: SpecDatabase, registry: PatchRegistry, options: BuildOptions) -> Self {
        Self {
            db,
            registry,
            report: BuildReport::new(),
            options,
            imported: 0,
        }
    }

    pub fn db(&self) -> &SpecDatabase {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut SpecDatabase {
        &mut self.db
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Record a source that could not be loaded at all
    pub fn record_load_failure(&mut self, subject: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(subject, message = %message, "Skipping source");
        self.report.add_failure(Phase::Loading, subject, None, message);
    }

    /// Patch and interpret one resource document
    ///
    /// Returns `None` when the document is not a schema object; that is
    /// recorded as a loading failure.
    pub fn import_resource(
        &mut self,
        type_name: &str,
        document: &Value,
        legacy: Option<&LegacySpec>,
    ) -> Result<Option<EntityId>> {
        let span = info_span!("import", resource = type_name);
        let _enter = span.enter();

        if !document.is_object() {
            self.record_load_failure(type_name, "document is not a JSON object");
            return Ok(None);
        }

        let outcome = patch_document(type_name, document, &self.registry.patcher_for(type_name)).map_err(|e| {
            error!(error = %e, "Patching did not converge");
            e
        })?;
        debug!(iterations = outcome.iterations, "Patched");
        for report in outcome.mistakes() {
            self.report.add_patch(report.clone());
        }

        let resource = self.db.upsert_resource(type_name)?;
        if let Some(service) = Service::for_type_name(type_name) {
            let service = self.db.upsert_service(service)?;
            self.db.has_resource.add(service, resource, ());
        }

        let doc = &outcome.document;
        let mut attribute_names = attribute_paths(doc, &self.options.attribute_pointer);
        if let Some(legacy) = legacy {
            for name in legacy.attribute_names(type_name) {
                if !attribute_names.contains(&name) {
                    attribute_names.push(name);
                }
            }
        }
        let top_level: HashSet<String> = attribute_names.iter().filter(|n| !n.contains('.')).cloned().collect();

        // A re-import replaces the type uses of the previous one
        let replaced: BTreeSet<EntityId> = self
            .db
            .uses_type
            .remove_outgoing(resource)
            .into_iter()
            .map(|e| e.id)
            .collect();

        let (properties, attributes, failures) = {
            let mut translator = TypeTranslator::new(&mut self.db, resource, doc);
            let properties = translator.translate_properties("", doc, &top_level)?;

            let mut attributes = PropertyMap::new();
            for name in &attribute_names {
                let translated = attribute_schema(translator.resolver(), name).and_then(|schema| {
                    let leaf = name.rsplit('.').next().unwrap_or(name);
                    translator.translate_property(name, leaf, schema)
                });
                match translated {
                    Ok(property) => {
                        attributes.insert(name.clone(), property);
                    }
                    Err(e) => translator.record(name, e)?,
                }
            }
            (properties, attributes, translator.into_failures())
        };

        let existing = self.db.resources.get(resource)?.entity.clone();
        let mut properties = keep_history(&existing.properties, properties, &self.db.type_definitions)?;
        let attributes = keep_history(&existing.attributes, attributes, &self.db.type_definitions)?;

        for name in pointer_list(doc, "/createOnlyProperties") {
            if let Some(property) = properties.get_mut(&name) {
                property.causes_replacement = true;
            }
        }
        for name in pointer_list(doc, "/deprecatedProperties") {
            if let Some(property) = properties.get_mut(&name) {
                property.deprecated = true;
            }
        }

        let documentation = doc
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| legacy.and_then(|l| l.documentation(type_name)).map(str::to_string));
        let primary_identifier = pointer_list(doc, "/primaryIdentifier");
        let tag_property = doc
            .pointer("/tagging/tagProperty")
            .and_then(Value::as_str)
            .and_then(property_path)
            .or_else(|| properties.contains_key("Tags").then(|| "Tags".to_string()));

        let (property_count, attribute_count) = (properties.len(), attributes.len());
        self.db.resources.update(resource, |r| {
            r.documentation = documentation;
            r.properties = properties;
            r.attributes = attributes;
            r.primary_identifier = primary_identifier;
            r.tag_property = tag_property;
        })?;

        if !replaced.is_empty() {
            let pruned = prune_type_definitions(&mut self.db, resource, replaced)?;
            debug!(pruned, "Dropped type definitions of the previous import");
        }

        for failure in &failures {
            self.report.add_failure(
                Phase::Interpreting,
                type_name,
                Some(&failure.path),
                failure.error.to_string(),
            );
        }
        self.imported += 1;
        info!(
            properties = property_count,
            attributes = attribute_count,
            failures = failures.len(),
            "Imported resource"
        );
        Ok(Some(resource))
    }

    /// Number of documents imported so far
    pub fn imported(&self) -> usize {
        self.imported
    }

    pub fn finish(self) -> (SpecDatabase, BuildReport) {
        info!(
            resources = self.db.resources.len(),
            type_definitions = self.db.type_definitions.len(),
            report_entries = self.report.len(),
            "Build finished"
        );
        (self.db, self.report)
    }
}

/// `/properties/Endpoint/Address` becomes `Endpoint.Address`
pub fn property_path(pointer_text: &str) -> Option<String> {
    let rest = pointer_text.strip_prefix("/properties/")?;
    Some(rest.split('/').map(pointer::unescape).collect::<Vec<_>>().join("."))
}

/// Property paths listed as pointers under `at`
fn pointer_list(doc: &Value, at: &str) -> Vec<String> {
    doc.pointer(at)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).filter_map(property_path).collect())
        .unwrap_or_default()
}

fn attribute_paths(doc: &Value, at: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for path in pointer_list(doc, at) {
        if !out.contains(&path) {
            out.push(path);
        }
    }
    out
}

/// Schema of a (possibly dotted) attribute path
fn attribute_schema<'d>(resolver: Resolver<'d>, name: &str) -> std::result::Result<&'d Value, InterpretError> {
    let missing = || InterpretError::MissingAttribute { name: name.to_string() };
    let mut current = resolver.root();
    let mut segments = name.split('.').peekable();
    while let Some(segment) = segments.next() {
        let schema = current
            .get("properties")
            .and_then(|p| p.get(segment))
            .ok_or_else(missing)?;
        if segments.peek().is_none() {
            return Ok(schema);
        }
        current = resolver.resolve(schema)?.schema;
    }
    Err(missing())
}

/// Carry the type history of re-imported properties forward
fn keep_history(
    old: &PropertyMap,
    new: PropertyMap,
    type_definitions: &EntityCollection<TypeDefinition>,
) -> Result<PropertyMap> {
    new.into_iter()
        .map(|(name, mut property)| -> Result<(String, Property)> {
            if let Some(previous) = old.get(&name) {
                let mut merged = previous.clone();
                merged.update_type(property.ty.clone(), type_definitions)?;
                property.previous_types = merged.previous_types;
            }
            Ok((name, property))
        })
        .collect()
}

/// Type definitions a property mentions, its history included
fn property_references(property: &Property) -> Vec<EntityId> {
    std::iter::once(&property.ty)
        .chain(&property.previous_types)
        .flat_map(PropertyType::references)
        .collect()
}

/// Delete the `candidates` that the resource no longer reaches through its
/// type uses, its property types or their history
fn prune_type_definitions(db: &mut SpecDatabase, resource: EntityId, candidates: BTreeSet<EntityId>) -> Result<usize> {
    let record = db.resources.get(resource)?;
    let mut pending: Vec<EntityId> = record
        .properties
        .values()
        .chain(record.attributes.values())
        .flat_map(property_references)
        .collect();
    pending.extend(db.uses_type.outgoing(resource).iter().map(|e| e.id));

    let mut live = HashSet::new();
    while let Some(id) = pending.pop() {
        if live.insert(id) {
            let def = db.type_definitions.get(id)?;
            pending.extend(def.properties.values().flat_map(property_references));
        }
    }

    let mut pruned = 0;
    for id in candidates.into_iter().filter(|id| !live.contains(id)) {
        db.type_definitions.remove(id)?;
        pruned += 1;
    }
    Ok(pruned)
}
