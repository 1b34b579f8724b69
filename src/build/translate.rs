//! Type Translation
//!
//! Turns resolved schema nodes into [`PropertyType`]s, allocating a
//! [`TypeDefinition`] for every record-like object. Record-like nodes are
//! deduplicated per resource by their structural fingerprint, so repeated
//! shapes share one type definition. A type definition is allocated as an
//! empty shell and registered before its own properties are translated,
//! which is what terminates self-referential schemas.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::warn;

use super::resolve::{Combinator, ResolvedSchema, Resolver, Shape};
use crate::checksum::Checksum;
use crate::error::InterpretError;
use crate::model::{Property, PropertyMap, PropertyType, SpecDatabase, TypeDefinition, UsesType};
use crate::store::EntityId;
use crate::unify::{is_map_like, is_record_like, is_unconstrained, map_value_schemas, unify_all};

/// A property or attribute that could not be translated
#[derive(Debug)]
pub struct Failure {
    /// Dotted property path inside the resource
    pub path: String,
    pub error: InterpretError,
}

/// Per-resource translation state
pub struct TypeTranslator<'b, 'd> {
    db: &'b mut SpecDatabase,
    resource: EntityId,
    resolver: Resolver<'d>,
    seen: HashMap<Checksum, EntityId>,
    names: HashSet<String>,
    failures: Vec<Failure>,
}

impl<'b, 'd> TypeTranslator<'b, 'd> {
    pub fn new(db: &'b mut SpecDatabase, resource: EntityId, document: &'d Value) -> Self {
        Self {
            db,
            resource,
            resolver: Resolver::new(document),
            seen: HashMap::new(),
            names: HashSet::new(),
            failures: Vec::new(),
        }
    }

    pub fn resolver(&self) -> Resolver<'d> {
        self.resolver
    }

    /// Failures recorded so far, in the order they happened
    pub fn into_failures(self) -> Vec<Failure> {
        self.failures
    }

    /// Record a failure. Fatal errors are handed back instead.
    pub fn record(&mut self, path: &str, error: InterpretError) -> Result<(), InterpretError> {
        if error.is_fatal() {
            return Err(error);
        }
        warn!(property = path, error = %error, "Skipping property");
        self.failures.push(Failure {
            path: path.to_string(),
            error,
        });
        Ok(())
    }

    /// Translate every entry of `schema.properties`, skipping the names in
    /// `exclude`. Untranslatable properties are recorded and omitted.
    pub fn translate_properties(
        &mut self,
        prefix: &str,
        schema: &Value,
        exclude: &HashSet<String>,
    ) -> Result<PropertyMap, InterpretError> {
        let mut out = PropertyMap::new();
        let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
            return Ok(out);
        };
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        for (name, property_schema) in properties {
            if exclude.contains(name) {
                continue;
            }
            let path = join_path(prefix, name);
            match self.translate_property(&path, name, property_schema) {
                Ok(mut property) => {
                    property.required = required.contains(&name.as_str());
                    out.insert(name.clone(), property);
                }
                Err(e) => self.record(&path, e)?,
            }
        }
        Ok(out)
    }

    /// Translate one property schema
    pub fn translate_property(&mut self, path: &str, name: &str, schema: &Value) -> Result<Property, InterpretError> {
        let resolved = self.resolver.resolve(schema)?;
        let ty = self.translate(path, name, &resolved)?;

        let mut property = Property::new(ty);
        property.documentation = documentation(schema).or_else(|| documentation(resolved.schema));
        property.default_value = schema.get("default").or_else(|| resolved.schema.get("default")).cloned();
        property.deprecated = schema.get("deprecated").and_then(Value::as_bool).unwrap_or(false);
        Ok(property)
    }

    /// Translate a resolved node. `hint` names a type definition when the
    /// node was not reached through a named reference.
    pub fn translate(&mut self, path: &str, hint: &str, resolved: &ResolvedSchema<'_>) -> Result<PropertyType, InterpretError> {
        match &resolved.shape {
            Shape::Combinator {
                op: Combinator::AllOf,
                branches,
            } => self.translate_all_of(path, hint, branches),
            Shape::Combinator { branches, .. } => {
                let mut types: Vec<PropertyType> = Vec::new();
                let mut rendered: Vec<String> = Vec::new();
                for branch in branches {
                    let ty = self.translate(path, hint, branch)?;
                    let key = ty.render(&self.db.type_definitions)?;
                    if !rendered.contains(&key) {
                        rendered.push(key);
                        types.push(ty);
                    }
                }
                match types.len() {
                    0 => Err(InterpretError::Unsupported {
                        path: path.to_string(),
                        reason: "combinator without branches".to_string(),
                    }),
                    1 => Ok(types.remove(0)),
                    _ => Ok(PropertyType::Union { types }),
                }
            }
            Shape::Array { items: None } => Ok(PropertyType::array(PropertyType::Json)),
            Shape::Array { items: Some(items) } => Ok(PropertyType::array(self.translate(path, hint, items)?)),
            Shape::Concrete => self.translate_concrete(path, resolved.name.as_deref().unwrap_or(hint), resolved.schema),
        }
    }

    fn translate_all_of(
        &mut self,
        path: &str,
        hint: &str,
        branches: &[ResolvedSchema<'_>],
    ) -> Result<PropertyType, InterpretError> {
        let constrained: Vec<&ResolvedSchema<'_>> =
            branches.iter().filter(|b| !is_unconstrained(b.schema)).collect();
        match constrained.as_slice() {
            [] => Ok(PropertyType::Json),
            [single] => self.translate(path, hint, single),
            several => {
                let schemas: Vec<Value> = several.iter().map(|b| b.schema.clone()).collect();
                let unified = unify_all(&schemas)?;
                let name = several.iter().find_map(|b| b.name.as_deref()).unwrap_or(hint).to_string();
                let resolved = self.resolver.resolve(&unified)?;
                self.translate(path, &name, &resolved)
            }
        }
    }

    fn translate_concrete(&mut self, path: &str, name: &str, schema: &Value) -> Result<PropertyType, InterpretError> {
        let unsupported = |reason: String| InterpretError::Unsupported {
            path: path.to_string(),
            reason,
        };

        match schema.get("type") {
            Some(Value::String(t)) => match t.as_str() {
                "string" => Ok(match schema.get("format").and_then(Value::as_str) {
                    Some("date-time") => PropertyType::DateTime,
                    _ => PropertyType::String,
                }),
                "number" | "integer" => Ok(PropertyType::Number),
                "boolean" => Ok(PropertyType::Boolean),
                "null" => Ok(PropertyType::Null),
                "object" => self.translate_object(path, name, schema),
                other => Err(unsupported(format!("type '{}'", other))),
            },
            Some(other) => Err(unsupported(format!("type {}", other))),
            None if is_record_like(schema) || is_map_like(schema) => self.translate_object(path, name, schema),
            None if schema.get("enum").and_then(Value::as_array).is_some_and(|e| e.iter().all(Value::is_string)) => {
                Ok(PropertyType::String)
            }
            None if is_unconstrained(schema) => Ok(PropertyType::Json),
            None => Err(unsupported("schema without a type".to_string())),
        }
    }

    fn translate_object(&mut self, path: &str, name: &str, schema: &Value) -> Result<PropertyType, InterpretError> {
        if is_record_like(schema) {
            return Ok(PropertyType::Ref {
                reference: self.type_definition(path, name, schema)?,
            });
        }
        if is_map_like(schema) {
            let values = map_value_schemas(schema);
            let element = match values.as_slice() {
                [single] => {
                    let resolved = self.resolver.resolve(single)?;
                    self.translate(path, name, &resolved)?
                }
                _ => {
                    let resolved = values
                        .iter()
                        .map(|value| self.resolver.resolve(value))
                        .collect::<Result<Vec<_>, _>>()?;
                    let schemas: Vec<Value> = resolved.iter().map(|r| r.schema.clone()).collect();
                    let unified = unify_all(&schemas)?;
                    let element_name = resolved.iter().find_map(|r| r.name.as_deref()).unwrap_or(name).to_string();
                    let resolved = self.resolver.resolve(&unified)?;
                    self.translate(path, &element_name, &resolved)?
                }
            };
            return Ok(PropertyType::map(element));
        }
        Ok(PropertyType::Json)
    }

    /// Find or allocate the type definition for a record-like node
    fn type_definition(&mut self, path: &str, name: &str, schema: &Value) -> Result<EntityId, InterpretError> {
        let key = Checksum::fingerprint(schema);
        let via = UsesType { via: path.to_string() };

        if let Some(&existing) = self.seen.get(&key) {
            self.db.uses_type.add(self.resource, existing, via);
            return Ok(existing);
        }

        let name = self.unique_name(name);
        let id = self.db.type_definitions.allocate(TypeDefinition::shell(&name)).id;
        self.seen.insert(key, id);
        self.db.uses_type.add(self.resource, id, via);

        let properties = self.translate_properties(path, schema, &HashSet::new())?;
        let documentation = documentation(schema);
        self.db.type_definitions.update(id, |def| {
            def.documentation = documentation;
            def.properties = properties;
        })?;
        Ok(id)
    }

    fn unique_name(&mut self, base: &str) -> String {
        let base = if base.is_empty() { "Type" } else { base };
        let mut candidate = base.to_string();
        let mut n = 2;
        while self.names.contains(&candidate) {
            candidate = format!("{}{}", base, n);
            n += 1;
        }
        self.names.insert(candidate.clone());
        candidate
    }
}

fn documentation(schema: &Value) -> Option<String> {
    schema
        .get("description")
        .or_else(|| schema.get("markdownDescription"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// `A` + `B` = `A.B`
pub fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}
