//! The canonical database: collections and relationships of the model

use std::path::Path;

use super::types::{Region, Resource, Service, TypeDefinition, UsesType};
use crate::error::{ModelError, StoreError};
use crate::store::{EntityCollection, EntityId, Lookup, Record, RelationshipCollection, Snapshot};

pub const HAS_RESOURCE: &str = "has_resource";
pub const USES_TYPE: &str = "uses_type";
pub const REGION_HAS_RESOURCE: &str = "region_has_resource";

/// Every collection and relationship of the canonical model
#[derive(Debug, Clone)]
pub struct SpecDatabase {
    pub services: EntityCollection<Service>,
    pub resources: EntityCollection<Resource>,
    pub type_definitions: EntityCollection<TypeDefinition>,
    pub regions: EntityCollection<Region>,
    pub has_resource: RelationshipCollection<Service, Resource>,
    pub uses_type: RelationshipCollection<Resource, TypeDefinition, UsesType>,
    pub region_has_resource: RelationshipCollection<Region, Resource>,
}

impl Default for SpecDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl SpecDatabase {
    pub fn new() -> Self {
        Self {
            services: EntityCollection::new(),
            resources: EntityCollection::new(),
            type_definitions: EntityCollection::new(),
            regions: EntityCollection::new(),
            has_resource: RelationshipCollection::new(HAS_RESOURCE),
            uses_type: RelationshipCollection::new(USES_TYPE),
            region_has_resource: RelationshipCollection::new(REGION_HAS_RESOURCE),
        }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn resource_by_type_name(&self, type_name: &str) -> Result<Option<&Record<Resource>>, StoreError> {
        self.resources
            .lookup("type_name", Lookup::Equals(type_name))?
            .only_or_none()
    }

    pub fn service_by_name(&self, name: &str) -> Result<Option<&Record<Service>>, StoreError> {
        self.services.lookup("name", Lookup::Equals(name))?.only_or_none()
    }

    pub fn region_by_name(&self, name: &str) -> Result<Option<&Record<Region>>, StoreError> {
        self.regions.lookup("name", Lookup::Equals(name))?.only_or_none()
    }

    /// Find the resource with this type name or create an empty one
    pub fn upsert_resource(&mut self, type_name: &str) -> Result<EntityId, StoreError> {
        if let Some(existing) = self.resource_by_type_name(type_name)? {
            return Ok(existing.id);
        }
        Ok(self.resources.allocate(Resource::new(type_name)).id)
    }

    /// Find or create a service
    pub fn upsert_service(&mut self, service: Service) -> Result<EntityId, StoreError> {
        if let Some(existing) = self.service_by_name(&service.name)? {
            return Ok(existing.id);
        }
        Ok(self.services.allocate(service).id)
    }

    /// Find or create a region
    pub fn upsert_region(&mut self, name: &str) -> Result<EntityId, StoreError> {
        if let Some(existing) = self.region_by_name(name)? {
            return Ok(existing.id);
        }
        Ok(self.regions.allocate(Region { name: name.to_string() }).id)
    }

    /// Type definitions reachable from a resource, with the property path of each use
    pub fn types_of(
        &self,
        resource: EntityId,
    ) -> Result<Vec<(&Record<TypeDefinition>, &UsesType)>, StoreError> {
        self.uses_type.follow(resource, &self.type_definitions)
    }

    /// Resources of a service
    pub fn resources_of(&self, service: EntityId) -> Result<Vec<&Record<Resource>>, StoreError> {
        Ok(self
            .has_resource
            .follow(service, &self.resources)?
            .into_iter()
            .map(|(r, _)| r)
            .collect())
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    pub fn save(&self) -> Result<Snapshot, StoreError> {
        let mut snapshot = Snapshot::new();
        snapshot.put_entities(&self.services)?;
        snapshot.put_entities(&self.resources)?;
        snapshot.put_entities(&self.type_definitions)?;
        snapshot.put_entities(&self.regions)?;
        snapshot.put_relationship(&self.has_resource)?;
        snapshot.put_relationship(&self.uses_type)?;
        snapshot.put_relationship(&self.region_has_resource)?;
        Ok(snapshot.seal())
    }

    pub fn load(snapshot: &Snapshot) -> Result<Self, StoreError> {
        snapshot.verify()?;
        Ok(Self {
            services: snapshot.take_entities()?,
            resources: snapshot.take_entities()?,
            type_definitions: snapshot.take_entities()?,
            regions: snapshot.take_entities()?,
            has_resource: snapshot.take_relationship(HAS_RESOURCE)?,
            uses_type: snapshot.take_relationship(USES_TYPE)?,
            region_has_resource: snapshot.take_relationship(REGION_HAS_RESOURCE)?,
        })
    }

    pub fn save_to_file(&self, path: &Path, pretty: bool) -> Result<(), ModelError> {
        self.save()?.save_to_file(path, pretty)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ModelError> {
        let snapshot = Snapshot::load_from_file(path)?;
        Ok(Self::load(&snapshot)?)
    }

    /// Entity and edge counts, in a stable order
    pub fn stats(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("services", self.services.len()),
            ("resources", self.resources.len()),
            ("type_definitions", self.type_definitions.len()),
            ("regions", self.regions.len()),
            (HAS_RESOURCE, self.has_resource.len()),
            (USES_TYPE, self.uses_type.len()),
            (REGION_HAS_RESOURCE, self.region_has_resource.len()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::{Property, PropertyType};

    fn sample() -> SpecDatabase {
        let mut db = SpecDatabase::new();
        let svc = db.upsert_service(Service::for_type_name("AWS::S3::Bucket").unwrap()).unwrap();
        let bucket = db.upsert_resource("AWS::S3::Bucket").unwrap();
        let tag = db.type_definitions.allocate(TypeDefinition::shell("Tag")).id;
        db.resources
            .update(bucket, |r| {
                r.properties.insert(
                    "Tags".into(),
                    Property::new(PropertyType::array(PropertyType::Ref { reference: tag })),
                );
            })
            .unwrap();
        db.has_resource.add(svc, bucket, ());
        db.uses_type.add(bucket, tag, UsesType { via: "Tags".into() });
        db
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut db = SpecDatabase::new();
        let a = db.upsert_resource("AWS::S3::Bucket").unwrap();
        let b = db.upsert_resource("AWS::S3::Bucket").unwrap();
        assert_eq!(a, b);
        assert_eq!(db.resources.len(), 1);
    }

    #[test]
    fn test_save_load_round_trip() {
        let db = sample();
        let loaded = SpecDatabase::load(&db.save().unwrap()).unwrap();

        let bucket = loaded.resource_by_type_name("AWS::S3::Bucket").unwrap().unwrap();
        let original = db.resource_by_type_name("AWS::S3::Bucket").unwrap().unwrap();
        assert_eq!(bucket, original);

        let types: Vec<_> = loaded.types_of(bucket.id).unwrap().into_iter().map(|(t, u)| (t.name.clone(), u.via.clone())).collect();
        assert_eq!(types, vec![("Tag".to_string(), "Tags".to_string())]);
        assert_eq!(loaded.stats(), db.stats());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("model.json");
        let db = sample();
        db.save_to_file(&path, true).unwrap();
        let loaded = SpecDatabase::load_from_file(&path).unwrap();
        assert_eq!(loaded.resources.len(), 1);
        assert_eq!(loaded.uses_type.len(), 1);
    }
}
