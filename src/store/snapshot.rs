//! Snapshot Persistence
//!
//! The persisted model is one JSON document:
//!
//! ```text
//! {
//!   "format_version": "1.0.0",
//!   "created_at": "...",
//!   "checksum": "<sha256 of entities + relationships>",
//!   "entities":      { "<collection>": [ { "$id": 1, ...fields }, ... ] },
//!   "relationships": { "<name>": { "<from id>": [ { "$id": 2, "attrs": ... } ] } }
//! }
//! ```
//!
//! Only forward adjacency is stored. Indexes and backward adjacency are
//! rebuilt on load.

use chrono::{DateTime, Utc};
use semver::Version;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::collection::EntityCollection;
use super::relationship::{Edge, RelationshipCollection};
use super::{Entity, EntityId, Record};
use crate::checksum::Checksum;
use crate::error::{ModelError, StoreError};

/// Current snapshot format
pub const SNAPSHOT_FORMAT_VERSION: &str = "1.0.0";

/// Serializable image of a whole database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: Version,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<Checksum>,
    #[serde(default)]
    pub entities: BTreeMap<String, Value>,
    #[serde(default)]
    pub relationships: BTreeMap<String, Value>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl Snapshot {
    pub fn new() -> Self {
        Self {
            format_version: current_version(),
            created_at: Utc::now(),
            checksum: None,
            entities: BTreeMap::new(),
            relationships: BTreeMap::new(),
        }
    }

    /// Store an entity collection, preserving insertion order
    pub fn put_entities<E: Entity>(&mut self, collection: &EntityCollection<E>) -> Result<(), StoreError> {
        let records: Vec<&Record<E>> = collection.all().collect();
        let value = serde_json::to_value(records).map_err(|source| StoreError::Decode {
            section: E::COLLECTION.to_string(),
            source,
        })?;
        self.entities.insert(E::COLLECTION.to_string(), value);
        Ok(())
    }

    /// Rebuild an entity collection. A missing section yields an empty collection.
    pub fn take_entities<E: Entity>(&self) -> Result<EntityCollection<E>, StoreError> {
        let Some(value) = self.entities.get(E::COLLECTION) else {
            return Ok(EntityCollection::new());
        };
        let records: Vec<Record<E>> =
            serde_json::from_value(value.clone()).map_err(|source| StoreError::Decode {
                section: E::COLLECTION.to_string(),
                source,
            })?;
        EntityCollection::from_records(records)
    }

    /// Store the forward adjacency of a relationship
    pub fn put_relationship<F, T, A>(
        &mut self,
        relationship: &RelationshipCollection<F, T, A>,
    ) -> Result<(), StoreError>
    where
        F: Entity,
        T: Entity,
        A: Clone + PartialEq + Serialize,
    {
        let value = serde_json::to_value(relationship.forward()).map_err(|source| StoreError::Decode {
            section: relationship.name().to_string(),
            source,
        })?;
        self.relationships.insert(relationship.name().to_string(), value);
        Ok(())
    }

    /// Rebuild a relationship. A missing section yields an empty relationship.
    pub fn take_relationship<F, T, A>(
        &self,
        name: &'static str,
    ) -> Result<RelationshipCollection<F, T, A>, StoreError>
    where
        F: Entity,
        T: Entity,
        A: Clone + PartialEq + DeserializeOwned,
    {
        let Some(value) = self.relationships.get(name) else {
            return Ok(RelationshipCollection::new(name));
        };
        let forward: BTreeMap<EntityId, Vec<Edge<A>>> =
            serde_json::from_value(value.clone()).map_err(|source| StoreError::Decode {
                section: name.to_string(),
                source,
            })?;
        Ok(RelationshipCollection::from_forward(name, forward))
    }

    /// Checksum of the content sections
    pub fn content_checksum(&self) -> Checksum {
        Checksum::from_json(&serde_json::json!({
            "entities": self.entities,
            "relationships": self.relationships,
        }))
    }

    /// Stamp the content checksum
    pub fn seal(mut self) -> Self {
        self.checksum = Some(self.content_checksum());
        self
    }

    /// Check format compatibility and, when present, the checksum
    pub fn verify(&self) -> Result<(), StoreError> {
        let expected = current_version();
        if self.format_version.major != expected.major {
            return Err(StoreError::IncompatibleSnapshot {
                found: self.format_version.clone(),
                expected,
            });
        }
        if let Some(checksum) = &self.checksum {
            let actual = self.content_checksum();
            if *checksum != actual {
                return Err(StoreError::ChecksumMismatch {
                    expected: checksum.to_string(),
                    actual: actual.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Write to a file
    pub fn save_to_file(&self, path: &Path, pretty: bool) -> Result<(), ModelError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        fs::write(path, content)?;
        Ok(())
    }

    /// Read from a file and verify it
    pub fn load_from_file(path: &Path) -> Result<Self, ModelError> {
        let content = fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        snapshot.verify()?;
        Ok(snapshot)
    }
}

fn current_version() -> Version {
    Version::new(1, 0, 0)
}
