//! In-Memory Graph Store
//!
//! General-purpose typed entity storage used for the canonical model:
//!
//! - [`EntityCollection`]: insertion-ordered entities with flat sorted secondary indexes
//! - [`RelationshipCollection`]: directed edges with optional attributes, navigable both ways
//! - [`Snapshot`]: the persisted form handed to downstream consumers
//!
//! Entities are referenced by [`EntityId`] only. A reference never owns its
//! target; every dereference goes through the collection that stores it.

pub mod collection;
pub mod index;
pub mod relationship;
pub mod snapshot;

pub use collection::{EntityCollection, IndexDef, Lookup, Matches};
pub use index::SortedIndex;
pub use relationship::{Edge, RelationshipCollection};
pub use snapshot::{Snapshot, SNAPSHOT_FORMAT_VERSION};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity token of an entity
///
/// Tokens are handed out monotonically and never reused. Loading a snapshot
/// moves the counter past every loaded token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Allocate a fresh token
    pub fn fresh() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Make sure future tokens never collide with `id`
    pub(crate) fn reserve(id: EntityId) {
        NEXT_ID.fetch_max(id.0 + 1, Ordering::Relaxed);
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A kind of entity that can live in an [`EntityCollection`]
pub trait Entity: Clone + fmt::Debug + Serialize + DeserializeOwned {
    /// Collection name, used in snapshots and error messages
    const COLLECTION: &'static str;

    /// Secondary indexes maintained for this entity kind
    fn indexes() -> Vec<IndexDef<Self>> {
        Vec::new()
    }
}

/// An entity together with its identity
///
/// Serialized as the entity's own fields plus `$id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<E> {
    #[serde(rename = "$id")]
    pub id: EntityId,
    #[serde(flatten)]
    pub entity: E,
}

impl<E> Deref for Record<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.entity
    }
}

impl<E> DerefMut for Record<E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.entity
    }
}
