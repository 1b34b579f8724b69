//! Entity Collections
//!
//! Insertion-ordered storage for one entity kind plus its secondary indexes.

use std::collections::HashMap;
use std::fmt;

use super::index::SortedIndex;
use super::{Entity, EntityId, Record};
use crate::error::StoreError;

/// Definition of a secondary index: a name and a key extractor
#[derive(Clone)]
pub struct IndexDef<E> {
    pub name: &'static str,
    pub key: fn(&E) -> String,
}

impl<E> IndexDef<E> {
    pub fn new(name: &'static str, key: fn(&E) -> String) -> Self {
        Self { name, key }
    }
}

impl<E> fmt::Debug for IndexDef<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexDef").field("name", &self.name).finish()
    }
}

/// Indexed search operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'k> {
    /// Key equals the operand
    Equals(&'k str),
    /// Key starts with the operand
    Prefix(&'k str),
}

impl fmt::Display for Lookup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Equals(key) => write!(f, "= '{}'", key),
            Lookup::Prefix(key) => write!(f, "starts with '{}'", key),
        }
    }
}

/// Result of an indexed lookup
#[derive(Debug)]
pub struct Matches<'a, E> {
    collection: &'static str,
    query: String,
    items: Vec<&'a Record<E>>,
}

impl<'a, E> Matches<'a, E> {
    /// The single match; anything else is an error
    pub fn only(self) -> Result<&'a Record<E>, StoreError> {
        match self.items.as_slice() {
            [one] => Ok(*one),
            _ => Err(self.not_unique()),
        }
    }

    /// At most one match
    pub fn only_or_none(self) -> Result<Option<&'a Record<E>>, StoreError> {
        match self.items.as_slice() {
            [] => Ok(None),
            [one] => Ok(Some(*one)),
            _ => Err(self.not_unique()),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Record<E>> + '_ {
        self.items.iter().copied()
    }

    pub fn into_vec(self) -> Vec<&'a Record<E>> {
        self.items
    }

    fn not_unique(&self) -> StoreError {
        StoreError::NotUnique {
            collection: self.collection,
            query: self.query.clone(),
            count: self.items.len(),
        }
    }
}

/// Insertion-ordered collection of one entity kind
#[derive(Debug, Clone)]
pub struct EntityCollection<E: Entity> {
    order: Vec<EntityId>,
    /// Insertion sequence of each entity, the secondary index key
    sequence: HashMap<EntityId, u64>,
    next_sequence: u64,
    records: HashMap<EntityId, Record<E>>,
    indexes: Vec<(IndexDef<E>, SortedIndex)>,
}

impl<E: Entity> Default for EntityCollection<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> EntityCollection<E> {
    /// Create an empty collection with the indexes declared by `E`
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            sequence: HashMap::new(),
            next_sequence: 0,
            records: HashMap::new(),
            indexes: E::indexes()
                .into_iter()
                .map(|def| (def, SortedIndex::new()))
                .collect(),
        }
    }

    /// Rebuild a collection (and its indexes) from persisted records
    pub fn from_records(records: Vec<Record<E>>) -> Result<Self, StoreError> {
        let mut collection = Self::new();
        for record in records {
            collection.insert_record(record)?;
        }
        Ok(collection)
    }

    /// Create a new entity with a fresh identity
    pub fn allocate(&mut self, entity: E) -> &Record<E> {
        let id = EntityId::fresh();
        self.push_order(id);
        self.index(id, &entity);
        self.records.entry(id).or_insert(Record { id, entity })
    }

    /// Insert a record that already carries its identity
    pub fn insert_record(&mut self, record: Record<E>) -> Result<(), StoreError> {
        if self.records.contains_key(&record.id) {
            return Err(StoreError::DuplicateId {
                collection: E::COLLECTION,
                id: record.id,
            });
        }
        EntityId::reserve(record.id);
        self.push_order(record.id);
        self.index(record.id, &record.entity);
        self.records.insert(record.id, record);
        Ok(())
    }

    /// Dereference an identity token
    pub fn get(&self, id: EntityId) -> Result<&Record<E>, StoreError> {
        self.records.get(&id).ok_or(StoreError::NotFound {
            collection: E::COLLECTION,
            id,
        })
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.records.contains_key(&id)
    }

    /// Mutate an entity in place. Identity is unchanged; indexes are refreshed.
    pub fn update<F>(&mut self, id: EntityId, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut E),
    {
        let record = self.records.get_mut(&id).ok_or(StoreError::NotFound {
            collection: E::COLLECTION,
            id,
        })?;

        let sequence = self.sequence.get(&id).copied().unwrap_or_default();

        let before: Vec<String> = self.indexes.iter().map(|(def, _)| (def.key)(&record.entity)).collect();
        f(&mut record.entity);
        for ((def, index), old_key) in self.indexes.iter_mut().zip(before) {
            let new_key = (def.key)(&record.entity);
            if new_key != old_key {
                index.remove(&old_key, id);
                index.insert(new_key, sequence, id);
            }
        }
        Ok(())
    }

    /// Delete an entity together with its index entries
    pub fn remove(&mut self, id: EntityId) -> Result<Record<E>, StoreError> {
        let record = self.records.remove(&id).ok_or(StoreError::NotFound {
            collection: E::COLLECTION,
            id,
        })?;
        for (def, index) in &mut self.indexes {
            index.remove(&(def.key)(&record.entity), id);
        }
        self.order.retain(|existing| *existing != id);
        self.sequence.remove(&id);
        Ok(record)
    }

    /// Indexed search. Asking for an index the collection does not have is a
    /// programming error and fails immediately.
    pub fn lookup(&self, index: &str, query: Lookup<'_>) -> Result<Matches<'_, E>, StoreError> {
        let (_, sorted) = self
            .indexes
            .iter()
            .find(|(def, _)| def.name == index)
            .ok_or_else(|| StoreError::NoSuchIndex {
                collection: E::COLLECTION,
                index: index.to_string(),
            })?;

        let ids: Vec<EntityId> = match query {
            Lookup::Equals(key) => sorted.equal(key).collect(),
            Lookup::Prefix(prefix) => sorted.prefix(prefix).collect(),
        };

        let items = ids
            .into_iter()
            .map(|id| self.get(id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Matches {
            collection: E::COLLECTION,
            query: format!("{} {}", index, query),
            items,
        })
    }

    /// All entities in insertion order
    pub fn all(&self) -> impl Iterator<Item = &Record<E>> + '_ {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn push_order(&mut self, id: EntityId) {
        self.sequence.insert(id, self.next_sequence);
        self.next_sequence += 1;
        self.order.push(id);
    }

    fn index(&mut self, id: EntityId, entity: &E) {
        let sequence = self.sequence.get(&id).copied().unwrap_or_default();
        for (def, index) in &mut self.indexes {
            index.insert((def.key)(entity), sequence, id);
        }
    }
}
