//! Flat sorted secondary index
//!
//! A single `(key, sequence, id)` array kept sorted by key, then by the
//! entity's insertion sequence, and searched with binary search. Duplicate
//! keys occupy one contiguous range ordered by insertion, however often the
//! entries were re-keyed.

use super::EntityId;

/// Sorted multimap from key to entity ids
#[derive(Debug, Clone, Default)]
pub struct SortedIndex {
    entries: Vec<(String, u64, EntityId)>,
}

impl SortedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert among the entries with an equal key at the position given by
    /// `sequence`, the entity's insertion sequence in its collection
    pub fn insert(&mut self, key: String, sequence: u64, id: EntityId) {
        let at = self
            .entries
            .partition_point(|(k, s, _)| (k.as_str(), *s) < (key.as_str(), sequence));
        self.entries.insert(at, (key, sequence, id));
    }

    /// Remove the entry for `(key, id)`; returns whether it was present
    pub fn remove(&mut self, key: &str, id: EntityId) -> bool {
        let start = self.lower_bound(key);
        let found = self.entries[start..]
            .iter()
            .take_while(|(k, _, _)| k == key)
            .position(|(_, _, existing)| *existing == id);

        match found {
            Some(offset) => {
                self.entries.remove(start + offset);
                true
            }
            None => false,
        }
    }

    /// Ids whose key equals `key`, in insertion order
    pub fn equal<'a>(&'a self, key: &'a str) -> impl Iterator<Item = EntityId> + 'a {
        let start = self.lower_bound(key);
        self.entries[start..]
            .iter()
            .take_while(move |(k, _, _)| k == key)
            .map(|(_, _, id)| *id)
    }

    /// Ids whose key starts with `prefix`, ordered by key then insertion
    pub fn prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = EntityId> + 'a {
        let start = self.lower_bound(prefix);
        self.entries[start..]
            .iter()
            .take_while(move |(k, _, _)| k.starts_with(prefix))
            .map(|(_, _, id)| *id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lower_bound(&self, key: &str) -> usize {
        self.entries.partition_point(|(k, _, _)| k.as_str() < key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_keys_keep_insertion_order() {
        let mut index = SortedIndex::new();
        let ids: Vec<EntityId> = (0..4).map(|_| EntityId::fresh()).collect();

        index.insert("b".into(), 0, ids[0]);
        index.insert("a".into(), 1, ids[1]);
        index.insert("b".into(), 2, ids[2]);
        index.insert("c".into(), 3, ids[3]);

        assert_eq!(index.equal("b").collect::<Vec<_>>(), vec![ids[0], ids[2]]);
        assert_eq!(index.equal("a").collect::<Vec<_>>(), vec![ids[1]]);
        assert_eq!(index.equal("zzz").count(), 0);
    }

    #[test]
    fn test_remove_only_matching_id() {
        let mut index = SortedIndex::new();
        let a = EntityId::fresh();
        let b = EntityId::fresh();
        index.insert("k".into(), 0, a);
        index.insert("k".into(), 1, b);

        assert!(index.remove("k", a));
        assert!(!index.remove("k", a));
        assert_eq!(index.equal("k").collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn test_late_insert_lands_by_sequence() {
        let mut index = SortedIndex::new();
        let ids: Vec<EntityId> = (0..3).map(|_| EntityId::fresh()).collect();
        index.insert("k".into(), 1, ids[1]);
        index.insert("k".into(), 2, ids[2]);
        index.insert("k".into(), 0, ids[0]);

        assert_eq!(index.equal("k").collect::<Vec<_>>(), ids);
    }

    #[test]
    fn test_prefix_range() {
        let mut index = SortedIndex::new();
        let ids: Vec<EntityId> = (0..3).map(|_| EntityId::fresh()).collect();
        index.insert("AWS::S3::Bucket".into(), 0, ids[0]);
        index.insert("AWS::EC2::Instance".into(), 1, ids[1]);
        index.insert("AWS::S3::AccessPoint".into(), 2, ids[2]);

        let s3: Vec<_> = index.prefix("AWS::S3::").collect();
        assert_eq!(s3, vec![ids[2], ids[0]]);
    }
}
