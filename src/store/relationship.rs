//! Relationship Collections
//!
//! A named set of directed edges between two entity collections. Forward
//! and backward adjacency are maintained together so that both directions
//! are cheap to traverse.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::marker::PhantomData;

use super::collection::EntityCollection;
use super::{Entity, EntityId, Record};
use crate::error::StoreError;

/// One adjacency entry: the entity at the other end plus edge attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge<A> {
    #[serde(rename = "$id")]
    pub id: EntityId,
    pub attrs: A,
}

/// Directed edge set from entities of kind `F` to entities of kind `T`
///
/// Adding an edge that already exists with equal attributes is a no-op.
/// Backward adjacency lists keep sources in identity order, which is what
/// rebuilding them from the forward adjacency produces.
#[derive(Debug, Clone)]
pub struct RelationshipCollection<F, T, A = ()> {
    name: &'static str,
    forward: BTreeMap<EntityId, Vec<Edge<A>>>,
    backward: BTreeMap<EntityId, Vec<Edge<A>>>,
    edge_count: usize,
    _endpoints: PhantomData<fn() -> (F, T)>,
}

impl<F, T, A> RelationshipCollection<F, T, A>
where
    F: Entity,
    T: Entity,
    A: Clone + PartialEq,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            forward: BTreeMap::new(),
            backward: BTreeMap::new(),
            edge_count: 0,
            _endpoints: PhantomData,
        }
    }

    /// Rebuild from a persisted forward adjacency
    pub fn from_forward(name: &'static str, forward: BTreeMap<EntityId, Vec<Edge<A>>>) -> Self {
        let mut relationship = Self::new(name);
        for (from, edges) in forward {
            for edge in edges {
                relationship.add(from, edge.id, edge.attrs);
            }
        }
        relationship
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Record the edge `from -> to`. Returns false if it was already present.
    pub fn add(&mut self, from: EntityId, to: EntityId, attrs: A) -> bool {
        let outgoing = self.forward.entry(from).or_default();
        if outgoing.iter().any(|e| e.id == to && e.attrs == attrs) {
            return false;
        }
        outgoing.push(Edge {
            id: to,
            attrs: attrs.clone(),
        });

        let incoming = self.backward.entry(to).or_default();
        let at = incoming.partition_point(|e| e.id <= from);
        incoming.insert(at, Edge { id: from, attrs });

        self.edge_count += 1;
        true
    }

    /// Remove every edge leaving `from`, returned in insertion order
    pub fn remove_outgoing(&mut self, from: EntityId) -> Vec<Edge<A>> {
        let edges = self.forward.remove(&from).unwrap_or_default();
        for edge in &edges {
            if let Some(incoming) = self.backward.get_mut(&edge.id) {
                if let Some(at) = incoming.iter().position(|e| e.id == from && e.attrs == edge.attrs) {
                    incoming.remove(at);
                }
                if incoming.is_empty() {
                    self.backward.remove(&edge.id);
                }
            }
        }
        self.edge_count -= edges.len();
        edges
    }

    /// Raw outgoing adjacency of `from`
    pub fn outgoing(&self, from: EntityId) -> &[Edge<A>] {
        self.forward.get(&from).map(Vec::as_slice).unwrap_or_default()
    }

    /// Raw incoming adjacency of `to`
    pub fn incoming_edges(&self, to: EntityId) -> &[Edge<A>] {
        self.backward.get(&to).map(Vec::as_slice).unwrap_or_default()
    }

    /// Traverse forward, dereferencing targets through `targets`
    pub fn follow<'a>(
        &'a self,
        from: EntityId,
        targets: &'a EntityCollection<T>,
    ) -> Result<Vec<(&'a Record<T>, &'a A)>, StoreError> {
        self.outgoing(from)
            .iter()
            .map(|edge| Ok((targets.get(edge.id)?, &edge.attrs)))
            .collect()
    }

    /// Traverse backward, dereferencing sources through `sources`
    pub fn incoming<'a>(
        &'a self,
        to: EntityId,
        sources: &'a EntityCollection<F>,
    ) -> Result<Vec<(&'a Record<F>, &'a A)>, StoreError> {
        self.incoming_edges(to)
            .iter()
            .map(|edge| Ok((sources.get(edge.id)?, &edge.attrs)))
            .collect()
    }

    /// Forward adjacency, the only part that is persisted
    pub fn forward(&self) -> &BTreeMap<EntityId, Vec<Edge<A>>> {
        &self.forward
    }

    /// Number of distinct edges
    pub fn len(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.edge_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Node {
        label: String,
    }

    impl Entity for Node {
        const COLLECTION: &'static str = "node";
    }

    fn nodes(labels: &[&str]) -> (EntityCollection<Node>, Vec<EntityId>) {
        let mut collection = EntityCollection::new();
        let ids = labels
            .iter()
            .map(|l| collection.allocate(Node { label: l.to_string() }).id)
            .collect();
        (collection, ids)
    }

    #[test]
    fn test_edges_are_a_set() {
        let (collection, ids) = nodes(&["a", "b"]);
        let mut rel: RelationshipCollection<Node, Node, String> = RelationshipCollection::new("points_to");

        assert!(rel.add(ids[0], ids[1], "x".into()));
        assert!(!rel.add(ids[0], ids[1], "x".into()));
        assert!(rel.add(ids[0], ids[1], "y".into()));

        let followed = rel.follow(ids[0], &collection).unwrap();
        assert_eq!(followed.len(), 2);
        assert_eq!(rel.len(), 2);
    }

    #[test]
    fn test_backward_is_consistent() {
        let (collection, ids) = nodes(&["a", "b", "c"]);
        let mut rel: RelationshipCollection<Node, Node> = RelationshipCollection::new("points_to");

        rel.add(ids[1], ids[2], ());
        rel.add(ids[0], ids[2], ());

        let sources: Vec<&str> = rel
            .incoming(ids[2], &collection)
            .unwrap()
            .into_iter()
            .map(|(n, _)| n.label.as_str())
            .collect();
        assert_eq!(sources, vec!["a", "b"]);
        assert!(rel.incoming_edges(ids[0]).is_empty());
    }

    #[test]
    fn test_rebuild_from_forward() {
        let (_, ids) = nodes(&["a", "b", "c"]);
        let mut rel: RelationshipCollection<Node, Node> = RelationshipCollection::new("points_to");
        rel.add(ids[2], ids[0], ());
        rel.add(ids[1], ids[0], ());
        rel.add(ids[1], ids[2], ());

        let rebuilt: RelationshipCollection<Node, Node> =
            RelationshipCollection::from_forward("points_to", rel.forward().clone());

        assert_eq!(rebuilt.incoming_edges(ids[0]), rel.incoming_edges(ids[0]));
        assert_eq!(rebuilt.outgoing(ids[1]), rel.outgoing(ids[1]));
        assert_eq!(rebuilt.len(), 3);
    }

    #[test]
    fn test_remove_outgoing() {
        let (collection, ids) = nodes(&["a", "b", "c"]);
        let mut rel: RelationshipCollection<Node, Node, String> = RelationshipCollection::new("points_to");
        rel.add(ids[0], ids[2], "x".into());
        rel.add(ids[0], ids[1], "y".into());
        rel.add(ids[1], ids[2], "z".into());

        let removed: Vec<EntityId> = rel.remove_outgoing(ids[0]).into_iter().map(|e| e.id).collect();
        assert_eq!(removed, vec![ids[2], ids[1]]);
        assert_eq!(rel.len(), 1);
        assert!(rel.outgoing(ids[0]).is_empty());
        assert!(rel.incoming_edges(ids[1]).is_empty());

        let sources: Vec<&str> = rel
            .incoming(ids[2], &collection)
            .unwrap()
            .into_iter()
            .map(|(n, _)| n.label.as_str())
            .collect();
        assert_eq!(sources, vec!["b"]);
        assert!(rel.remove_outgoing(ids[0]).is_empty());
    }

    #[test]
    fn test_follow_dangling_reference() {
        let (collection, ids) = nodes(&["a"]);
        let mut rel: RelationshipCollection<Node, Node> = RelationshipCollection::new("points_to");
        rel.add(ids[0], EntityId::fresh(), ());
        assert!(rel.follow(ids[0], &collection).is_err());
    }
}
