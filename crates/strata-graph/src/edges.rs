//! Tracked edge container.
//!
//! [`EdgeContainer`] is the single mutation point for one set of edges: the
//! edge records themselves, the per-node adjacency derived from them, and the
//! new/removed change markers consumers drain for incremental
//! synchronisation. All three views move together — there is no way to touch
//! one side alone.
//!
//! Both layer kinds store their intra-layer edges in one of these, and the
//! graph root keeps two more for the static and dynamic interlayer edge sets.

use std::collections::{BTreeSet, HashMap};

use strata_types::ChangeStatus;
use strata_types::attributes::EdgeAttributes;
use strata_types::ids::NodeId;

use crate::node::{EdgeKey, SceneGraphEdge};

// ─────────────────────────────────────────────────────────────────────────────
// EdgeContainer
// ─────────────────────────────────────────────────────────────────────────────

/// A set of edges keyed by unordered endpoint pair, with adjacency and
/// change tracking kept in lockstep.
#[derive(Debug, Default)]
pub struct EdgeContainer {
    edges: HashMap<EdgeKey, SceneGraphEdge>,
    /// Change markers; `Removed` entries outlive their edge as tombstones
    /// until a consumer drains them.
    status: HashMap<EdgeKey, ChangeStatus>,
    adjacency: HashMap<NodeId, BTreeSet<NodeId>>,
}

impl EdgeContainer {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an edge between `source` and `target`.
    ///
    /// Fails (returns `false`, no mutation) on self-loops and when an edge
    /// already exists between the pair in either orientation.
    pub fn insert(
        &mut self,
        source: NodeId,
        target: NodeId,
        attributes: Box<dyn EdgeAttributes>,
    ) -> bool {
        if source == target {
            return false;
        }

        let key = EdgeKey::new(source, target);
        if self.edges.contains_key(&key) {
            return false;
        }

        self.edges
            .insert(key, SceneGraphEdge::new(source, target, attributes));
        self.status.insert(key, ChangeStatus::New);
        self.adjacency.entry(source).or_default().insert(target);
        self.adjacency.entry(target).or_default().insert(source);
        true
    }

    /// Remove the edge between `source` and `target`, returning it.
    ///
    /// Stamps a `Removed` tombstone and prunes now-empty adjacency entries.
    pub fn remove(&mut self, source: NodeId, target: NodeId) -> Option<SceneGraphEdge> {
        let key = EdgeKey::new(source, target);
        let edge = self.edges.remove(&key)?;

        self.status.insert(key, ChangeStatus::Removed);

        for (a, b) in [(source, target), (target, source)] {
            if let Some(neighbors) = self.adjacency.get_mut(&a) {
                neighbors.remove(&b);
                if neighbors.is_empty() {
                    self.adjacency.remove(&a);
                }
            }
        }

        Some(edge)
    }

    /// True when an edge exists between the pair.
    pub fn contains(&self, source: NodeId, target: NodeId) -> bool {
        self.edges.contains_key(&EdgeKey::new(source, target))
    }

    /// The edge between the pair, if present.
    pub fn get(&self, source: NodeId, target: NodeId) -> Option<&SceneGraphEdge> {
        self.edges.get(&EdgeKey::new(source, target))
    }

    /// Mutable access to the edge between the pair, if present.
    pub fn get_mut(&mut self, source: NodeId, target: NodeId) -> Option<&mut SceneGraphEdge> {
        self.edges.get_mut(&EdgeKey::new(source, target))
    }

    /// Number of stored edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// True when no edges are stored.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// All nodes currently connected to `node`, in ascending id order.
    pub fn neighbors(&self, node: NodeId) -> Vec<NodeId> {
        self.adjacency
            .get(&node)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Iterate over all stored edges.
    pub fn edges(&self) -> impl Iterator<Item = &SceneGraphEdge> {
        self.edges.values()
    }

    /// Keys of edges added since the last clearing drain.
    ///
    /// With `clear` set, the drained markers flip to unchanged.
    pub fn drain_new(&mut self, clear: bool) -> Vec<EdgeKey> {
        let keys: Vec<EdgeKey> = self
            .status
            .iter()
            .filter(|(_, status)| **status == ChangeStatus::New)
            .map(|(key, _)| *key)
            .collect();

        if clear {
            for key in &keys {
                self.status.insert(*key, ChangeStatus::Unchanged);
            }
        }

        keys
    }

    /// Keys of edges removed since the last clearing drain.
    ///
    /// With `clear` set, the tombstones are dropped.
    pub fn drain_removed(&mut self, clear: bool) -> Vec<EdgeKey> {
        let keys: Vec<EdgeKey> = self
            .status
            .iter()
            .filter(|(_, status)| **status == ChangeStatus::Removed)
            .map(|(key, _)| *key)
            .collect();

        if clear {
            for key in &keys {
                self.status.remove(key);
            }
        }

        keys
    }

    /// Drop all edges, adjacency, and markers (tombstones included).
    pub fn reset(&mut self) {
        self.edges.clear();
        self.status.clear();
        self.adjacency.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::attributes::BasicEdgeAttributes;

    fn attrs() -> Box<dyn EdgeAttributes> {
        Box::new(BasicEdgeAttributes::default())
    }

    // ── insert / remove ─────────────────────────────────────────────────────

    #[test]
    fn insert_and_lookup_either_orientation() {
        let mut container = EdgeContainer::new();
        assert!(container.insert(1, 2, attrs()));
        assert!(container.contains(1, 2));
        assert!(container.contains(2, 1));
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn duplicate_insert_fails() {
        let mut container = EdgeContainer::new();
        assert!(container.insert(1, 2, attrs()));
        assert!(!container.insert(2, 1, attrs()));
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn self_loop_rejected() {
        let mut container = EdgeContainer::new();
        assert!(!container.insert(4, 4, attrs()));
        assert!(container.is_empty());
    }

    #[test]
    fn remove_returns_edge_and_prunes_adjacency() {
        let mut container = EdgeContainer::new();
        container.insert(1, 2, attrs());

        let edge = container.remove(2, 1).expect("edge present");
        assert_eq!(EdgeKey::new(edge.source, edge.target), EdgeKey::new(1, 2));
        assert!(!container.contains(1, 2));
        assert!(container.neighbors(1).is_empty());
        assert!(container.neighbors(2).is_empty());
    }

    #[test]
    fn remove_missing_edge_is_none() {
        let mut container = EdgeContainer::new();
        assert!(container.remove(1, 2).is_none());
    }

    // ── adjacency ───────────────────────────────────────────────────────────

    #[test]
    fn neighbors_are_sorted_and_symmetric() {
        let mut container = EdgeContainer::new();
        container.insert(5, 2, attrs());
        container.insert(5, 9, attrs());

        assert_eq!(container.neighbors(5), vec![2, 9]);
        assert_eq!(container.neighbors(2), vec![5]);
        assert_eq!(container.neighbors(9), vec![5]);
    }

    // ── change tracking ─────────────────────────────────────────────────────

    #[test]
    fn new_markers_drain_and_clear() {
        let mut container = EdgeContainer::new();
        container.insert(1, 2, attrs());

        assert_eq!(container.drain_new(false), vec![EdgeKey::new(1, 2)]);
        // Non-clearing drain leaves the marker in place.
        assert_eq!(container.drain_new(true), vec![EdgeKey::new(1, 2)]);
        assert!(container.drain_new(true).is_empty());
    }

    #[test]
    fn removed_tombstone_survives_physical_erasure() {
        let mut container = EdgeContainer::new();
        container.insert(1, 2, attrs());
        container.drain_new(true);
        container.remove(1, 2);

        assert!(container.is_empty());
        assert_eq!(container.drain_removed(true), vec![EdgeKey::new(1, 2)]);
        assert!(container.drain_removed(true).is_empty());
    }

    #[test]
    fn reinsert_after_removal_reads_as_new() {
        let mut container = EdgeContainer::new();
        container.insert(1, 2, attrs());
        container.remove(1, 2);
        container.insert(1, 2, attrs());

        assert_eq!(container.drain_new(true), vec![EdgeKey::new(1, 2)]);
        assert!(container.drain_removed(true).is_empty());
    }

    #[test]
    fn reset_drops_tombstones() {
        let mut container = EdgeContainer::new();
        container.insert(1, 2, attrs());
        container.remove(1, 2);
        container.reset();

        assert!(container.drain_removed(true).is_empty());
        assert!(container.drain_new(true).is_empty());
    }
}
