//! Static layers and the layer capability.
//!
//! A [`SceneGraphLayer`] owns the nodes and intra-layer edges of one
//! abstraction level. The graph root never stores node data itself: it
//! resolves a node's owning layer through the global index and delegates
//! here, via the [`GraphLayer`] capability that both static and dynamic
//! layers expose.

use std::collections::HashMap;

use strata_types::ChangeStatus;
use strata_types::attributes::{EdgeAttributes, NodeAttributes, Point3};
use strata_types::ids::{LayerId, LayerKey, NodeId};

use crate::edges::EdgeContainer;
use crate::node::{EdgeKey, SceneGraphEdge, SceneGraphNode};

// ─────────────────────────────────────────────────────────────────────────────
// GraphLayer capability
// ─────────────────────────────────────────────────────────────────────────────

/// The layer surface the graph root operates through.
///
/// Covers everything the root needs polymorphically: node and edge lookups,
/// removal, change drains, and reset. Node creation is deliberately absent —
/// it differs between static layers (caller-chosen ids) and dynamic layers
/// (sequence-minted ids) and is dispatched concretely.
pub trait GraphLayer {
    /// The abstraction level this layer stores.
    fn layer_id(&self) -> LayerId;

    /// Number of live nodes.
    fn num_nodes(&self) -> usize;

    /// Number of intra-layer edges.
    fn num_edges(&self) -> usize;

    /// The node with `id`, if this layer owns it.
    fn get_node(&self, id: NodeId) -> Option<&SceneGraphNode>;

    /// Mutable access to the node with `id`.
    fn get_node_mut(&mut self, id: NodeId) -> Option<&mut SceneGraphNode>;

    /// Remove a node and every intra-layer edge touching it.
    fn remove_node(&mut self, id: NodeId) -> bool;

    /// Insert an intra-layer edge; both endpoints must be live here.
    fn insert_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        attributes: Box<dyn EdgeAttributes>,
    ) -> bool;

    /// The intra-layer edge between the pair, if present.
    fn get_edge(&self, source: NodeId, target: NodeId) -> Option<&SceneGraphEdge>;

    /// Remove the intra-layer edge between the pair.
    fn remove_edge(&mut self, source: NodeId, target: NodeId) -> bool;

    /// Ids of nodes added since the last clearing drain.
    fn drain_new_nodes(&mut self, clear: bool) -> Vec<NodeId>;

    /// Ids of nodes removed since the last clearing drain.
    fn drain_removed_nodes(&mut self, clear: bool) -> Vec<NodeId>;

    /// Keys of intra-layer edges added since the last clearing drain.
    fn drain_new_edges(&mut self, clear: bool) -> Vec<EdgeKey>;

    /// Keys of intra-layer edges removed since the last clearing drain.
    fn drain_removed_edges(&mut self, clear: bool) -> Vec<EdgeKey>;

    /// Drop all contents, including change tombstones.
    fn reset(&mut self);

    /// True when this layer owns a live node with `id`.
    fn has_node(&self, id: NodeId) -> bool {
        self.get_node(id).is_some()
    }

    /// True when an intra-layer edge exists between the pair.
    fn has_edge(&self, source: NodeId, target: NodeId) -> bool {
        self.get_edge(source, target).is_some()
    }

    /// Position of the node with `id`, read from its attributes.
    fn get_position(&self, id: NodeId) -> Option<Point3> {
        self.get_node(id).map(|node| node.attributes.position())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SceneGraphLayer
// ─────────────────────────────────────────────────────────────────────────────

/// One static abstraction level: an arena of nodes keyed by id plus the
/// intra-layer edges between them.
#[derive(Debug)]
pub struct SceneGraphLayer {
    /// The abstraction level this layer stores.
    pub id: LayerId,
    pub(crate) nodes: HashMap<NodeId, SceneGraphNode>,
    pub(crate) node_status: HashMap<NodeId, ChangeStatus>,
    pub(crate) edges: EdgeContainer,
}

impl SceneGraphLayer {
    /// Create an empty layer for `id`.
    pub fn new(id: LayerId) -> Self {
        Self {
            id,
            nodes: HashMap::new(),
            node_status: HashMap::new(),
            edges: EdgeContainer::new(),
        }
    }

    /// Create a node from its attribute payload.
    ///
    /// Fails (returns `false`, no mutation) when the id is already present in
    /// this layer. Global uniqueness is the graph root's responsibility.
    pub fn emplace_node(&mut self, id: NodeId, attributes: Box<dyn NodeAttributes>) -> bool {
        if self.nodes.contains_key(&id) {
            return false;
        }

        self.nodes
            .insert(id, SceneGraphNode::new(id, self.id, attributes));
        self.node_status.insert(id, ChangeStatus::New);
        true
    }

    /// Insert a pre-built node (used by merge paths).
    ///
    /// Fails on a duplicate id or when the node was built for another layer.
    pub fn insert_node(&mut self, node: SceneGraphNode) -> bool {
        if node.layer != self.id || self.nodes.contains_key(&node.id) {
            return false;
        }

        let id = node.id;
        self.nodes.insert(id, node);
        self.node_status.insert(id, ChangeStatus::New);
        true
    }

    /// Iterate over all live nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &SceneGraphNode> {
        self.nodes.values()
    }

    /// Ids currently marked removed, without clearing the markers.
    pub fn removed_nodes(&self) -> Vec<NodeId> {
        status_ids(&self.node_status, ChangeStatus::Removed)
    }

    /// Ids currently marked new, without clearing the markers.
    pub fn new_nodes(&self) -> Vec<NodeId> {
        status_ids(&self.node_status, ChangeStatus::New)
    }

    /// Merge another layer's contents into this one.
    ///
    /// Nodes present in both layers have their attributes overwritten when
    /// `update_attributes` is set; unknown nodes are cloned in (relations
    /// empty — interlayer linkage is rebuilt by the caller re-inserting
    /// interlayer edges), stamped new, and registered in `node_index`.
    /// Missing intra-layer edges are cloned in; existing edges keep their
    /// payload.
    pub(crate) fn merge_layer(
        &mut self,
        other: &SceneGraphLayer,
        node_index: &mut HashMap<NodeId, LayerKey>,
        update_attributes: bool,
    ) {
        for (id, other_node) in &other.nodes {
            match self.nodes.get_mut(id) {
                Some(node) => {
                    if update_attributes {
                        node.attributes = other_node.attributes.clone();
                    }
                }
                None => {
                    self.nodes.insert(
                        *id,
                        SceneGraphNode::new(*id, self.id, other_node.attributes.clone()),
                    );
                    self.node_status.insert(*id, ChangeStatus::New);
                    node_index.insert(*id, LayerKey::static_layer(self.id));
                }
            }
        }

        for edge in other.edges.edges() {
            if !self.edges.contains(edge.source, edge.target) {
                self.edges
                    .insert(edge.source, edge.target, edge.attributes.clone());
            }
        }
    }

    /// Fold `from` into `to` within this layer.
    ///
    /// Intra-layer edges of `from` are rewired to originate from `to`
    /// (would-be duplicates and self-loops are dropped); `from` is then
    /// erased with a removed stamp. `to` keeps its own attributes.
    pub(crate) fn merge_nodes(&mut self, from: NodeId, to: NodeId) -> bool {
        if from == to || !self.nodes.contains_key(&from) || !self.nodes.contains_key(&to) {
            return false;
        }

        for neighbor in self.edges.neighbors(from) {
            let Some(edge) = self.edges.remove(from, neighbor) else {
                continue;
            };
            if neighbor != to && !self.edges.contains(to, neighbor) {
                self.edges.insert(to, neighbor, edge.attributes);
            }
        }

        self.nodes.remove(&from);
        self.node_status.insert(from, ChangeStatus::Removed);
        true
    }
}

impl GraphLayer for SceneGraphLayer {
    fn layer_id(&self) -> LayerId {
        self.id
    }

    fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn num_edges(&self) -> usize {
        self.edges.len()
    }

    fn get_node(&self, id: NodeId) -> Option<&SceneGraphNode> {
        self.nodes.get(&id)
    }

    fn get_node_mut(&mut self, id: NodeId) -> Option<&mut SceneGraphNode> {
        self.nodes.get_mut(&id)
    }

    fn remove_node(&mut self, id: NodeId) -> bool {
        if !self.nodes.contains_key(&id) {
            return false;
        }

        for neighbor in self.edges.neighbors(id) {
            self.edges.remove(id, neighbor);
        }

        self.nodes.remove(&id);
        self.node_status.insert(id, ChangeStatus::Removed);
        true
    }

    fn insert_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        attributes: Box<dyn EdgeAttributes>,
    ) -> bool {
        if !self.nodes.contains_key(&source) || !self.nodes.contains_key(&target) {
            return false;
        }

        self.edges.insert(source, target, attributes)
    }

    fn get_edge(&self, source: NodeId, target: NodeId) -> Option<&SceneGraphEdge> {
        self.edges.get(source, target)
    }

    fn remove_edge(&mut self, source: NodeId, target: NodeId) -> bool {
        self.edges.remove(source, target).is_some()
    }

    fn drain_new_nodes(&mut self, clear: bool) -> Vec<NodeId> {
        drain_status(&mut self.node_status, ChangeStatus::New, clear)
    }

    fn drain_removed_nodes(&mut self, clear: bool) -> Vec<NodeId> {
        drain_status(&mut self.node_status, ChangeStatus::Removed, clear)
    }

    fn drain_new_edges(&mut self, clear: bool) -> Vec<EdgeKey> {
        self.edges.drain_new(clear)
    }

    fn drain_removed_edges(&mut self, clear: bool) -> Vec<EdgeKey> {
        self.edges.drain_removed(clear)
    }

    fn reset(&mut self) {
        self.nodes.clear();
        self.node_status.clear();
        self.edges.reset();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status helpers (shared with the dynamic layer)
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn status_ids(
    status: &HashMap<NodeId, ChangeStatus>,
    wanted: ChangeStatus,
) -> Vec<NodeId> {
    status
        .iter()
        .filter(|(_, s)| **s == wanted)
        .map(|(id, _)| *id)
        .collect()
}

pub(crate) fn drain_status(
    status: &mut HashMap<NodeId, ChangeStatus>,
    wanted: ChangeStatus,
    clear: bool,
) -> Vec<NodeId> {
    let ids = status_ids(status, wanted);

    if clear {
        for id in &ids {
            match wanted {
                // Drained additions become part of the baseline.
                ChangeStatus::New => {
                    status.insert(*id, ChangeStatus::Unchanged);
                }
                // Drained removals drop their tombstone.
                _ => {
                    status.remove(id);
                }
            }
        }
    }

    ids
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
