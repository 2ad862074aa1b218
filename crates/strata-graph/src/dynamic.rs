//! Dynamic (time-indexed, per-agent) layers.
//!
//! A [`DynamicLayer`] is one instance of an abstraction level keyed by a
//! [`LayerPrefix`] — typically one per tracked agent. Node ids are minted
//! from a monotonically increasing sequence counter through the prefix, so
//! storage is a slot vector indexed by the sequence index; removal leaves a
//! tombstoned slot and ids are never reused.
//!
//! New nodes can be chained to their predecessor with an intra-layer edge,
//! producing the agent's trajectory inside its own layer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use strata_types::ChangeStatus;
use strata_types::attributes::{BasicEdgeAttributes, EdgeAttributes, NodeAttributes};
use strata_types::ids::{LayerId, LayerKey, LayerPrefix, NodeId, NodeSymbol};

use crate::edges::EdgeContainer;
use crate::layer::{GraphLayer, drain_status, status_ids};
use crate::node::{EdgeKey, SceneGraphEdge, SceneGraphNode};

// ─────────────────────────────────────────────────────────────────────────────
// DynamicLayer
// ─────────────────────────────────────────────────────────────────────────────

/// One time-indexed dynamic-layer instance.
#[derive(Debug)]
pub struct DynamicLayer {
    /// The abstraction level this instance lives on.
    pub id: LayerId,
    /// The tag distinguishing this instance from its peers on the same level.
    pub prefix: LayerPrefix,
    /// Slot per minted sequence index; `None` marks a removed node.
    pub(crate) nodes: Vec<Option<SceneGraphNode>>,
    pub(crate) node_status: HashMap<NodeId, ChangeStatus>,
    pub(crate) edges: EdgeContainer,
    /// Next sequence index to mint; never decremented.
    pub(crate) next_node: u64,
}

impl DynamicLayer {
    /// Create an empty instance for `(id, prefix)`.
    pub fn new(id: LayerId, prefix: LayerPrefix) -> Self {
        Self {
            id,
            prefix,
            nodes: Vec::new(),
            node_status: HashMap::new(),
            edges: EdgeContainer::new(),
            next_node: 0,
        }
    }

    /// Create the next node in sequence, stamped with its observation time.
    ///
    /// With `link_previous` set, an intra-layer edge is added between the new
    /// node and the most recent live predecessor, extending the trajectory
    /// chain. Returns the minted id.
    pub fn emplace_node(
        &mut self,
        timestamp: DateTime<Utc>,
        attributes: Box<dyn NodeAttributes>,
        link_previous: bool,
    ) -> NodeId {
        let index = self.next_node;
        let id = self.prefix.make_id(index);

        self.nodes.push(Some(SceneGraphNode::new_dynamic(
            id, self.id, timestamp, attributes,
        )));
        self.node_status.insert(id, ChangeStatus::New);
        self.next_node += 1;

        if link_previous {
            if let Some(previous) = self.latest_before(index) {
                self.edges
                    .insert(previous, id, Box::new(BasicEdgeAttributes::default()));
            }
        }

        id
    }

    /// The id the next emplaced node will receive.
    pub fn next_id(&self) -> NodeId {
        self.prefix.make_id(self.next_node)
    }

    /// Iterate over all live nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &SceneGraphNode> {
        self.nodes.iter().filter_map(|slot| slot.as_ref())
    }

    /// Ids currently marked removed, without clearing the markers.
    pub fn removed_nodes(&self) -> Vec<NodeId> {
        status_ids(&self.node_status, ChangeStatus::Removed)
    }

    /// Ids currently marked new, without clearing the markers.
    pub fn new_nodes(&self) -> Vec<NodeId> {
        status_ids(&self.node_status, ChangeStatus::New)
    }

    /// Merge another instance of the same `(layer, prefix)` into this one.
    ///
    /// Slots below the local sequence counter are attribute-updates (gated by
    /// `update_attributes`); slots at or beyond it are cloned in with their
    /// timestamps, stamped new, and registered in `node_index`. Missing
    /// intra-layer edges are cloned in afterwards.
    pub(crate) fn merge_layer(
        &mut self,
        other: &DynamicLayer,
        node_index: &mut HashMap<NodeId, LayerKey>,
        update_attributes: bool,
    ) {
        for (index, slot) in other.nodes.iter().enumerate() {
            let Some(other_node) = slot.as_ref() else {
                continue;
            };

            if (index as u64) < self.next_node {
                if update_attributes {
                    if let Some(node) = self.nodes.get_mut(index).and_then(|s| s.as_mut()) {
                        node.attributes = other_node.attributes.clone();
                    }
                }
                continue;
            }

            while self.nodes.len() < index {
                self.nodes.push(None);
            }

            let mut node =
                SceneGraphNode::new(other_node.id, self.id, other_node.attributes.clone());
            node.timestamp = other_node.timestamp;
            self.nodes.push(Some(node));
            self.node_status.insert(other_node.id, ChangeStatus::New);
            node_index.insert(
                other_node.id,
                LayerKey::dynamic_layer(self.id, self.prefix),
            );
            self.next_node = index as u64 + 1;
        }

        for edge in other.edges.edges() {
            if !self.edges.contains(edge.source, edge.target) {
                self.edges
                    .insert(edge.source, edge.target, edge.attributes.clone());
            }
        }
    }

    /// The slot index for `id`, when `id` belongs to this instance.
    fn slot_of(&self, id: NodeId) -> Option<usize> {
        self.prefix
            .matches(id)
            .then(|| NodeSymbol::from(id).category_id() as usize)
    }

    /// Most recent live node strictly before sequence index `index`.
    fn latest_before(&self, index: u64) -> Option<NodeId> {
        self.nodes[..(index as usize).min(self.nodes.len())]
            .iter()
            .rev()
            .find_map(|slot| slot.as_ref().map(|node| node.id))
    }
}

impl GraphLayer for DynamicLayer {
    fn layer_id(&self) -> LayerId {
        self.id
    }

    fn num_nodes(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    fn num_edges(&self) -> usize {
        self.edges.len()
    }

    fn get_node(&self, id: NodeId) -> Option<&SceneGraphNode> {
        let slot = self.slot_of(id)?;
        self.nodes.get(slot)?.as_ref()
    }

    fn get_node_mut(&mut self, id: NodeId) -> Option<&mut SceneGraphNode> {
        let slot = self.slot_of(id)?;
        self.nodes.get_mut(slot)?.as_mut()
    }

    fn remove_node(&mut self, id: NodeId) -> bool {
        let Some(slot) = self.slot_of(id) else {
            return false;
        };
        if self.nodes.get(slot).is_none_or(|s| s.is_none()) {
            return false;
        }

        for neighbor in self.edges.neighbors(id) {
            self.edges.remove(id, neighbor);
        }

        self.nodes[slot] = None;
        self.node_status.insert(id, ChangeStatus::Removed);
        true
    }

    fn insert_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        attributes: Box<dyn EdgeAttributes>,
    ) -> bool {
        if self.get_node(source).is_none() || self.get_node(target).is_none() {
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
        self.next_node = 0;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
