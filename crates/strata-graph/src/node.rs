//! Nodes, edges, and the unordered edge key.
//!
//! A [`SceneGraphNode`] is owned exclusively by its layer; every other part
//! of the graph refers to it by [`NodeId`] and resolves the reference through
//! the owning layer at time of use. The ancestry fields (`parent`,
//! `children`, `siblings`) are maintained by the graph root as interlayer
//! edges come and go — consumers read them through the accessors.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use strata_types::attributes::{EdgeAttributes, NodeAttributes};
use strata_types::ids::{LayerId, NodeId};

// ─────────────────────────────────────────────────────────────────────────────
// SceneGraphNode
// ─────────────────────────────────────────────────────────────────────────────

/// A perceived entity at one abstraction level.
#[derive(Debug)]
pub struct SceneGraphNode {
    /// Globally unique identifier.
    pub id: NodeId,
    /// Abstraction level this node lives on.
    pub layer: LayerId,
    /// Opaque payload; the graph itself reads only the position.
    pub attributes: Box<dyn NodeAttributes>,
    /// Parent in the next-coarser layer, at most one.
    pub(crate) parent: Option<NodeId>,
    /// Children in finer layers.
    pub(crate) children: BTreeSet<NodeId>,
    /// Interlayer siblings (endpoints of interlayer edges with no hierarchy
    /// ordering between the two layer keys).
    pub(crate) siblings: BTreeSet<NodeId>,
    /// Observation time; `Some` exactly for dynamic-layer nodes.
    pub(crate) timestamp: Option<DateTime<Utc>>,
}

impl SceneGraphNode {
    /// Create a static-layer node.
    pub fn new(id: NodeId, layer: LayerId, attributes: Box<dyn NodeAttributes>) -> Self {
        Self {
            id,
            layer,
            attributes,
            parent: None,
            children: BTreeSet::new(),
            siblings: BTreeSet::new(),
            timestamp: None,
        }
    }

    /// Create a dynamic-layer node stamped with its observation time.
    pub fn new_dynamic(
        id: NodeId,
        layer: LayerId,
        timestamp: DateTime<Utc>,
        attributes: Box<dyn NodeAttributes>,
    ) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..Self::new(id, layer, attributes)
        }
    }

    /// True when a parent is recorded.
    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// Parent in the next-coarser layer, if any.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in finer layers.
    pub fn children(&self) -> &BTreeSet<NodeId> {
        &self.children
    }

    /// Interlayer siblings.
    pub fn siblings(&self) -> &BTreeSet<NodeId> {
        &self.siblings
    }

    /// Observation time; `Some` exactly for dynamic-layer nodes.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub(crate) fn set_parent(&mut self, parent: NodeId) {
        self.parent = Some(parent);
    }

    pub(crate) fn clear_parent(&mut self) {
        self.parent = None;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SceneGraphEdge
// ─────────────────────────────────────────────────────────────────────────────

/// A relation between two nodes.
///
/// For tracking purposes an edge's identity is the unordered pair of its
/// endpoints (see [`EdgeKey`]); `source`/`target` preserve the orientation the
/// edge was inserted with.
#[derive(Debug)]
pub struct SceneGraphEdge {
    pub source: NodeId,
    pub target: NodeId,
    /// Opaque payload, cloned only when the edge must exist in two containers
    /// at once (cross-graph merge).
    pub attributes: Box<dyn EdgeAttributes>,
}

impl SceneGraphEdge {
    /// Create an edge.
    pub fn new(source: NodeId, target: NodeId, attributes: Box<dyn EdgeAttributes>) -> Self {
        Self {
            source,
            target,
            attributes,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EdgeKey
// ─────────────────────────────────────────────────────────────────────────────

/// Unordered endpoint pair identifying an edge.
///
/// The constructor normalises the pair so that `k1 <= k2`; two keys built
/// from the same endpoints in either order compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub k1: NodeId,
    pub k2: NodeId,
}

impl EdgeKey {
    /// Build the key for an endpoint pair, in either order.
    pub fn new(source: NodeId, target: NodeId) -> Self {
        if source <= target {
            Self {
                k1: source,
                k2: target,
            }
        } else {
            Self {
                k1: target,
                k2: source,
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
