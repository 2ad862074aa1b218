//! Node and edge attribute payloads.
//!
//! The graph treats attributes as opaque, heap-owned, polymorphic values: a
//! node's payload is a `Box<dyn NodeAttributes>` owned by exactly one
//! container at a time, moved on insertion and cloned only where the same
//! logical record must exist in two places at once (cross-graph merge, edge
//! rewiring). Consumers downcast through [`NodeAttributes::as_any`] to reach
//! their concrete payload type.
//!
//! # Example
//!
//! ```rust
//! use strata_types::attributes::{BasicNodeAttributes, NodeAttributes, Point3};
//!
//! let attrs: Box<dyn NodeAttributes> =
//!     Box::new(BasicNodeAttributes::new(Point3::new(1.0, 2.0, 3.0)));
//!
//! let copy = attrs.clone();
//! assert_eq!(copy.position(), attrs.position());
//! ```

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Point3
// ─────────────────────────────────────────────────────────────────────────────

/// A point in 3-D space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    /// Create a new point.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The origin.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payload traits
// ─────────────────────────────────────────────────────────────────────────────

/// Polymorphic node payload.
///
/// Every node carries a position (the only attribute the graph itself reads,
/// via the position queries); everything else is consumer-defined and reached
/// by downcasting.
pub trait NodeAttributes: fmt::Debug {
    /// World-frame position of the entity this node represents.
    fn position(&self) -> Point3;

    /// Produce an owned copy of this payload.
    fn clone_attributes(&self) -> Box<dyn NodeAttributes>;

    /// Downcast hook for consumers that know the concrete payload type.
    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn NodeAttributes> {
    fn clone(&self) -> Self {
        self.clone_attributes()
    }
}

/// Polymorphic edge payload.
pub trait EdgeAttributes: fmt::Debug {
    /// Edge weight; `1.0` for unweighted edges.
    fn weight(&self) -> f64;

    /// Produce an owned copy of this payload.
    fn clone_attributes(&self) -> Box<dyn EdgeAttributes>;

    /// Downcast hook for consumers that know the concrete payload type.
    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn EdgeAttributes> {
    fn clone(&self) -> Self {
        self.clone_attributes()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Concrete node payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Minimal node payload: a position and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BasicNodeAttributes {
    /// World-frame position of the node.
    pub position: Point3,
}

impl BasicNodeAttributes {
    /// Create a payload at `position`.
    pub fn new(position: Point3) -> Self {
        Self { position }
    }
}

impl NodeAttributes for BasicNodeAttributes {
    fn position(&self) -> Point3 {
        self.position
    }

    fn clone_attributes(&self) -> Box<dyn NodeAttributes> {
        Box::new(*self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Node payload for semantically labelled entities (objects, places, rooms).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SemanticNodeAttributes {
    /// World-frame position of the node.
    pub position: Point3,
    /// Human-readable name (e.g. `"chair_3"`).
    pub name: String,
    /// Class label from the semantic segmentation vocabulary.
    pub semantic_label: u32,
}

impl SemanticNodeAttributes {
    /// Create a labelled payload.
    pub fn new(position: Point3, name: impl Into<String>, semantic_label: u32) -> Self {
        Self {
            position,
            name: name.into(),
            semantic_label,
        }
    }
}

impl NodeAttributes for SemanticNodeAttributes {
    fn position(&self) -> Point3 {
        self.position
    }

    fn clone_attributes(&self) -> Box<dyn NodeAttributes> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Concrete edge payload
// ─────────────────────────────────────────────────────────────────────────────

/// Default edge payload: an optional scalar weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasicEdgeAttributes {
    /// Whether [`weight`](Self::weight) carries information.
    pub weighted: bool,
    /// Edge weight; meaningful only when `weighted` is set.
    pub weight: f64,
}

impl BasicEdgeAttributes {
    /// Create a weighted payload.
    pub fn weighted(weight: f64) -> Self {
        Self {
            weighted: true,
            weight,
        }
    }
}

impl Default for BasicEdgeAttributes {
    fn default() -> Self {
        Self {
            weighted: false,
            weight: 1.0,
        }
    }
}

impl EdgeAttributes for BasicEdgeAttributes {
    fn weight(&self) -> f64 {
        self.weight
    }

    fn clone_attributes(&self) -> Box<dyn EdgeAttributes> {
        Box::new(*self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
