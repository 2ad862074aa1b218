//! `strata-types` – shared data model for the Strata scene graph.
//!
//! Defines the vocabulary every other Strata crate speaks: node and layer
//! identifiers, the symbol codec that packs a layer prefix and a sequence
//! index into a single node id, attribute payload traits, and the error and
//! change-status types used across the graph.
//!
//! # Modules
//!
//! - [`ids`] – [`NodeId`][ids::NodeId], [`LayerId`][ids::LayerId],
//!   [`LayerPrefix`][ids::LayerPrefix], [`NodeSymbol`][ids::NodeSymbol] and
//!   [`LayerKey`][ids::LayerKey]: identifiers, the prefix/index codec, and
//!   the layer-hierarchy ordering used to classify interlayer edges.
//! - [`attributes`] – [`Point3`][attributes::Point3] plus the polymorphic,
//!   clonable node/edge attribute payloads
//!   ([`NodeAttributes`][attributes::NodeAttributes],
//!   [`EdgeAttributes`][attributes::EdgeAttributes]).

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod attributes;
pub mod ids;

use ids::{LayerId, LayerPrefix};

// ─────────────────────────────────────────────────────────────────────────────
// Change status
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle marker carried by every node and edge, relative to the last time
/// a consumer drained the new/removed lists.
///
/// Consumers synchronising incrementally (e.g. a back-end optimizer polling a
/// front-end graph) read these through the drain operations on the graph and
/// may request that the markers be cleared as part of the drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    /// Present before the last drain; nothing to report.
    Unchanged,
    /// Added since the last drain.
    New,
    /// Removed since the last drain (the record itself is already gone; the
    /// marker is a tombstone).
    Removed,
}

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised by scene graph construction and the fault-tier lookups.
///
/// Expected data conditions (duplicate ids, missing edges, out-of-bounds mesh
/// vertices) are reported as `bool`/`Option` returns instead; this type is
/// reserved for configuration errors and caller misuse.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphError {
    #[error("scene graph cannot be constructed without layers")]
    EmptyLayerConfig,

    #[error("mesh layer id {0} collides with a configured layer")]
    MeshLayerConflict(LayerId),

    #[error("missing layer {0}")]
    MissingLayer(LayerId),

    #[error("missing dynamic layer {layer}({prefix})")]
    MissingDynamicLayer { layer: LayerId, prefix: LayerPrefix },

    #[error("node {0} is not in the graph")]
    MissingNode(String),

    #[error("merging dynamic-layer nodes is not supported")]
    DynamicNodeMerge,
}
