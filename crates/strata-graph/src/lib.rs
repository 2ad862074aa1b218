//! `strata-graph` – layered spatial-semantic scene graph.
//!
//! The shared world representation of the perception pipeline: perceived
//! entities organised into abstraction layers (objects → places → rooms →
//! buildings), any number of time-indexed per-agent layers, a geometric mesh
//! layer, and the cross-layer indices that keep the whole structure
//! consistent under insert, remove, rewire, and bulk-merge operations.
//!
//! # Modules
//!
//! - [`node`] – [`SceneGraphNode`][node::SceneGraphNode],
//!   [`SceneGraphEdge`][node::SceneGraphEdge] and the unordered
//!   [`EdgeKey`][node::EdgeKey].
//! - [`edges`] – [`EdgeContainer`][edges::EdgeContainer]: a tracked edge set
//!   with per-node adjacency and drainable new/removed markers, shared by
//!   every layer and by the interlayer sets.
//! - [`layer`] – the [`GraphLayer`][layer::GraphLayer] capability and
//!   [`SceneGraphLayer`][layer::SceneGraphLayer], one static abstraction
//!   level owning its nodes and intra-layer edges.
//! - [`dynamic`] – [`DynamicLayer`][dynamic::DynamicLayer]: a time-indexed
//!   per-prefix layer whose node ids are minted from a sequence counter.
//! - [`mesh`] – [`Mesh`][mesh::Mesh] geometry plus the
//!   [`MeshEdgeTable`][mesh::MeshEdgeTable] associating semantic nodes with
//!   mesh vertices.
//! - [`ancestry`] – classification of an interlayer edge into parent/child
//!   or sibling linkage from its endpoints' layer keys.
//! - [`graph`] – [`SceneGraph`][graph::SceneGraph]: the root that owns all
//!   layers, the global node index, both interlayer edge sets and the mesh
//!   tables, and through which every public mutation funnels.

pub mod ancestry;
pub mod dynamic;
pub mod edges;
pub mod graph;
pub mod layer;
pub mod mesh;
pub mod node;
