//! The scene graph root.
//!
//! [`SceneGraph`] owns every layer, the global node index, both interlayer
//! edge sets, and the mesh tables. All public mutation funnels through it:
//! the node index is updated (or validated) first, node and edge storage is
//! delegated to the owning layer, and the ancestry fields and interlayer/mesh
//! indices are maintained on the side.
//!
//! The structure is single-threaded and synchronous: no operation suspends or
//! blocks, and every mutation is fully visible to the next call. Producers on
//! other threads build their own graph and hand it over through
//! [`SceneGraph::merge_graph`], the designed batch-synchronisation point.
//!
//! # Example
//!
//! ```rust
//! use strata_graph::graph::SceneGraph;
//! use strata_types::attributes::BasicNodeAttributes;
//! use strata_types::ids::layers;
//!
//! let mut graph = SceneGraph::with_default_layers(layers::MESH).unwrap();
//!
//! // A place node and an object node, linked across layers.
//! assert!(graph.emplace_node(layers::OBJECTS, 1, Box::new(BasicNodeAttributes::default())));
//! assert!(graph.emplace_node(layers::PLACES, 2, Box::new(BasicNodeAttributes::default())));
//! assert!(graph.insert_edge_default(2, 1));
//!
//! // Places are coarser than objects, so the place became the parent.
//! assert_eq!(graph.get_node(1).unwrap().parent(), Some(2));
//! ```

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use strata_types::attributes::{BasicEdgeAttributes, EdgeAttributes, NodeAttributes, Point3};
use strata_types::{ChangeStatus, GraphError};
use strata_types::ids::{LayerId, LayerKey, LayerPrefix, NodeId, NodeSymbol, layers};

use crate::ancestry::{self, AncestryRelation};
use crate::dynamic::DynamicLayer;
use crate::edges::EdgeContainer;
use crate::layer::{GraphLayer, SceneGraphLayer};
use crate::mesh::{Mesh, MeshEdgeTable};
use crate::node::{EdgeKey, SceneGraphEdge, SceneGraphNode};

// ─────────────────────────────────────────────────────────────────────────────
// Merge configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`SceneGraph::merge_graph`].
#[derive(Debug)]
pub struct GraphMergeConfig {
    /// Accept mesh edges from the other graph even when no local mesh is set
    /// or their vertex is out of bounds.
    pub allow_invalid_mesh: bool,
    /// Drop all local mesh edges before adopting the other graph's.
    pub clear_mesh_edges: bool,
    /// Per-layer gate for overwriting attributes of nodes present in both
    /// graphs; layers absent from the map default to updating.
    pub update_layer_attributes: HashMap<LayerId, bool>,
    /// Gate for overwriting attributes of dynamic nodes present in both
    /// graphs.
    pub update_dynamic_attributes: bool,
}

impl Default for GraphMergeConfig {
    fn default() -> Self {
        Self {
            allow_invalid_mesh: false,
            clear_mesh_edges: false,
            update_layer_attributes: HashMap::new(),
            update_dynamic_attributes: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SceneGraph
// ─────────────────────────────────────────────────────────────────────────────

/// The multi-layer, partially time-indexed graph store.
///
/// Static layers are fixed at construction; dynamic-layer instances are
/// created on demand as `(layer, prefix)` pairs appear. The node index maps
/// every live node id to the key of its owning layer instance and is the sole
/// source of truth for "where does this node live".
#[derive(Debug)]
pub struct SceneGraph {
    layer_ids: Vec<LayerId>,
    mesh_layer_id: LayerId,
    layers: HashMap<LayerId, SceneGraphLayer>,
    dynamic_layers: HashMap<LayerId, HashMap<LayerPrefix, DynamicLayer>>,
    node_index: HashMap<NodeId, LayerKey>,
    interlayer_edges: EdgeContainer,
    dynamic_interlayer_edges: EdgeContainer,
    mesh: Option<Mesh>,
    mesh_edges: MeshEdgeTable,
}

impl SceneGraph {
    /// Create a graph with the given static layers and mesh layer id.
    ///
    /// Fails when `layer_ids` is empty or `mesh_layer_id` collides with a
    /// configured layer.
    pub fn new(layer_ids: Vec<LayerId>, mesh_layer_id: LayerId) -> Result<Self, GraphError> {
        if layer_ids.is_empty() {
            return Err(GraphError::EmptyLayerConfig);
        }
        if layer_ids.contains(&mesh_layer_id) {
            return Err(GraphError::MeshLayerConflict(mesh_layer_id));
        }

        let mut graph = Self {
            layer_ids,
            mesh_layer_id,
            layers: HashMap::new(),
            dynamic_layers: HashMap::new(),
            node_index: HashMap::new(),
            interlayer_edges: EdgeContainer::new(),
            dynamic_interlayer_edges: EdgeContainer::new(),
            mesh: None,
            mesh_edges: MeshEdgeTable::new(),
        };
        graph.clear();
        Ok(graph)
    }

    /// Create a graph with the conventional object/place/room/building stack.
    pub fn with_default_layers(mesh_layer_id: LayerId) -> Result<Self, GraphError> {
        Self::new(
            vec![
                layers::OBJECTS,
                layers::PLACES,
                layers::ROOMS,
                layers::BUILDINGS,
            ],
            mesh_layer_id,
        )
    }

    /// Reset to the configured-but-empty state: static layers exist empty,
    /// everything else (dynamic layers, indices, mesh, change markers) is
    /// dropped.
    pub fn clear(&mut self) {
        self.layers = self
            .layer_ids
            .iter()
            .map(|id| (*id, SceneGraphLayer::new(*id)))
            .collect();
        self.dynamic_layers.clear();
        self.node_index.clear();
        self.interlayer_edges.reset();
        self.dynamic_interlayer_edges.reset();
        self.mesh = None;
        self.mesh_edges = MeshEdgeTable::new();
    }

    /// The configured static layer ids, in construction order.
    pub fn layer_ids(&self) -> &[LayerId] {
        &self.layer_ids
    }

    /// The reserved mesh layer id.
    pub fn mesh_layer_id(&self) -> LayerId {
        self.mesh_layer_id
    }

    // ─── Layer access ───────────────────────────────────────────────────────

    /// True when `layer` exists: a configured static layer, or — for the
    /// reserved mesh layer id — when a mesh is currently set.
    pub fn has_layer(&self, layer: LayerId) -> bool {
        if layer == self.mesh_layer_id {
            self.has_mesh()
        } else {
            self.layers.contains_key(&layer)
        }
    }

    /// True when the dynamic-layer instance `(layer, prefix)` exists.
    pub fn has_dynamic_layer(&self, layer: LayerId, prefix: LayerPrefix) -> bool {
        self.dynamic_layers
            .get(&layer)
            .is_some_and(|group| group.contains_key(&prefix))
    }

    /// The static layer for `layer`.
    ///
    /// Missing layers are caller misuse, reported as a fault.
    pub fn get_layer(&self, layer: LayerId) -> Result<&SceneGraphLayer, GraphError> {
        self.layers
            .get(&layer)
            .ok_or(GraphError::MissingLayer(layer))
    }

    /// The dynamic-layer instance `(layer, prefix)`.
    pub fn get_dynamic_layer(
        &self,
        layer: LayerId,
        prefix: LayerPrefix,
    ) -> Result<&DynamicLayer, GraphError> {
        self.dynamic_layers
            .get(&layer)
            .and_then(|group| group.get(&prefix))
            .ok_or(GraphError::MissingDynamicLayer { layer, prefix })
    }

    /// Create the dynamic-layer instance `(layer, prefix)` if it does not
    /// exist yet. Returns `false` when it already did.
    pub fn create_dynamic_layer(&mut self, layer: LayerId, prefix: LayerPrefix) -> bool {
        let group = self.dynamic_layers.entry(layer).or_default();
        if group.contains_key(&prefix) {
            return false;
        }
        group.insert(prefix, DynamicLayer::new(layer, prefix));
        true
    }

    // ─── Node operations ────────────────────────────────────────────────────

    /// Create a node in a static layer from its attribute payload.
    ///
    /// Fails when the layer does not exist or the id is already present
    /// anywhere in the graph.
    pub fn emplace_node(
        &mut self,
        layer: LayerId,
        id: NodeId,
        attributes: Box<dyn NodeAttributes>,
    ) -> bool {
        let Some(target) = self.layers.get_mut(&layer) else {
            warn!("invalid layer {}", layer);
            return false;
        };

        if self.node_index.contains_key(&id) {
            return false;
        }

        if target.emplace_node(id, attributes) {
            self.node_index.insert(id, LayerKey::static_layer(layer));
            return true;
        }
        false
    }

    /// Create the next node in a dynamic-layer instance, creating the
    /// instance on demand.
    ///
    /// The id is minted from the prefix's sequence counter; when it collides
    /// with an existing node the emplacement fails and nothing is created.
    /// With `link_previous` set, the new node is chained to its predecessor
    /// with an intra-layer edge.
    pub fn emplace_dynamic_node(
        &mut self,
        layer: LayerId,
        prefix: LayerPrefix,
        timestamp: DateTime<Utc>,
        attributes: Box<dyn NodeAttributes>,
        link_previous: bool,
    ) -> bool {
        let candidate = match self.dynamic_layers.get(&layer).and_then(|g| g.get(&prefix)) {
            Some(instance) => instance.next_id(),
            None => prefix.make_id(0),
        };

        if self.node_index.contains_key(&candidate) {
            error!(
                "scene graph already contains node {}; fix conflicting prefix {}",
                NodeSymbol::from(candidate).label(),
                prefix
            );
            return false;
        }

        self.create_dynamic_layer(layer, prefix);
        let Some(instance) = self
            .dynamic_layers
            .get_mut(&layer)
            .and_then(|group| group.get_mut(&prefix))
        else {
            return false;
        };

        let id = instance.emplace_node(timestamp, attributes, link_previous);
        self.node_index
            .insert(id, LayerKey::dynamic_layer(layer, prefix));
        true
    }

    /// Insert a pre-built node (used by merge paths).
    ///
    /// Fails on a duplicate id or an unknown layer.
    pub fn insert_node(&mut self, node: SceneGraphNode) -> bool {
        if self.node_index.contains_key(&node.id) {
            return false;
        }

        let id = node.id;
        let layer = node.layer;
        let Some(target) = self.layers.get_mut(&layer) else {
            return false;
        };

        if target.insert_node(node) {
            self.node_index.insert(id, LayerKey::static_layer(layer));
            return true;
        }
        false
    }

    /// True when a node with `id` is live anywhere in the graph.
    pub fn has_node(&self, id: NodeId) -> bool {
        self.node_index.contains_key(&id)
    }

    /// The node with `id`, resolved through its owning layer.
    pub fn get_node(&self, id: NodeId) -> Option<&SceneGraphNode> {
        let key = self.node_index.get(&id)?;
        self.layer_from_key(key)?.get_node(id)
    }

    /// The node with `id`, when it lives in a dynamic layer.
    pub fn get_dynamic_node(&self, id: NodeId) -> Option<&SceneGraphNode> {
        let key = self.node_index.get(&id)?;
        if !key.is_dynamic() {
            return None;
        }
        self.layer_from_key(key)?.get_node(id)
    }

    /// The key of the layer instance owning `id`.
    pub fn get_layer_for_node(&self, id: NodeId) -> Option<LayerKey> {
        self.node_index.get(&id).copied()
    }

    /// True when `id` lives in a dynamic layer.
    pub fn is_dynamic(&self, id: NodeId) -> bool {
        self.node_index
            .get(&id)
            .is_some_and(|key| key.is_dynamic())
    }

    /// Position of the node with `id`, read from its attributes.
    ///
    /// An unknown id is caller misuse, reported as a fault.
    pub fn get_position(&self, id: NodeId) -> Result<Point3, GraphError> {
        let missing = || GraphError::MissingNode(NodeSymbol::from(id).label());
        let key = self.node_index.get(&id).ok_or_else(missing)?;
        self.layer_from_key(key)
            .and_then(|layer| layer.get_position(id))
            .ok_or_else(missing)
    }

    /// Remove a node, first unwinding everything that references it: mesh
    /// edges, its parent edge, all child edges, and all sibling interlayer
    /// edges. The owning layer then erases the node and its intra-layer
    /// edges, and the node index entry is dropped.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        let Some(key) = self.node_index.get(&id).copied() else {
            return false;
        };

        for vertex in self.mesh_edges.connection_indices(id) {
            self.mesh_edges.remove(id, vertex);
        }

        let (parent, children, siblings) = match self.get_node(id) {
            Some(node) => (node.parent, node.children.clone(), node.siblings.clone()),
            None => (None, BTreeSet::new(), BTreeSet::new()),
        };

        if let Some(parent) = parent {
            self.remove_interlayer_edge_between(id, parent);
        }
        for child in children {
            self.remove_interlayer_edge_between(id, child);
        }
        for sibling in siblings {
            self.remove_interlayer_edge_between(id, sibling);
        }

        if let Some(layer) = self.layer_from_key_mut(&key) {
            layer.remove_node(id);
        }
        self.node_index.remove(&id);
        true
    }

    // ─── Edge operations ────────────────────────────────────────────────────

    /// Insert an edge between two nodes.
    ///
    /// Edges whose endpoints share a layer key are delegated to that layer's
    /// own container. Otherwise the ancestry relation implied by the two
    /// layer keys is recorded first — the whole insert fails when a
    /// parent/child relation is implied and the child already has a parent —
    /// and the edge lands in the static or dynamic interlayer set, selected
    /// by whether either endpoint is dynamic.
    pub fn insert_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        attributes: Box<dyn EdgeAttributes>,
    ) -> bool {
        let (Some(source_key), Some(target_key)) = (
            self.node_index.get(&source).copied(),
            self.node_index.get(&target).copied(),
        ) else {
            return false;
        };

        if self.edge_exists(source, target, &source_key, &target_key) {
            return false;
        }

        if source_key == target_key {
            return self
                .layer_from_key_mut(&source_key)
                .map(|layer| layer.insert_edge(source, target, attributes))
                .unwrap_or(false);
        }

        if !self.add_ancestry(source, target, &source_key, &target_key) {
            return false;
        }

        self.interlayer_container_mut(&source_key, &target_key)
            .insert(source, target, attributes);
        true
    }

    /// [`insert_edge`](Self::insert_edge) with the default edge payload.
    pub fn insert_edge_default(&mut self, source: NodeId, target: NodeId) -> bool {
        self.insert_edge(source, target, Box::new(BasicEdgeAttributes::default()))
    }

    /// True when an edge exists between the pair, in any container.
    pub fn has_edge(&self, source: NodeId, target: NodeId) -> bool {
        let (Some(source_key), Some(target_key)) = (
            self.node_index.get(&source),
            self.node_index.get(&target),
        ) else {
            return false;
        };
        self.edge_exists(source, target, source_key, target_key)
    }

    /// The edge between the pair, in whichever container holds it.
    pub fn get_edge(&self, source: NodeId, target: NodeId) -> Option<&SceneGraphEdge> {
        let source_key = self.node_index.get(&source)?;
        let target_key = self.node_index.get(&target)?;

        if source_key == target_key {
            return self.layer_from_key(source_key)?.get_edge(source, target);
        }

        self.interlayer_container(source_key, target_key)
            .get(source, target)
    }

    /// Remove the edge between the pair, undoing its ancestry relation when
    /// it was an interlayer edge.
    pub fn remove_edge(&mut self, source: NodeId, target: NodeId) -> bool {
        let (Some(source_key), Some(target_key)) = (
            self.node_index.get(&source).copied(),
            self.node_index.get(&target).copied(),
        ) else {
            return false;
        };

        if source_key == target_key {
            return self
                .layer_from_key_mut(&source_key)
                .map(|layer| layer.remove_edge(source, target))
                .unwrap_or(false);
        }

        if !self.edge_exists(source, target, &source_key, &target_key) {
            return false;
        }

        self.remove_interlayer_edge(source, target, &source_key, &target_key);
        true
    }

    // ─── Mesh operations ────────────────────────────────────────────────────

    /// True when a mesh is currently set.
    pub fn has_mesh(&self) -> bool {
        self.mesh.is_some()
    }

    /// The current mesh.
    pub fn get_mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    /// Replace the mesh.
    ///
    /// `None` drops the mesh and clears all mesh edges unconditionally. With
    /// `invalidate_all_edges` set, a replacement mesh also clears all mesh
    /// edges; otherwise only edges whose vertex index is out of bounds for
    /// the new mesh are purged.
    pub fn set_mesh(&mut self, mesh: Option<Mesh>, invalidate_all_edges: bool) {
        let Some(mesh) = mesh else {
            debug!("received empty mesh; resetting all mesh edges");
            self.mesh = None;
            self.mesh_edges.clear();
            return;
        };

        let num_vertices = mesh.num_vertices();
        self.mesh = Some(mesh);

        if invalidate_all_edges {
            self.mesh_edges.clear();
        } else {
            self.mesh_edges.purge_invalid(num_vertices);
        }
    }

    /// Replace the mesh without touching any mesh edges.
    pub fn set_mesh_directly(&mut self, mesh: Mesh) {
        self.mesh = Some(mesh);
    }

    /// Associate a node with a mesh vertex.
    ///
    /// Fails when the node is unknown, when — unless `allow_invalid_mesh` is
    /// set — no mesh is set or the vertex is out of bounds, or when the pair
    /// already exists.
    pub fn insert_mesh_edge(
        &mut self,
        node: NodeId,
        vertex: usize,
        allow_invalid_mesh: bool,
    ) -> bool {
        if !self.has_node(node) {
            return false;
        }

        if !allow_invalid_mesh {
            let Some(mesh) = &self.mesh else {
                return false;
            };
            if vertex >= mesh.num_vertices() {
                return false;
            }
        }

        self.mesh_edges.insert(node, vertex)
    }

    /// Remove the association between `node` and `vertex`.
    pub fn remove_mesh_edge(&mut self, node: NodeId, vertex: usize) -> bool {
        self.mesh_edges.remove(node, vertex)
    }

    /// True when `node` is associated with `vertex`.
    pub fn has_mesh_edge(&self, node: NodeId, vertex: usize) -> bool {
        self.mesh_edges.contains(node, vertex)
    }

    /// Remove every mesh edge touching `vertex`.
    pub fn invalidate_mesh_vertex(&mut self, vertex: usize) {
        self.mesh_edges.invalidate_vertex(vertex);
    }

    /// Drop all mesh edges.
    pub fn clear_mesh_edges(&mut self) {
        self.mesh_edges.clear();
    }

    /// All mesh vertices connected to `node`, in ascending order.
    pub fn get_mesh_connection_indices(&self, node: NodeId) -> Vec<usize> {
        self.mesh_edges.connection_indices(node)
    }

    /// Position of mesh vertex `index`; `None` when no mesh is set or the
    /// index is out of range.
    pub fn get_mesh_position(&self, index: usize) -> Option<Point3> {
        self.mesh.as_ref()?.vertex(index)
    }

    // ─── Counts ─────────────────────────────────────────────────────────────

    /// Number of layers: configured static layers, the mesh layer, and every
    /// dynamic level not shadowing a static one.
    pub fn num_layers(&self) -> usize {
        let unique_dynamic = self
            .dynamic_layers
            .keys()
            .filter(|id| !self.layers.contains_key(id) && **id != self.mesh_layer_id)
            .count();
        self.layers.len() + 1 + unique_dynamic
    }

    /// Number of dynamic-layer instances across all levels.
    pub fn num_dynamic_layers(&self) -> usize {
        self.dynamic_layers.values().map(|group| group.len()).sum()
    }

    /// Number of dynamic-layer instances at `layer`.
    pub fn num_dynamic_layers_of_type(&self, layer: LayerId) -> usize {
        self.dynamic_layers
            .get(&layer)
            .map(|group| group.len())
            .unwrap_or(0)
    }

    /// Total number of nodes, counting mesh vertices as the mesh layer's
    /// nodes.
    pub fn num_nodes(&self) -> usize {
        let static_nodes: usize = self.layers.values().map(|layer| layer.num_nodes()).sum();
        let mesh_nodes = self
            .mesh
            .as_ref()
            .map(|mesh| mesh.num_vertices())
            .unwrap_or(0);
        static_nodes + self.num_dynamic_nodes() + mesh_nodes
    }

    /// Number of nodes across all dynamic-layer instances.
    pub fn num_dynamic_nodes(&self) -> usize {
        self.dynamic_layers
            .values()
            .flat_map(|group| group.values())
            .map(|layer| layer.num_nodes())
            .sum()
    }

    /// Total number of edges across layers, interlayer sets, and mesh edges.
    pub fn num_edges(&self) -> usize {
        let static_edges: usize = self.layers.values().map(|layer| layer.num_edges()).sum();
        let dynamic_edges: usize = self
            .dynamic_layers
            .values()
            .flat_map(|group| group.values())
            .map(|layer| layer.num_edges())
            .sum();
        static_edges
            + dynamic_edges
            + self.interlayer_edges.len()
            + self.dynamic_interlayer_edges.len()
            + self.mesh_edges.len()
    }

    /// True when the graph holds no nodes (and no mesh vertices).
    pub fn is_empty(&self) -> bool {
        self.num_nodes() == 0
    }

    // ─── Change drains ──────────────────────────────────────────────────────

    /// Ids of nodes added since the last clearing drain, across every layer.
    pub fn drain_new_nodes(&mut self, clear: bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.visit_layers_mut(|layer| out.extend(layer.drain_new_nodes(clear)));
        out
    }

    /// Ids of nodes removed since the last clearing drain.
    pub fn drain_removed_nodes(&mut self, clear: bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.visit_layers_mut(|layer| out.extend(layer.drain_removed_nodes(clear)));
        out
    }

    /// Keys of edges added since the last clearing drain, across every layer
    /// and both interlayer sets.
    pub fn drain_new_edges(&mut self, clear: bool) -> Vec<EdgeKey> {
        let mut out = Vec::new();
        self.visit_layers_mut(|layer| out.extend(layer.drain_new_edges(clear)));
        out.extend(self.interlayer_edges.drain_new(clear));
        out.extend(self.dynamic_interlayer_edges.drain_new(clear));
        out
    }

    /// Keys of edges removed since the last clearing drain.
    pub fn drain_removed_edges(&mut self, clear: bool) -> Vec<EdgeKey> {
        let mut out = Vec::new();
        self.visit_layers_mut(|layer| out.extend(layer.drain_removed_edges(clear)));
        out.extend(self.interlayer_edges.drain_removed(clear));
        out.extend(self.dynamic_interlayer_edges.drain_removed(clear));
        out
    }

    // ─── Merge engine ───────────────────────────────────────────────────────

    /// Absorb a standalone layer built elsewhere (its contents are moved, not
    /// copied).
    ///
    /// Nodes already present keep their edges and ancestry and only take the
    /// incoming attribute payload; unknown nodes are transferred, stamped
    /// new, and registered in the node index. Edges, when supplied, are
    /// merged the same way into the target layer's own container.
    pub fn update_from_layer(
        &mut self,
        mut other_layer: SceneGraphLayer,
        edges: Option<Vec<SceneGraphEdge>>,
    ) -> bool {
        let layer_id = other_layer.id;
        let Some(target) = self.layers.get_mut(&layer_id) else {
            error!("scene graph does not have layer {}", layer_id);
            return false;
        };

        for (id, node) in other_layer.nodes.drain() {
            match target.nodes.get_mut(&id) {
                Some(existing) => existing.attributes = node.attributes,
                None => {
                    target
                        .nodes
                        .insert(id, SceneGraphNode::new(id, layer_id, node.attributes));
                    target.node_status.insert(id, ChangeStatus::New);
                    self.node_index.insert(id, LayerKey::static_layer(layer_id));
                }
            }
        }

        if let Some(edge_list) = edges {
            for edge in edge_list {
                if let Some(existing) = target.edges.get_mut(edge.source, edge.target) {
                    existing.attributes = edge.attributes;
                } else {
                    target.insert_edge(edge.source, edge.target, edge.attributes);
                }
            }
        }

        true
    }

    /// Incorporate another graph snapshot.
    ///
    /// Dynamic-layer instances are created locally as needed and merged
    /// node-by-node; static layers present in both graphs are merged with the
    /// per-layer attribute gates from `config`; nodes the other graph reports
    /// removed are removed locally. Interlayer and mesh edges are then
    /// re-inserted by cloning their payloads — re-inserting an existing edge
    /// is a no-op. Geometry itself is not merged; call
    /// [`set_mesh`](Self::set_mesh) separately for updated vertices.
    pub fn merge_graph(&mut self, other: &SceneGraph, config: &GraphMergeConfig) -> bool {
        for (layer_id, group) in &other.dynamic_layers {
            for (prefix, other_layer) in group {
                self.create_dynamic_layer(*layer_id, *prefix);
                if let Some(local) = self
                    .dynamic_layers
                    .get_mut(layer_id)
                    .and_then(|g| g.get_mut(prefix))
                {
                    local.merge_layer(
                        other_layer,
                        &mut self.node_index,
                        config.update_dynamic_attributes,
                    );
                }
            }
        }

        let mut removed_nodes = Vec::new();
        for (layer_id, other_layer) in &other.layers {
            let Some(local) = self.layers.get_mut(layer_id) else {
                continue; // layers absent here are skipped, not an error
            };
            let update = config
                .update_layer_attributes
                .get(layer_id)
                .copied()
                .unwrap_or(true);
            local.merge_layer(other_layer, &mut self.node_index, update);
            removed_nodes.extend(other_layer.removed_nodes());
        }
        for id in removed_nodes {
            self.remove_node(id);
        }

        for edge in other.interlayer_edges.edges() {
            self.insert_edge(edge.source, edge.target, edge.attributes.clone());
        }
        for edge in other.dynamic_interlayer_edges.edges() {
            self.insert_edge(edge.source, edge.target, edge.attributes.clone());
        }

        if config.clear_mesh_edges {
            self.clear_mesh_edges();
        }

        for edge in other.mesh_edges.edges() {
            self.insert_mesh_edge(edge.source_node, edge.mesh_vertex, config.allow_invalid_mesh);
        }

        true
    }

    /// Fold node `from` into node `to`.
    ///
    /// The parent edge and every child edge of `from` are rewired to `to`,
    /// then the owning layer merges the two nodes' intra-layer state and
    /// `from` is erased from the node index. Fails (`Ok(false)`) when either
    /// node is missing, the two are equal, or they live in different layer
    /// instances. Dynamic-layer nodes are explicitly unsupported.
    pub fn merge_nodes(&mut self, from: NodeId, to: NodeId) -> Result<bool, GraphError> {
        if from == to {
            return Ok(false);
        }
        let (Some(from_key), Some(to_key)) = (
            self.node_index.get(&from).copied(),
            self.node_index.get(&to).copied(),
        ) else {
            return Ok(false);
        };
        if from_key != to_key {
            return Ok(false);
        }
        if from_key.is_dynamic() {
            return Err(GraphError::DynamicNodeMerge);
        }

        let (parent, children, siblings) = match self.get_node(from) {
            Some(node) => (node.parent, node.children.clone(), node.siblings.clone()),
            None => (None, BTreeSet::new(), BTreeSet::new()),
        };

        if let Some(parent) = parent {
            self.rewire_interlayer_edge(from, parent, to, parent);
        }
        for child in children {
            self.rewire_interlayer_edge(from, child, to, child);
        }
        for sibling in siblings {
            self.rewire_interlayer_edge(from, sibling, to, sibling);
        }

        if let Some(layer) = self.layers.get_mut(&from_key.layer) {
            layer.merge_nodes(from, to);
        }
        self.node_index.remove(&from);
        Ok(true)
    }

    // ─── Internal plumbing ──────────────────────────────────────────────────

    /// Resolve a layer key to its layer, immutably.
    fn layer_from_key(&self, key: &LayerKey) -> Option<&dyn GraphLayer> {
        match key.prefix {
            Some(prefix) => self
                .dynamic_layers
                .get(&key.layer)?
                .get(&prefix)
                .map(|layer| layer as &dyn GraphLayer),
            None => self
                .layers
                .get(&key.layer)
                .map(|layer| layer as &dyn GraphLayer),
        }
    }

    /// Resolve a layer key to its layer, mutably. A separate bounds-checked
    /// lookup, not a cast of the immutable path.
    fn layer_from_key_mut(&mut self, key: &LayerKey) -> Option<&mut dyn GraphLayer> {
        match key.prefix {
            Some(prefix) => self
                .dynamic_layers
                .get_mut(&key.layer)?
                .get_mut(&prefix)
                .map(|layer| layer as &mut dyn GraphLayer),
            None => self
                .layers
                .get_mut(&key.layer)
                .map(|layer| layer as &mut dyn GraphLayer),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneGraphNode> {
        let key = self.node_index.get(&id).copied()?;
        self.layer_from_key_mut(&key)?.get_node_mut(id)
    }

    fn visit_layers_mut(&mut self, mut visit: impl FnMut(&mut dyn GraphLayer)) {
        for layer in self.layers.values_mut() {
            visit(layer);
        }
        for group in self.dynamic_layers.values_mut() {
            for layer in group.values_mut() {
                visit(layer);
            }
        }
    }

    fn interlayer_container(
        &self,
        source_key: &LayerKey,
        target_key: &LayerKey,
    ) -> &EdgeContainer {
        if source_key.is_dynamic() || target_key.is_dynamic() {
            &self.dynamic_interlayer_edges
        } else {
            &self.interlayer_edges
        }
    }

    fn interlayer_container_mut(
        &mut self,
        source_key: &LayerKey,
        target_key: &LayerKey,
    ) -> &mut EdgeContainer {
        if source_key.is_dynamic() || target_key.is_dynamic() {
            &mut self.dynamic_interlayer_edges
        } else {
            &mut self.interlayer_edges
        }
    }

    fn edge_exists(
        &self,
        source: NodeId,
        target: NodeId,
        source_key: &LayerKey,
        target_key: &LayerKey,
    ) -> bool {
        if source_key == target_key {
            return self
                .layer_from_key(source_key)
                .is_some_and(|layer| layer.has_edge(source, target));
        }
        self.interlayer_container(source_key, target_key)
            .contains(source, target)
    }

    /// Record the ancestry relation an interlayer edge establishes.
    ///
    /// Fails when a parent/child relation is implied and the child already
    /// has a parent — a node has at most one parent.
    fn add_ancestry(
        &mut self,
        source: NodeId,
        target: NodeId,
        source_key: &LayerKey,
        target_key: &LayerKey,
    ) -> bool {
        match ancestry::classify(source_key, target_key) {
            AncestryRelation::SourceIsParent => self.link_parent(source, target),
            AncestryRelation::TargetIsParent => self.link_parent(target, source),
            AncestryRelation::Siblings => {
                if let Some(node) = self.node_mut(source) {
                    node.siblings.insert(target);
                }
                if let Some(node) = self.node_mut(target) {
                    node.siblings.insert(source);
                }
                true
            }
        }
    }

    fn link_parent(&mut self, parent: NodeId, child: NodeId) -> bool {
        match self.node_mut(child) {
            Some(node) => {
                if node.has_parent() {
                    return false;
                }
                node.set_parent(parent);
            }
            None => return false,
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.insert(child);
        }
        true
    }

    /// Undo a previously established ancestry relation.
    fn remove_ancestry(
        &mut self,
        source: NodeId,
        target: NodeId,
        source_key: &LayerKey,
        target_key: &LayerKey,
    ) {
        match ancestry::classify(source_key, target_key) {
            AncestryRelation::SourceIsParent => self.unlink_parent(source, target),
            AncestryRelation::TargetIsParent => self.unlink_parent(target, source),
            AncestryRelation::Siblings => {
                if let Some(node) = self.node_mut(source) {
                    node.siblings.remove(&target);
                }
                if let Some(node) = self.node_mut(target) {
                    node.siblings.remove(&source);
                }
            }
        }
    }

    fn unlink_parent(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.node_mut(child) {
            node.clear_parent();
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.remove(&child);
        }
    }

    fn remove_interlayer_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        source_key: &LayerKey,
        target_key: &LayerKey,
    ) {
        self.remove_ancestry(source, target, source_key, target_key);
        self.interlayer_container_mut(source_key, target_key)
            .remove(source, target);
    }

    fn remove_interlayer_edge_between(&mut self, source: NodeId, target: NodeId) {
        let (Some(source_key), Some(target_key)) = (
            self.node_index.get(&source).copied(),
            self.node_index.get(&target).copied(),
        ) else {
            return;
        };
        self.remove_interlayer_edge(source, target, &source_key, &target_key);
    }

    /// Move an interlayer edge to a new endpoint pair (used by node merges).
    ///
    /// When the new pair already has an edge, the old edge is simply dropped.
    /// Otherwise the old ancestry relation is removed, the new one is added,
    /// and the edge payload migrates to the container selected by the new
    /// endpoints' dynamic flags. A re-parenting conflict at the new endpoints
    /// drops the edge instead of storing it without ancestry.
    fn rewire_interlayer_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        new_source: NodeId,
        new_target: NodeId,
    ) {
        if source == new_source && target == new_target {
            return;
        }

        let (Some(source_key), Some(target_key)) = (
            self.node_index.get(&source).copied(),
            self.node_index.get(&target).copied(),
        ) else {
            return;
        };
        let (Some(new_source_key), Some(new_target_key)) = (
            self.node_index.get(&new_source).copied(),
            self.node_index.get(&new_target).copied(),
        ) else {
            return;
        };

        if self.edge_exists(new_source, new_target, &new_source_key, &new_target_key) {
            self.remove_interlayer_edge(source, target, &source_key, &target_key);
            return;
        }

        self.remove_ancestry(source, target, &source_key, &target_key);
        let Some(old_edge) = self
            .interlayer_container_mut(&source_key, &target_key)
            .remove(source, target)
        else {
            return;
        };

        if !self.add_ancestry(new_source, new_target, &new_source_key, &new_target_key) {
            return;
        }

        self.interlayer_container_mut(&new_source_key, &new_target_key)
            .insert(new_source, new_target, old_edge.attributes);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::attributes::BasicNodeAttributes;

    fn attrs() -> Box<dyn NodeAttributes> {
        Box::new(BasicNodeAttributes::default())
    }

    fn attrs_at(x: f32) -> Box<dyn NodeAttributes> {
        Box::new(BasicNodeAttributes::new(Point3::new(x, 0.0, 0.0)))
    }

    fn graph() -> SceneGraph {
        SceneGraph::with_default_layers(layers::MESH).unwrap()
    }

    fn prefix() -> LayerPrefix {
        LayerPrefix::new('a')
    }

    fn line_mesh(num_vertices: usize) -> Mesh {
        let vertices = (0..num_vertices)
            .map(|i| Point3::new(i as f32, 0.0, 0.0))
            .collect();
        Mesh::new(vertices, Vec::new())
    }

    // ── construction ────────────────────────────────────────────────────────

    #[test]
    fn construction_requires_layers() {
        assert_eq!(
            SceneGraph::new(Vec::new(), layers::MESH).err(),
            Some(GraphError::EmptyLayerConfig)
        );
    }

    #[test]
    fn mesh_layer_must_not_collide() {
        assert_eq!(
            SceneGraph::new(vec![layers::OBJECTS], layers::OBJECTS).err(),
            Some(GraphError::MeshLayerConflict(layers::OBJECTS))
        );
    }

    #[test]
    fn new_graph_is_configured_but_empty() {
        let g = graph();
        assert!(g.is_empty());
        assert!(g.has_layer(layers::OBJECTS));
        assert!(g.has_layer(layers::BUILDINGS));
        assert!(!g.has_layer(LayerId(42)));
        assert_eq!(g.num_layers(), 5); // four static + mesh
        assert_eq!(g.num_edges(), 0);
    }

    // ── node operations ─────────────────────────────────────────────────────

    #[test]
    fn emplace_rejects_unknown_layer_and_duplicate_id() {
        let mut g = graph();
        assert!(!g.emplace_node(LayerId(42), 1, attrs()));
        assert!(g.emplace_node(layers::OBJECTS, 1, attrs()));
        // Same id in another layer is still a duplicate.
        assert!(!g.emplace_node(layers::PLACES, 1, attrs()));
        assert_eq!(g.num_nodes(), 1);
    }

    #[test]
    fn insert_node_registers_in_index() {
        let mut g = graph();
        let node = SceneGraphNode::new(7, layers::ROOMS, attrs());
        assert!(g.insert_node(node));
        assert_eq!(
            g.get_layer_for_node(7),
            Some(LayerKey::static_layer(layers::ROOMS))
        );

        let duplicate = SceneGraphNode::new(7, layers::ROOMS, attrs());
        assert!(!g.insert_node(duplicate));
    }

    #[test]
    fn insert_then_remove_restores_pristine_state() {
        let mut g = graph();
        g.set_mesh(Some(line_mesh(3)), false);
        assert!(g.emplace_node(layers::OBJECTS, 1, attrs()));
        assert!(g.emplace_node(layers::PLACES, 2, attrs()));
        assert!(g.insert_edge_default(2, 1));
        assert!(g.insert_mesh_edge(1, 0, false));

        assert!(g.remove_node(1));

        assert!(!g.has_node(1));
        assert!(g.get_layer_for_node(1).is_none());
        assert!(g.get_mesh_connection_indices(1).is_empty());
        assert!(g.get_node(2).unwrap().children().is_empty());
        // Only the place node and the mesh vertices remain.
        assert_eq!(g.num_nodes(), 1 + 3);
        assert_eq!(g.num_edges(), 0);
    }

    #[test]
    fn get_position_reads_attributes_or_faults() {
        let mut g = graph();
        g.emplace_node(layers::OBJECTS, 1, attrs_at(4.0));

        let pos = g.get_position(1).unwrap();
        assert!((pos.x - 4.0).abs() < 1e-5);
        assert_eq!(
            g.get_position(99).err(),
            Some(GraphError::MissingNode("99".to_string()))
        );
    }

    // ── ancestry and interlayer edges ───────────────────────────────────────

    #[test]
    fn coarser_endpoint_becomes_parent() {
        let mut g = graph();
        g.emplace_node(layers::OBJECTS, 1, attrs());
        g.emplace_node(layers::PLACES, 2, attrs());

        assert!(g.insert_edge_default(2, 1));
        assert_eq!(g.get_node(1).unwrap().parent(), Some(2));
        assert!(g.get_node(2).unwrap().children().contains(&1));
        // Direction of the call does not matter, only the layer ordering.
        assert!(g.has_edge(1, 2));
    }

    #[test]
    fn second_parent_is_rejected_entirely() {
        let mut g = graph();
        g.emplace_node(layers::OBJECTS, 1, attrs());
        g.emplace_node(layers::PLACES, 2, attrs());
        g.emplace_node(layers::PLACES, 3, attrs());

        assert!(g.insert_edge_default(2, 1));
        assert!(!g.insert_edge_default(3, 1));

        assert_eq!(g.get_node(1).unwrap().parent(), Some(2));
        assert!(!g.has_edge(3, 1));
        assert!(g.get_node(3).unwrap().children().is_empty());
    }

    #[test]
    fn removing_parent_node_clears_child() {
        let mut g = graph();
        g.emplace_node(layers::OBJECTS, 1, attrs());
        g.emplace_node(layers::PLACES, 2, attrs());
        g.insert_edge_default(2, 1);

        assert!(g.remove_node(2));
        assert_eq!(g.get_node(1).unwrap().parent(), None);
        assert!(!g.has_edge(2, 1));
    }

    #[test]
    fn intra_layer_edges_stay_inside_the_layer() {
        let mut g = graph();
        g.emplace_node(layers::OBJECTS, 1, attrs());
        g.emplace_node(layers::OBJECTS, 2, attrs());

        assert!(g.insert_edge_default(1, 2));
        assert_eq!(g.get_layer(layers::OBJECTS).unwrap().num_edges(), 1);
        assert!(g.interlayer_edges.is_empty());
        assert!(g.dynamic_interlayer_edges.is_empty());
        // No ancestry for an intra-layer edge.
        assert!(g.get_node(1).unwrap().siblings().is_empty());
    }

    #[test]
    fn same_level_interlayer_edge_is_a_symmetric_sibling() {
        let mut g = graph();
        g.emplace_node(layers::OBJECTS, 1, attrs());
        assert!(g.emplace_dynamic_node(layers::AGENTS, prefix(), Utc::now(), attrs(), false));
        let agent = prefix().make_id(0);

        assert!(g.insert_edge_default(1, agent));
        assert!(g.get_node(1).unwrap().siblings().contains(&agent));
        assert!(g.get_node(agent).unwrap().siblings().contains(&1));
        // One dynamic endpoint routes the edge to the dynamic interlayer set.
        assert_eq!(g.dynamic_interlayer_edges.len(), 1);
        assert!(g.interlayer_edges.is_empty());

        assert!(g.remove_edge(agent, 1));
        assert!(g.get_node(1).unwrap().siblings().is_empty());
        assert!(g.get_node(agent).unwrap().siblings().is_empty());
    }

    #[test]
    fn edges_with_unknown_endpoints_fail() {
        let mut g = graph();
        g.emplace_node(layers::OBJECTS, 1, attrs());
        assert!(!g.insert_edge_default(1, 99));
        assert!(!g.has_edge(1, 99));
        assert!(!g.remove_edge(1, 99));
    }

    // ── dynamic layers ──────────────────────────────────────────────────────

    #[test]
    fn dynamic_chain_stays_inside_its_layer() {
        let mut g = graph();
        assert!(g.emplace_dynamic_node(layers::AGENTS, prefix(), Utc::now(), attrs(), false));
        assert!(g.emplace_dynamic_node(layers::AGENTS, prefix(), Utc::now(), attrs(), true));

        let first = prefix().make_id(0);
        let second = prefix().make_id(1);
        assert!(g.is_dynamic(first));
        assert!(g.has_edge(first, second));
        assert_eq!(
            g.get_dynamic_layer(layers::AGENTS, prefix()).unwrap().num_edges(),
            1
        );
        assert!(g.interlayer_edges.is_empty());
        assert!(g.dynamic_interlayer_edges.is_empty());
    }

    #[test]
    fn conflicting_prefix_is_rejected() {
        let mut g = graph();
        // A static node already occupies the id the prefix would mint next.
        assert!(g.emplace_node(layers::OBJECTS, prefix().make_id(0), attrs()));
        assert!(!g.emplace_dynamic_node(layers::AGENTS, prefix(), Utc::now(), attrs(), false));
        assert!(!g.has_dynamic_layer(layers::AGENTS, prefix()));
    }

    #[test]
    fn get_dynamic_node_ignores_static_nodes() {
        let mut g = graph();
        g.emplace_node(layers::OBJECTS, 1, attrs());
        g.emplace_dynamic_node(layers::AGENTS, prefix(), Utc::now(), attrs(), false);

        assert!(g.get_dynamic_node(1).is_none());
        assert!(g.get_dynamic_node(prefix().make_id(0)).is_some());
    }

    #[test]
    fn dynamic_layers_count_against_distinct_levels_only() {
        let mut g = graph();
        g.emplace_dynamic_node(layers::AGENTS, prefix(), Utc::now(), attrs(), false);
        // AGENTS shares the objects level, so no new level appears.
        assert_eq!(g.num_layers(), 5);
        assert_eq!(g.num_dynamic_layers(), 1);

        g.emplace_dynamic_node(LayerId(7), LayerPrefix::new('b'), Utc::now(), attrs(), false);
        assert_eq!(g.num_layers(), 6);
        assert_eq!(g.num_dynamic_layers_of_type(LayerId(7)), 1);
    }

    // ── mesh ────────────────────────────────────────────────────────────────

    #[test]
    fn mesh_edges_respect_bounds_unless_overridden() {
        let mut g = graph();
        g.emplace_node(layers::OBJECTS, 1, attrs());

        // No mesh yet.
        assert!(!g.insert_mesh_edge(1, 0, false));
        assert!(g.insert_mesh_edge(1, 0, true));

        g.set_mesh(Some(line_mesh(2)), false);
        assert!(!g.insert_mesh_edge(1, 5, false));
        assert!(g.insert_mesh_edge(1, 1, false));
        // Duplicate pair.
        assert!(!g.insert_mesh_edge(1, 1, false));
        // Unknown node.
        assert!(!g.insert_mesh_edge(99, 0, false));
    }

    #[test]
    fn mesh_edge_round_trip() {
        let mut g = graph();
        g.set_mesh(Some(line_mesh(4)), false);
        g.emplace_node(layers::OBJECTS, 1, attrs());

        assert!(g.insert_mesh_edge(1, 2, false));
        assert!(g.has_mesh_edge(1, 2));
        assert_eq!(g.get_mesh_connection_indices(1), vec![2]);

        assert!(g.remove_mesh_edge(1, 2));
        assert!(g.get_mesh_connection_indices(1).is_empty());
        assert!(!g.remove_mesh_edge(1, 2));
    }

    #[test]
    fn shrinking_mesh_purges_exactly_out_of_range_edges() {
        let mut g = graph();
        g.set_mesh(Some(line_mesh(5)), false);
        g.emplace_node(layers::OBJECTS, 1, attrs());
        g.insert_mesh_edge(1, 1, false);
        g.insert_mesh_edge(1, 4, false);

        g.set_mesh(Some(line_mesh(3)), false);
        assert!(g.has_mesh_edge(1, 1));
        assert!(!g.has_mesh_edge(1, 4));
    }

    #[test]
    fn replacing_mesh_with_invalidate_all_clears_everything() {
        let mut g = graph();
        g.set_mesh(Some(line_mesh(3)), false);
        g.emplace_node(layers::OBJECTS, 1, attrs());
        g.insert_mesh_edge(1, 0, false);

        g.set_mesh(Some(line_mesh(3)), true);
        assert!(!g.has_mesh_edge(1, 0));
    }

    #[test]
    fn dropping_the_mesh_clears_all_edges() {
        let mut g = graph();
        g.set_mesh(Some(line_mesh(3)), false);
        g.emplace_node(layers::OBJECTS, 1, attrs());
        g.insert_mesh_edge(1, 0, false);

        g.set_mesh(None, false);
        assert!(!g.has_mesh());
        assert!(!g.has_mesh_edge(1, 0));
        assert!(g.get_mesh_position(0).is_none());
    }

    #[test]
    fn mesh_layer_exists_only_while_a_mesh_is_set() {
        let mut g = graph();
        assert!(!g.has_layer(layers::MESH));
        g.set_mesh(Some(line_mesh(2)), false);
        assert!(g.has_layer(layers::MESH));
        // Mesh vertices count as the mesh layer's nodes.
        assert_eq!(g.num_nodes(), 2);
    }

    #[test]
    fn invalidate_mesh_vertex_unlinks_every_node() {
        let mut g = graph();
        g.set_mesh(Some(line_mesh(2)), false);
        g.emplace_node(layers::OBJECTS, 1, attrs());
        g.emplace_node(layers::OBJECTS, 2, attrs());
        g.insert_mesh_edge(1, 0, false);
        g.insert_mesh_edge(2, 0, false);

        g.invalidate_mesh_vertex(0);
        assert!(!g.has_mesh_edge(1, 0));
        assert!(!g.has_mesh_edge(2, 0));
    }

    #[test]
    fn mesh_position_lookup() {
        let mut g = graph();
        g.set_mesh(Some(line_mesh(2)), false);

        let pos = g.get_mesh_position(1).unwrap();
        assert!((pos.x - 1.0).abs() < 1e-5);
        assert!(g.get_mesh_position(5).is_none());
    }

    // ── change drains ───────────────────────────────────────────────────────

    #[test]
    fn node_drains_cover_all_layer_kinds() {
        let mut g = graph();
        g.emplace_node(layers::OBJECTS, 1, attrs());
        g.emplace_dynamic_node(layers::AGENTS, prefix(), Utc::now(), attrs(), false);

        let mut new = g.drain_new_nodes(true);
        new.sort_unstable();
        assert_eq!(new, vec![1, prefix().make_id(0)]);
        assert!(g.drain_new_nodes(true).is_empty());

        g.remove_node(1);
        assert_eq!(g.drain_removed_nodes(true), vec![1]);
        assert!(g.drain_removed_nodes(true).is_empty());
    }

    #[test]
    fn edge_drains_pull_from_layers_and_interlayer_sets() {
        let mut g = graph();
        g.emplace_node(layers::OBJECTS, 1, attrs());
        g.emplace_node(layers::OBJECTS, 2, attrs());
        g.emplace_node(layers::PLACES, 3, attrs());
        g.insert_edge_default(1, 2); // intra-layer
        g.insert_edge_default(3, 1); // interlayer

        let mut new = g.drain_new_edges(true);
        new.sort_unstable();
        assert_eq!(new, vec![EdgeKey::new(1, 2), EdgeKey::new(1, 3)]);

        g.remove_edge(3, 1);
        assert_eq!(g.drain_removed_edges(true), vec![EdgeKey::new(1, 3)]);
    }

    // ── clear ───────────────────────────────────────────────────────────────

    #[test]
    fn clear_returns_to_configured_empty_state() {
        let mut g = graph();
        g.set_mesh(Some(line_mesh(3)), false);
        g.emplace_node(layers::OBJECTS, 1, attrs());
        g.emplace_dynamic_node(layers::AGENTS, prefix(), Utc::now(), attrs(), false);
        g.insert_mesh_edge(1, 0, false);

        g.clear();

        assert!(g.is_empty());
        assert_eq!(g.num_edges(), 0);
        assert!(g.has_layer(layers::OBJECTS));
        assert!(!g.has_mesh());
        assert!(!g.has_dynamic_layer(layers::AGENTS, prefix()));
        assert!(g.drain_new_nodes(true).is_empty());
        assert!(g.drain_removed_nodes(true).is_empty());
    }

    // ── update_from_layer ───────────────────────────────────────────────────

    #[test]
    fn update_from_layer_moves_nodes_and_registers_them() {
        let mut g = graph();
        g.emplace_node(layers::PLACES, 1, attrs_at(0.0));

        let mut standalone = SceneGraphLayer::new(layers::PLACES);
        standalone.emplace_node(1, attrs_at(5.0));
        standalone.emplace_node(2, attrs());

        assert!(g.update_from_layer(standalone, None));
        assert!((g.get_position(1).unwrap().x - 5.0).abs() < 1e-5);
        assert!(g.has_node(2));
        assert_eq!(
            g.get_layer_for_node(2),
            Some(LayerKey::static_layer(layers::PLACES))
        );
    }

    #[test]
    fn update_from_layer_merges_supplied_edges() {
        let mut g = graph();
        let mut standalone = SceneGraphLayer::new(layers::PLACES);
        standalone.emplace_node(1, attrs());
        standalone.emplace_node(2, attrs());

        let edges = vec![SceneGraphEdge::new(
            1,
            2,
            Box::new(BasicEdgeAttributes::weighted(2.0)),
        )];
        assert!(g.update_from_layer(standalone, Some(edges)));
        assert!(g.has_edge(1, 2));
        assert!((g.get_edge(1, 2).unwrap().attributes.weight() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn update_from_unknown_layer_fails() {
        let mut g = graph();
        let standalone = SceneGraphLayer::new(LayerId(42));
        assert!(!g.update_from_layer(standalone, None));
    }

    // ── merge_graph ─────────────────────────────────────────────────────────

    fn producer_graph() -> SceneGraph {
        let mut other = graph();
        other.emplace_node(layers::OBJECTS, 1, attrs_at(1.0));
        other.emplace_node(layers::PLACES, 2, attrs());
        other.insert_edge_default(2, 1);
        other.emplace_dynamic_node(layers::AGENTS, prefix(), Utc::now(), attrs(), false);
        other.emplace_dynamic_node(layers::AGENTS, prefix(), Utc::now(), attrs(), true);
        other.insert_mesh_edge(1, 0, true);
        other
    }

    #[test]
    fn merge_graph_adopts_nodes_edges_and_ancestry() {
        let mut g = graph();
        let other = producer_graph();

        let config = GraphMergeConfig {
            allow_invalid_mesh: true,
            ..Default::default()
        };
        assert!(g.merge_graph(&other, &config));

        assert!(g.has_node(1));
        assert!(g.has_node(2));
        assert_eq!(g.get_node(1).unwrap().parent(), Some(2));
        assert!(g.has_edge(prefix().make_id(0), prefix().make_id(1)));
        assert!(g.has_mesh_edge(1, 0));
        assert_eq!(g.num_nodes(), other.num_nodes());
        assert_eq!(g.num_edges(), other.num_edges());
    }

    #[test]
    fn merge_graph_twice_is_idempotent_on_structure() {
        let mut g = graph();
        let other = producer_graph();
        let config = GraphMergeConfig {
            allow_invalid_mesh: true,
            ..Default::default()
        };

        g.merge_graph(&other, &config);
        let nodes_after_first = g.num_nodes();
        let edges_after_first = g.num_edges();

        g.merge_graph(&other, &config);
        assert_eq!(g.num_nodes(), nodes_after_first);
        assert_eq!(g.num_edges(), edges_after_first);
    }

    #[test]
    fn merge_graph_attribute_updates_reflect_latest_merge() {
        let mut g = graph();
        let mut other = graph();
        other.emplace_node(layers::OBJECTS, 1, attrs_at(1.0));
        g.merge_graph(&other, &GraphMergeConfig::default());
        assert!((g.get_position(1).unwrap().x - 1.0).abs() < 1e-5);

        // The producer moved the object.
        if let Some(node) = other.node_mut(1) {
            node.attributes = attrs_at(9.0);
        }
        g.merge_graph(&other, &GraphMergeConfig::default());
        assert!((g.get_position(1).unwrap().x - 9.0).abs() < 1e-5);
    }

    #[test]
    fn merge_graph_respects_per_layer_update_gate() {
        let mut g = graph();
        g.emplace_node(layers::OBJECTS, 1, attrs_at(0.0));
        let mut other = graph();
        other.emplace_node(layers::OBJECTS, 1, attrs_at(9.0));

        let config = GraphMergeConfig {
            update_layer_attributes: HashMap::from([(layers::OBJECTS, false)]),
            ..Default::default()
        };
        g.merge_graph(&other, &config);
        assert!((g.get_position(1).unwrap().x - 0.0).abs() < 1e-5);
    }

    #[test]
    fn merge_graph_applies_remote_removals() {
        let mut g = graph();
        let mut other = graph();
        other.emplace_node(layers::OBJECTS, 1, attrs());
        g.merge_graph(&other, &GraphMergeConfig::default());
        assert!(g.has_node(1));

        other.remove_node(1);
        g.merge_graph(&other, &GraphMergeConfig::default());
        assert!(!g.has_node(1));
    }

    #[test]
    fn merge_graph_clear_mesh_edges_drops_local_state_first() {
        let mut g = graph();
        g.set_mesh(Some(line_mesh(2)), false);
        g.emplace_node(layers::OBJECTS, 1, attrs());
        g.insert_mesh_edge(1, 0, false);

        let other = graph();
        let config = GraphMergeConfig {
            clear_mesh_edges: true,
            ..Default::default()
        };
        g.merge_graph(&other, &config);
        assert!(!g.has_mesh_edge(1, 0));
    }

    // ── merge_nodes ─────────────────────────────────────────────────────────

    #[test]
    fn merge_nodes_rewires_parent_to_survivor() {
        let mut g = graph();
        g.emplace_node(layers::OBJECTS, 1, attrs());
        g.emplace_node(layers::OBJECTS, 2, attrs());
        g.emplace_node(layers::PLACES, 3, attrs());
        g.insert_edge_default(3, 1);

        assert_eq!(g.merge_nodes(1, 2), Ok(true));
        assert!(!g.has_node(1));
        assert_eq!(g.get_node(2).unwrap().parent(), Some(3));
        assert!(g.has_edge(3, 2));
        assert!(g.get_node(3).unwrap().children().contains(&2));
        assert!(!g.get_node(3).unwrap().children().contains(&1));
    }

    #[test]
    fn merge_nodes_rewires_children_to_survivor() {
        let mut g = graph();
        g.emplace_node(layers::PLACES, 1, attrs());
        g.emplace_node(layers::PLACES, 2, attrs());
        g.emplace_node(layers::OBJECTS, 3, attrs());
        g.insert_edge_default(1, 3);

        assert_eq!(g.merge_nodes(1, 2), Ok(true));
        assert_eq!(g.get_node(3).unwrap().parent(), Some(2));
        assert!(g.has_edge(2, 3));
    }

    #[test]
    fn merge_nodes_with_conflicting_parents_drops_the_edge() {
        let mut g = graph();
        g.emplace_node(layers::OBJECTS, 1, attrs());
        g.emplace_node(layers::OBJECTS, 2, attrs());
        g.emplace_node(layers::PLACES, 3, attrs());
        g.emplace_node(layers::PLACES, 4, attrs());
        g.insert_edge_default(3, 1);
        g.insert_edge_default(4, 2);

        assert_eq!(g.merge_nodes(1, 2), Ok(true));
        // The survivor keeps its own parent; the old parent edge is gone.
        assert_eq!(g.get_node(2).unwrap().parent(), Some(4));
        assert!(!g.has_edge(3, 2));
        assert_eq!(g.interlayer_edges.len(), 1);
    }

    #[test]
    fn merge_nodes_rewires_sibling_edges() {
        let mut g = graph();
        g.emplace_node(layers::OBJECTS, 1, attrs());
        g.emplace_node(layers::OBJECTS, 2, attrs());
        g.emplace_dynamic_node(layers::AGENTS, prefix(), Utc::now(), attrs(), false);
        let agent = prefix().make_id(0);
        g.insert_edge_default(1, agent);

        assert_eq!(g.merge_nodes(1, 2), Ok(true));
        assert!(g.has_edge(2, agent));
        assert!(g.get_node(agent).unwrap().siblings().contains(&2));
        assert!(!g.get_node(agent).unwrap().siblings().contains(&1));
        // The migrated edge still lives in the dynamic interlayer set.
        assert_eq!(g.dynamic_interlayer_edges.len(), 1);
    }

    #[test]
    fn merge_nodes_rejects_cross_layer_and_missing_pairs() {
        let mut g = graph();
        g.emplace_node(layers::OBJECTS, 1, attrs());
        g.emplace_node(layers::PLACES, 2, attrs());

        assert_eq!(g.merge_nodes(1, 2), Ok(false));
        assert_eq!(g.merge_nodes(1, 1), Ok(false));
        assert_eq!(g.merge_nodes(1, 99), Ok(false));
    }

    #[test]
    fn merging_dynamic_nodes_is_an_explicit_error() {
        let mut g = graph();
        g.emplace_dynamic_node(layers::AGENTS, prefix(), Utc::now(), attrs(), false);
        g.emplace_dynamic_node(layers::AGENTS, prefix(), Utc::now(), attrs(), false);

        assert_eq!(
            g.merge_nodes(prefix().make_id(0), prefix().make_id(1)),
            Err(GraphError::DynamicNodeMerge)
        );
    }
}
