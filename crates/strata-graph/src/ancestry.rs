//! Interlayer relation classification.
//!
//! An edge between nodes in different layer instances is either a hierarchy
//! relation (the coarser endpoint becomes the parent) or a sibling relation
//! (no ordering between the two levels). The decision is pure — it depends
//! only on the two [`LayerKey`]s — and the graph root applies the resulting
//! mutations to the endpoint nodes through id-based lookups.

use strata_types::ids::LayerKey;

/// How an interlayer edge relates its two endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AncestryRelation {
    /// The source's layer is coarser: source becomes the target's parent.
    SourceIsParent,
    /// The target's layer is coarser: target becomes the source's parent.
    TargetIsParent,
    /// Neither level is coarser: a symmetric sibling relation.
    Siblings,
}

/// Classify the relation an edge between `source_key` and `target_key`
/// establishes.
///
/// Only the layer-level ordering participates; whether either key is dynamic
/// affects edge storage, not classification.
pub fn classify(source_key: &LayerKey, target_key: &LayerKey) -> AncestryRelation {
    if source_key.is_parent(target_key) {
        AncestryRelation::SourceIsParent
    } else if target_key.is_parent(source_key) {
        AncestryRelation::TargetIsParent
    } else {
        AncestryRelation::Siblings
    }
}
