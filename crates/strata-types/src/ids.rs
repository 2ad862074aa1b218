//! Node and layer identifiers.
//!
//! Every node in the graph is addressed by a globally unique [`NodeId`].
//! Nodes created in a dynamic (time-indexed, per-agent) layer use structured
//! ids: a [`LayerPrefix`] tag occupies the top byte and a monotonically
//! increasing sequence index occupies the low 56 bits. [`NodeSymbol`] is the
//! codec that unpacks either form for diagnostics. Static-layer ids carry no
//! structure requirement beyond uniqueness.
//!
//! # Example
//!
//! ```rust
//! use strata_types::ids::{LayerPrefix, NodeSymbol};
//!
//! let prefix = LayerPrefix::new('a');
//! let id = prefix.make_id(5);
//!
//! assert!(prefix.matches(id));
//! let symbol = NodeSymbol::from(id);
//! assert_eq!(symbol.category_id(), 5);
//! assert_eq!(symbol.label(), "a(5)");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Globally unique node identifier.
pub type NodeId = u64;

/// Number of low bits of a structured [`NodeId`] that hold the sequence index.
const INDEX_BITS: u32 = 56;

/// Mask selecting the sequence-index bits of a structured [`NodeId`].
const INDEX_MASK: u64 = (1u64 << INDEX_BITS) - 1;

// ─────────────────────────────────────────────────────────────────────────────
// LayerId
// ─────────────────────────────────────────────────────────────────────────────

/// Identifier of one abstraction level of the graph.
///
/// Larger ids are coarser: a layer whose id is greater than another's is an
/// ancestor level in the hierarchy (see [`LayerKey::is_parent`]).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct LayerId(pub u64);

/// Conventional layer ids used by the perception pipeline.
///
/// [`AGENTS`][layers::AGENTS] shares the object level: agent trajectories are
/// dynamic layers living at the same abstraction height as objects.
pub mod layers {
    use super::LayerId;

    /// Reserved id for the geometric mesh layer; never stored as a static
    /// layer.
    pub const MESH: LayerId = LayerId(1);
    /// Perceived object instances.
    pub const OBJECTS: LayerId = LayerId(2);
    /// Tracked agent trajectories (dynamic layers at the object level).
    pub const AGENTS: LayerId = LayerId(2);
    /// Topological places.
    pub const PLACES: LayerId = LayerId(3);
    /// Rooms.
    pub const ROOMS: LayerId = LayerId(4);
    /// Buildings.
    pub const BUILDINGS: LayerId = LayerId(5);
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            layers::MESH => write!(f, "mesh"),
            layers::OBJECTS => write!(f, "objects"),
            layers::PLACES => write!(f, "places"),
            layers::ROOMS => write!(f, "rooms"),
            layers::BUILDINGS => write!(f, "buildings"),
            LayerId(other) => write!(f, "layer {}", other),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LayerPrefix
// ─────────────────────────────────────────────────────────────────────────────

/// Tag distinguishing one dynamic-layer instance from its peers on the same
/// [`LayerId`] (e.g. one prefix per tracked agent).
///
/// The tag must be a single ASCII character; it occupies the top byte of
/// every [`NodeId`] minted through [`LayerPrefix::make_id`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct LayerPrefix(char);

impl LayerPrefix {
    /// Create a prefix from its tag character.
    pub fn new(tag: char) -> Self {
        debug_assert!(tag.is_ascii(), "layer prefix must be a single ASCII byte");
        Self(tag)
    }

    /// The tag character.
    pub fn tag(&self) -> char {
        self.0
    }

    /// Mint the [`NodeId`] for sequence index `index` within this instance.
    ///
    /// The index must fit in 56 bits; higher bits are discarded.
    pub fn make_id(&self, index: u64) -> NodeId {
        debug_assert!(index <= INDEX_MASK, "sequence index exceeds 56 bits");
        ((self.0 as u64) << INDEX_BITS) | (index & INDEX_MASK)
    }

    /// True when `id` carries this prefix in its top byte.
    pub fn matches(&self, id: NodeId) -> bool {
        (id >> INDEX_BITS) == self.0 as u64
    }
}

impl fmt::Display for LayerPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// NodeSymbol
// ─────────────────────────────────────────────────────────────────────────────

/// Codec view over a [`NodeId`].
///
/// Unpacks the prefix character and sequence index of structured ids and
/// renders the human-readable label used in diagnostics: `"a(5)"` for an id
/// minted by prefix `a`, or the plain number for unstructured ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeSymbol(NodeId);

impl NodeSymbol {
    /// Build the symbol for `tag` and `index` directly.
    pub fn from_parts(tag: char, index: u64) -> Self {
        Self(LayerPrefix::new(tag).make_id(index))
    }

    /// The raw node id.
    pub fn id(&self) -> NodeId {
        self.0
    }

    /// The prefix character, when the top byte holds a printable ASCII
    /// letter or digit.
    pub fn category(&self) -> Option<char> {
        let byte = (self.0 >> INDEX_BITS) as u8;
        let c = byte as char;
        c.is_ascii_alphanumeric().then_some(c)
    }

    /// The sequence index within the minting prefix (the low 56 bits).
    pub fn category_id(&self) -> u64 {
        self.0 & INDEX_MASK
    }

    /// Human-readable label, used only in diagnostics.
    pub fn label(&self) -> String {
        match self.category() {
            Some(tag) => format!("{}({})", tag, self.category_id()),
            None => format!("{}", self.0),
        }
    }
}

impl From<NodeId> for NodeSymbol {
    fn from(id: NodeId) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LayerKey
// ─────────────────────────────────────────────────────────────────────────────

/// Identifies which layer instance owns a node: a static layer (`prefix` is
/// `None`) or one dynamic-layer instance (`prefix` is `Some`).
///
/// A static key never equals a dynamic key, even on the same [`LayerId`]; the
/// graph uses that distinction to route edges between the per-layer and
/// interlayer containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerKey {
    /// The abstraction level.
    pub layer: LayerId,
    /// The dynamic-instance tag; `None` for static layers.
    pub prefix: Option<LayerPrefix>,
}

impl LayerKey {
    /// Key for a static layer.
    pub fn static_layer(layer: LayerId) -> Self {
        Self { layer, prefix: None }
    }

    /// Key for one dynamic-layer instance.
    pub fn dynamic_layer(layer: LayerId, prefix: LayerPrefix) -> Self {
        Self { layer, prefix: Some(prefix) }
    }

    /// True when this key names a dynamic-layer instance.
    pub fn is_dynamic(&self) -> bool {
        self.prefix.is_some()
    }

    /// True when this key's level is an ancestor level of `other`'s under the
    /// layer hierarchy (coarser layers carry larger ids).
    ///
    /// Only the level ordering matters here; whether either key is dynamic
    /// affects which interlayer container stores the edge, never the
    /// parent/child classification.
    pub fn is_parent(&self, other: &LayerKey) -> bool {
        self.layer > other.layer
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix {
            Some(prefix) => write!(f, "{}({})", self.layer, prefix),
            None => write!(f, "{}", self.layer),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── LayerPrefix / NodeSymbol codec ──────────────────────────────────────

    #[test]
    fn make_id_roundtrips_through_symbol() {
        let prefix = LayerPrefix::new('a');
        let id = prefix.make_id(42);

        let symbol = NodeSymbol::from(id);
        assert_eq!(symbol.category(), Some('a'));
        assert_eq!(symbol.category_id(), 42);
        assert_eq!(symbol.id(), id);
    }

    #[test]
    fn prefix_matches_only_its_own_ids() {
        let a = LayerPrefix::new('a');
        let b = LayerPrefix::new('b');

        let id = a.make_id(7);
        assert!(a.matches(id));
        assert!(!b.matches(id));
        assert!(!a.matches(7)); // unstructured id
    }

    #[test]
    fn label_renders_prefixed_and_plain_ids() {
        assert_eq!(NodeSymbol::from_parts('p', 3).label(), "p(3)");
        assert_eq!(NodeSymbol::from(17u64).label(), "17");
    }

    #[test]
    fn sequence_index_is_masked_to_56_bits() {
        let prefix = LayerPrefix::new('x');
        let id = prefix.make_id(5);
        assert_eq!(id & ((1u64 << 56) - 1), 5);
        assert!(prefix.matches(id));
    }

    // ── LayerId ─────────────────────────────────────────────────────────────

    #[test]
    fn layer_id_display_names_known_layers() {
        assert_eq!(layers::PLACES.to_string(), "places");
        assert_eq!(LayerId(42).to_string(), "layer 42");
    }

    #[test]
    fn agents_share_the_object_level() {
        assert_eq!(layers::AGENTS, layers::OBJECTS);
    }

    // ── LayerKey ────────────────────────────────────────────────────────────

    #[test]
    fn parent_ordering_follows_layer_ids() {
        let objects = LayerKey::static_layer(layers::OBJECTS);
        let places = LayerKey::static_layer(layers::PLACES);

        assert!(places.is_parent(&objects));
        assert!(!objects.is_parent(&places));
        assert!(!objects.is_parent(&objects));
    }

    #[test]
    fn dynamic_flag_does_not_affect_parent_ordering() {
        let agents = LayerKey::dynamic_layer(layers::AGENTS, LayerPrefix::new('a'));
        let places = LayerKey::static_layer(layers::PLACES);

        assert!(places.is_parent(&agents));
        assert!(!agents.is_parent(&places));
    }

    #[test]
    fn static_key_never_equals_dynamic_key() {
        let static_key = LayerKey::static_layer(layers::OBJECTS);
        let dynamic_key = LayerKey::dynamic_layer(layers::AGENTS, LayerPrefix::new('a'));

        assert_ne!(static_key, dynamic_key);
        assert_eq!(static_key, LayerKey::static_layer(layers::OBJECTS));
    }

    #[test]
    fn layer_key_serialization_roundtrip() {
        let key = LayerKey::dynamic_layer(layers::AGENTS, LayerPrefix::new('a'));
        let json = serde_json::to_string(&key).unwrap();
        let back: LayerKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, back);
    }
}
