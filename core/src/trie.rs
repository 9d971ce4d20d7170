//! This module defines the types of an indexed sparse merkle trie, generalized over a 256 bit
//! hash function.
//!
//! The trie has a fixed depth of [`TRIE_DEPTH`] levels. A leaf's position is its
//! [`LeafIndex`], interpreted as a big-endian bit path from the root. Leaves are additionally
//! linked to their neighbors in [`HashedKey`] order through their [`LeafOpening`], which is what
//! makes succinct non-membership proofs possible.
//!
//! All nodes are 256 bits. There are three kinds of nodes.
//!   1. Internal nodes, which each have two children. The value of an internal node is
//!      given by hashing the concatenation of the two child nodes and setting the MSB to 0.
//!   2. Leaf nodes, which have zero children. The value of a leaf node is given by hashing
//!      the canonical encoding of its [`LeafOpening`] and setting the MSB to 1.
//!   3. [`TERMINATOR`] nodes, which have the special value of all 0s. A terminator stands in
//!      for an empty sub-trie at any height, as well as for a removed leaf slot.
//!
//! [`LeafOpening`]: crate::leaf::LeafOpening

use crate::hasher::NodeHasher;

use alloc::{vec, vec::Vec};

/// A node in the trie. In this schema, it is always 256 bits and is the hash of either a leaf
/// opening or an [`InternalData`], or zeroed if it's a [`TERMINATOR`].
///
/// [`Node`]s are labeled by the [`NodeHasher`] used to indicate whether they are leaves or
/// internal nodes. Typically, this is done by setting the MSB.
pub type Node = [u8; 32];

/// The hash of a caller-supplied key. Determines the leaf's position in the trie's sorted
/// linked-leaf order. Compared as fixed-width unsigned big-endian.
pub type HashedKey = [u8; 32];

/// The allocation-order identifier of a leaf slot, distinct from sorted order. Indices are
/// assigned monotonically at insertion time and never reused after deletion.
pub type LeafIndex = u64;

/// The number of levels between the root and the leaves.
pub const TRIE_DEPTH: usize = 40;

/// Position of the head sentinel leaf, bounding the key space from below.
///
/// The two sentinels occupy the topmost positions of the index space so that user leaves are
/// allocated from 0 upward without colliding with them.
pub const HEAD_INDEX: LeafIndex = (1 << TRIE_DEPTH) - 2;

/// Position of the tail sentinel leaf, bounding the key space from above.
pub const TAIL_INDEX: LeafIndex = (1 << TRIE_DEPTH) - 1;

/// The terminator hash is a special node hash value denoting an empty sub-tree or a removed
/// leaf slot. Concretely, when this appears at a given location in the trie, it implies that
/// no live leaf occupies that location.
pub const TERMINATOR: Node = [0u8; 32];

/// Whether the node hash indicates the node is a leaf.
pub fn is_leaf<H: NodeHasher>(hash: &Node) -> bool {
    H::node_kind(hash) == NodeKind::Leaf
}

/// Whether the node hash indicates the node is an internal node.
pub fn is_internal<H: NodeHasher>(hash: &Node) -> bool {
    H::node_kind(hash) == NodeKind::Internal
}

/// Whether the node holds the special empty-subtree value.
pub fn is_terminator<H: NodeHasher>(hash: &Node) -> bool {
    H::node_kind(hash) == NodeKind::Terminator
}

/// The kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A terminator node indicates an empty sub-trie or removed leaf slot.
    Terminator,
    /// A leaf node carries a leaf opening.
    Leaf,
    /// An internal node has two children.
    Internal,
}

impl NodeKind {
    /// Get the kind of the provided node.
    pub fn of<H: NodeHasher>(node: &Node) -> Self {
        H::node_kind(node)
    }
}

/// An error in decoding a fixed-width node or leaf encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MalformedEncoding(pub &'static str);

impl core::fmt::Display for MalformedEncoding {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "malformed encoding: {}", self.0)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MalformedEncoding {}

/// The data of an internal (branch) node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalData {
    /// The hash of the left child of this node.
    pub left: Node,
    /// The hash of the right child of this node.
    pub right: Node,
}

impl InternalData {
    /// The canonical stored form: `left || right`.
    pub fn encode(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.left);
        out[32..].copy_from_slice(&self.right);
        out
    }

    /// Decode a stored branch node. Fails on any length other than 64 bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, MalformedEncoding> {
        if bytes.len() != 64 {
            return Err(MalformedEncoding("branch node must be 64 bytes"));
        }
        let mut left = [0u8; 32];
        let mut right = [0u8; 32];
        left.copy_from_slice(&bytes[..32]);
        right.copy_from_slice(&bytes[32..]);
        Ok(InternalData { left, right })
    }
}

/// The bit of `index`'s path taken when descending from `depth` to `depth + 1`.
/// `false` selects the left child.
pub fn leaf_path_bit(index: LeafIndex, depth: usize) -> bool {
    (index >> (TRIE_DEPTH - 1 - depth)) & 1 == 1
}

/// The storage location of the node at the given depth along `index`'s path: the first
/// `depth` path bits, one byte per bit. The root's location is empty.
pub fn node_location(index: LeafIndex, depth: usize) -> Vec<u8> {
    (0..depth).map(|d| leaf_path_bit(index, d) as u8).collect()
}

/// Hashes of the fully-empty sub-trie at every depth, indexed by depth. `hashes[TRIE_DEPTH]`
/// is the [`TERMINATOR`] and `hashes[0]` is the root of an empty trie. These nodes are never
/// stored; they are recomputed wherever a child hash matches the ladder.
pub fn empty_subtree_hashes<H: NodeHasher>() -> Vec<Node> {
    let mut hashes = vec![TERMINATOR; TRIE_DEPTH + 1];
    for depth in (0..TRIE_DEPTH).rev() {
        let child = hashes[depth + 1];
        hashes[depth] = H::hash_internal(&InternalData {
            left: child,
            right: child,
        });
    }
    hashes
}
