//! Leaf openings and the flat key-value index entry.
//!
//! A [`LeafOpening`] is the authenticated per-leaf record: besides the leaf's hashed key and
//! value hash, it carries the indices of the leaves immediately before and after it in hashed
//! key order, forming a doubly linked list over the sorted leaves. A [`FlattenedLeaf`] is the
//! unauthenticated flat-index entry that lets lookups skip the trie descent.

use crate::trie::{HashedKey, LeafIndex, MalformedEncoding, HEAD_INDEX, TAIL_INDEX};

use alloc::vec::Vec;

/// Size of the canonical leaf opening encoding in bytes.
pub const LEAF_OPENING_SIZE: usize = 80;

/// The authenticated record stored at each live leaf.
///
/// Invariant: for any live leaf `L`, `previous(L).hashed_key < L.hashed_key <
/// next(L).hashed_key`, with the two sentinel leaves bounding the key space. The links are
/// plain indices resolved through storage lookups, never owning references.
#[derive(Clone, PartialEq, Eq)]
pub struct LeafOpening {
    /// Index of the leaf with the greatest hashed key below this one.
    pub prev_leaf: LeafIndex,
    /// Index of the leaf with the smallest hashed key above this one.
    pub next_leaf: LeafIndex,
    /// The hash of the caller-supplied key stored in this leaf.
    pub hashed_key: HashedKey,
    /// The hash of the value stored in this leaf.
    pub value_hash: [u8; 32],
}

impl LeafOpening {
    /// The head sentinel: minimal hashed key, bounding the key space from below.
    pub const fn head() -> Self {
        LeafOpening {
            prev_leaf: HEAD_INDEX,
            next_leaf: TAIL_INDEX,
            hashed_key: [0x00; 32],
            value_hash: [0x00; 32],
        }
    }

    /// The tail sentinel: maximal hashed key, bounding the key space from above.
    pub const fn tail() -> Self {
        LeafOpening {
            prev_leaf: HEAD_INDEX,
            next_leaf: TAIL_INDEX,
            hashed_key: [0xff; 32],
            value_hash: [0x00; 32],
        }
    }

    /// The canonical 80-byte encoding: `prev_leaf || next_leaf || hashed_key || value_hash`,
    /// integers big-endian.
    pub fn to_bytes(&self) -> [u8; LEAF_OPENING_SIZE] {
        let mut out = [0u8; LEAF_OPENING_SIZE];
        out[0..8].copy_from_slice(&self.prev_leaf.to_be_bytes());
        out[8..16].copy_from_slice(&self.next_leaf.to_be_bytes());
        out[16..48].copy_from_slice(&self.hashed_key);
        out[48..80].copy_from_slice(&self.value_hash);
        out
    }

    /// Decode a canonical leaf opening encoding. Fails on any length other than
    /// [`LEAF_OPENING_SIZE`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MalformedEncoding> {
        if bytes.len() != LEAF_OPENING_SIZE {
            return Err(MalformedEncoding("leaf opening must be 80 bytes"));
        }
        let mut prev = [0u8; 8];
        let mut next = [0u8; 8];
        prev.copy_from_slice(&bytes[0..8]);
        next.copy_from_slice(&bytes[8..16]);
        let mut hashed_key = [0u8; 32];
        let mut value_hash = [0u8; 32];
        hashed_key.copy_from_slice(&bytes[16..48]);
        value_hash.copy_from_slice(&bytes[48..80]);
        Ok(LeafOpening {
            prev_leaf: u64::from_be_bytes(prev),
            next_leaf: u64::from_be_bytes(next),
            hashed_key,
            value_hash,
        })
    }
}

impl core::fmt::Debug for LeafOpening {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("LeafOpening")
            .field("prev_leaf", &self.prev_leaf)
            .field("next_leaf", &self.next_leaf)
            .field("hashed_key", &hex::encode(self.hashed_key))
            .field("value_hash", &hex::encode(self.value_hash))
            .finish()
    }
}

/// The flat-index entry mapping a hashed key to its leaf slot and raw value.
#[derive(Clone, PartialEq, Eq)]
pub struct FlattenedLeaf {
    /// The slot the leaf occupies in the trie.
    pub leaf_index: LeafIndex,
    /// The raw (unhashed) value.
    pub value: Vec<u8>,
}

impl FlattenedLeaf {
    /// The flat entry of the head sentinel.
    pub fn head() -> Self {
        FlattenedLeaf {
            leaf_index: HEAD_INDEX,
            value: Vec::new(),
        }
    }

    /// The flat entry of the tail sentinel.
    pub fn tail() -> Self {
        FlattenedLeaf {
            leaf_index: TAIL_INDEX,
            value: Vec::new(),
        }
    }

    /// Encode as an 8-byte big-endian index followed by the raw value bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.value.len());
        out.extend_from_slice(&self.leaf_index.to_be_bytes());
        out.extend_from_slice(&self.value);
        out
    }

    /// Decode a flat-index entry. Fails if the input cannot hold the index.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MalformedEncoding> {
        if bytes.len() < 8 {
            return Err(MalformedEncoding("flattened leaf shorter than its index"));
        }
        let mut index = [0u8; 8];
        index.copy_from_slice(&bytes[0..8]);
        Ok(FlattenedLeaf {
            leaf_index: u64::from_be_bytes(index),
            value: bytes[8..].to_vec(),
        })
    }
}

impl core::fmt::Debug for FlattenedLeaf {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("FlattenedLeaf")
            .field("leaf_index", &self.leaf_index)
            .field("value", &hex::encode(&self.value))
            .finish()
    }
}
