//! An authenticated key-value store backed by an indexed sparse merkle trie, emitting
//! machine-checkable proof traces for an external proving circuit.
//!
//! The trie commits to its contents with a 32-byte subroot. Every operation, reads included,
//! produces a [`Trace`] carrying exactly the openings and sibling proofs a verifier needs to
//! replay the operation against the pre- and post-state subroots, without access to the trie.
//!
//! ```rust,no_run
//! use zkmt::{Blake3Hasher, IndexedTrie, InMemoryStorage};
//!
//! # fn main() -> Result<(), zkmt::Error> {
//! let storage = InMemoryStorage::new();
//! let mut trie: IndexedTrie<_, Blake3Hasher> = IndexedTrie::open(storage)?;
//!
//! let trace = trie.insert(b"account", b"balance")?;
//! assert_eq!(trace.new_next_free_node, 1);
//!
//! let read = trie.read(b"account")?;
//! assert_eq!(read.value.as_deref(), Some(&b"balance"[..]));
//! # Ok(())
//! # }
//! ```
//!
//! Multiple logical tries can share one physical store through the
//! [`WorldStateStorageProxy`], which namespaces every key under a byte prefix.

pub mod storage;
pub mod trie;

mod error;

pub use crate::error::Error;
pub use crate::storage::{
    InMemoryStorage, NearestLeaves, StorageError, StorageUpdater, TrieMeta, TrieStorage,
    WorldStateStorageProxy, WriteBatch, WriteOp,
};
pub use crate::trie::{IndexedTrie, ReadResult};

pub use zkmt_core::hasher::{BinaryHash, BinaryHasher, NodeHasher, ValueHasher};
pub use zkmt_core::leaf::{FlattenedLeaf, LeafOpening, LEAF_OPENING_SIZE};
pub use zkmt_core::proof::{Proof, ProofVerificationError};
pub use zkmt_core::trace::{
    DeletionTrace, IncompleteTrace, InsertionTrace, ReadTrace, ReadZeroTrace, Trace, UpdateTrace,
};
pub use zkmt_core::trie::{
    HashedKey, LeafIndex, Node, NodeKind, HEAD_INDEX, TAIL_INDEX, TERMINATOR, TRIE_DEPTH,
};

#[cfg(feature = "blake3-hasher")]
pub use zkmt_core::hasher::Blake3Hasher;

#[cfg(feature = "sha2-hasher")]
pub use zkmt_core::hasher::Sha2Hasher;
