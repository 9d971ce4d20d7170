//! The storage abstraction the trie engine runs against.
//!
//! A [`TrieStorage`] presents one logical key-value surface with three columns: flat leaves
//! (hashed key to [`FlattenedLeaf`]), trie nodes (location plus node hash to encoded node),
//! and per-trie metadata. The only write path is [`TrieStorage::apply`], which must be
//! atomic: either the whole [`WriteBatch`] becomes visible or none of it does. Writes are
//! collected through a [`StorageUpdater`] session and are not readable before its `commit`.
//!
//! Trie node deletion is deliberately not part of the surface. Superseded nodes are retained
//! so that old roots remain reconstructable; physical pruning is an external concern.

use zkmt_core::leaf::FlattenedLeaf;
use zkmt_core::trie::Node;

mod in_memory;
mod proxy;

pub use in_memory::InMemoryStorage;
pub use proxy::WorldStateStorageProxy;

/// Errors from the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The physical store failed to durably apply a batch. Nothing from the batch is visible.
    #[error("storage commit failed: {0}")]
    CommitFailed(String),
    /// A node referenced by the authenticated structure is absent from storage.
    #[error("missing trie node at location {location} with hash {node_hash}")]
    MissingNode {
        location: String,
        node_hash: String,
    },
    /// A stored entry contradicts the trie's invariants.
    #[error("corrupted storage: {0}")]
    Corrupted(String),
}

/// Persisted per-trie metadata. Lives in its own storage entry so that multiple trie
/// instances in one process never share an allocation counter accidentally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrieMeta {
    /// The current subroot.
    pub root: Node,
    /// The next leaf index to allocate.
    pub next_free_node: u64,
}

/// The two live leaves bracketing a hashed key, plus the exact match if one exists.
#[derive(Debug, Clone)]
pub struct NearestLeaves {
    /// The live leaf with the greatest hashed key at or below the target, excluding an exact
    /// match.
    pub left: FlattenedLeaf,
    /// The leaf at exactly the target hashed key, if live.
    pub center: Option<FlattenedLeaf>,
    /// The live leaf with the smallest hashed key above the target.
    pub right: FlattenedLeaf,
}

/// A single buffered write.
#[derive(Debug, Clone)]
pub enum WriteOp {
    PutFlatLeaf { key: Vec<u8>, leaf: FlattenedLeaf },
    RemoveFlatLeaf { key: Vec<u8> },
    PutTrieNode {
        location: Vec<u8>,
        node_hash: Vec<u8>,
        encoded: Vec<u8>,
    },
    SetTrieMeta { key: Vec<u8>, meta: TrieMeta },
}

/// An ordered collection of writes applied atomically by [`TrieStorage::apply`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    pub fn from_ops(ops: Vec<WriteOp>) -> Self {
        WriteBatch { ops }
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// The capability contract required of a physical store or of anything standing in front of
/// one (see [`WorldStateStorageProxy`]).
pub trait TrieStorage {
    /// Look up a flat-leaf entry by its (possibly prefixed) key.
    fn flat_leaf(&self, key: &[u8]) -> Result<Option<FlattenedLeaf>, StorageError>;

    /// Locate the flat leaves bracketing `hashed_key` in sorted order. Returns `None` when
    /// the column holds no bracketing entries, which for an initialized trie means the
    /// sentinels are missing.
    fn nearest_leaves(&self, hashed_key: &[u8]) -> Result<Option<NearestLeaves>, StorageError>;

    /// Look up an encoded trie node by (possibly prefixed) location and node hash.
    fn trie_node(&self, location: &[u8], node_hash: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Look up trie metadata by its (possibly prefixed) slot key. The engine uses the empty
    /// key; prefixes namespace it per logical trie.
    fn trie_meta(&self, key: &[u8]) -> Result<Option<TrieMeta>, StorageError>;

    /// Apply a batch atomically. A failure must leave nothing from the batch visible.
    fn apply(&self, batch: WriteBatch) -> Result<(), StorageError>;
}

impl<S: TrieStorage + ?Sized> TrieStorage for &S {
    fn flat_leaf(&self, key: &[u8]) -> Result<Option<FlattenedLeaf>, StorageError> {
        (**self).flat_leaf(key)
    }

    fn nearest_leaves(&self, hashed_key: &[u8]) -> Result<Option<NearestLeaves>, StorageError> {
        (**self).nearest_leaves(hashed_key)
    }

    fn trie_node(&self, location: &[u8], node_hash: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).trie_node(location, node_hash)
    }

    fn trie_meta(&self, key: &[u8]) -> Result<Option<TrieMeta>, StorageError> {
        (**self).trie_meta(key)
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), StorageError> {
        (**self).apply(batch)
    }
}

/// A mutation session. Collects all writes issued during one logical operation and applies
/// them with a single atomic [`commit`](StorageUpdater::commit). Dropping the updater
/// discards the batch.
pub struct StorageUpdater<'a, S: TrieStorage + ?Sized> {
    storage: &'a S,
    batch: WriteBatch,
}

impl<'a, S: TrieStorage + ?Sized> StorageUpdater<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        StorageUpdater {
            storage,
            batch: WriteBatch::default(),
        }
    }

    pub fn put_flat_leaf(&mut self, key: &[u8], leaf: FlattenedLeaf) {
        self.batch.push(WriteOp::PutFlatLeaf {
            key: key.to_vec(),
            leaf,
        });
    }

    pub fn remove_flat_leaf(&mut self, key: &[u8]) {
        self.batch.push(WriteOp::RemoveFlatLeaf { key: key.to_vec() });
    }

    pub fn put_trie_node(&mut self, location: &[u8], node_hash: &[u8], encoded: Vec<u8>) {
        self.batch.push(WriteOp::PutTrieNode {
            location: location.to_vec(),
            node_hash: node_hash.to_vec(),
            encoded,
        });
    }

    pub fn set_trie_meta(&mut self, meta: TrieMeta) {
        self.batch.push(WriteOp::SetTrieMeta {
            key: Vec::new(),
            meta,
        });
    }

    /// Apply every buffered write atomically.
    pub fn commit(self) -> Result<(), StorageError> {
        log::trace!("committing batch of {} writes", self.batch.len());
        self.storage.apply(self.batch)
    }
}
