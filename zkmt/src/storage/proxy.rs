//! Prefixing proxy over a [`TrieStorage`].
//!
//! A proxy with prefix `p` maps every key it is given to `p ++ key` before handing it to the
//! inner storage, which lets an arbitrary number of logical tries (one global trie plus one
//! per-account sub-trie, say) coexist in one physical store. Proxies compose: wrapping a
//! proxy in another proxy nests the prefixes. Prefix uniqueness is the caller's precondition;
//! with non-overlapping prefixes, two proxies can never observe or corrupt each other's keys.

use super::{NearestLeaves, StorageError, TrieMeta, TrieStorage, WriteBatch, WriteOp};

use zkmt_core::leaf::FlattenedLeaf;

/// A [`TrieStorage`] view that namespaces all keys under an optional byte prefix.
pub struct WorldStateStorageProxy<S> {
    prefix: Option<Vec<u8>>,
    storage: S,
}

impl<S: TrieStorage> WorldStateStorageProxy<S> {
    /// A pass-through proxy: keys reach the inner storage unmodified.
    pub fn new(storage: S) -> Self {
        WorldStateStorageProxy {
            prefix: None,
            storage,
        }
    }

    /// A namespaced proxy: every key becomes `prefix ++ key`.
    pub fn with_prefix(prefix: Vec<u8>, storage: S) -> Self {
        WorldStateStorageProxy {
            prefix: Some(prefix),
            storage,
        }
    }

    fn prefixed(&self, key: &[u8]) -> Vec<u8> {
        match &self.prefix {
            Some(prefix) => {
                let mut out = Vec::with_capacity(prefix.len() + key.len());
                out.extend_from_slice(prefix);
                out.extend_from_slice(key);
                out
            }
            None => key.to_vec(),
        }
    }
}

impl<S: TrieStorage> TrieStorage for WorldStateStorageProxy<S> {
    fn flat_leaf(&self, key: &[u8]) -> Result<Option<FlattenedLeaf>, StorageError> {
        self.storage.flat_leaf(&self.prefixed(key))
    }

    fn nearest_leaves(&self, hashed_key: &[u8]) -> Result<Option<NearestLeaves>, StorageError> {
        // prefixing preserves order among keys sharing the prefix, and the sentinels pin the
        // scan inside the prefix region.
        self.storage.nearest_leaves(&self.prefixed(hashed_key))
    }

    fn trie_node(&self, location: &[u8], node_hash: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        self.storage
            .trie_node(&self.prefixed(location), &self.prefixed(node_hash))
    }

    fn trie_meta(&self, key: &[u8]) -> Result<Option<TrieMeta>, StorageError> {
        self.storage.trie_meta(&self.prefixed(key))
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let ops = batch
            .into_ops()
            .into_iter()
            .map(|op| match op {
                WriteOp::PutFlatLeaf { key, leaf } => WriteOp::PutFlatLeaf {
                    key: self.prefixed(&key),
                    leaf,
                },
                WriteOp::RemoveFlatLeaf { key } => WriteOp::RemoveFlatLeaf {
                    key: self.prefixed(&key),
                },
                WriteOp::PutTrieNode {
                    location,
                    node_hash,
                    encoded,
                } => WriteOp::PutTrieNode {
                    location: self.prefixed(&location),
                    node_hash: self.prefixed(&node_hash),
                    encoded,
                },
                WriteOp::SetTrieMeta { key, meta } => WriteOp::SetTrieMeta {
                    key: self.prefixed(&key),
                    meta,
                },
            })
            .collect();
        self.storage.apply(WriteBatch::from_ops(ops))
    }
}
