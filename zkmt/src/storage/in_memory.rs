//! A reference in-memory physical store.
//!
//! Three columns behind one `RwLock`: flat leaves in a `BTreeMap` so neighbor queries are
//! ordered scans, trie nodes and metadata in hash maps. `apply` takes the write lock once
//! for the whole batch, which gives the required all-or-nothing visibility.

use super::{NearestLeaves, StorageError, TrieMeta, TrieStorage, WriteBatch, WriteOp};

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use zkmt_core::leaf::FlattenedLeaf;

#[derive(Default)]
struct Columns {
    flat_leaves: BTreeMap<Vec<u8>, FlattenedLeaf>,
    trie_nodes: HashMap<(Vec<u8>, Vec<u8>), Vec<u8>>,
    trie_meta: HashMap<Vec<u8>, TrieMeta>,
}

/// An in-memory [`TrieStorage`] for tests and light embedding.
#[derive(Default)]
pub struct InMemoryStorage {
    inner: RwLock<Columns>,
    fail_commits: AtomicBool,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `apply` fail before touching the columns, simulating a physical
    /// store that cannot durably commit.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::Relaxed);
    }

    /// Number of flat-leaf entries, sentinels included.
    pub fn flat_leaf_count(&self) -> usize {
        self.inner.read().flat_leaves.len()
    }
}

impl TrieStorage for InMemoryStorage {
    fn flat_leaf(&self, key: &[u8]) -> Result<Option<FlattenedLeaf>, StorageError> {
        Ok(self.inner.read().flat_leaves.get(key).cloned())
    }

    fn nearest_leaves(&self, hashed_key: &[u8]) -> Result<Option<NearestLeaves>, StorageError> {
        let guard = self.inner.read();
        let center = guard.flat_leaves.get(hashed_key).cloned();
        let left = guard
            .flat_leaves
            .range::<[u8], _>((Bound::Unbounded, Bound::Excluded(hashed_key)))
            .next_back()
            .map(|(_, leaf)| leaf.clone());
        let right = guard
            .flat_leaves
            .range::<[u8], _>((Bound::Excluded(hashed_key), Bound::Unbounded))
            .next()
            .map(|(_, leaf)| leaf.clone());
        Ok(match (left, right) {
            (Some(left), Some(right)) => Some(NearestLeaves {
                left,
                center,
                right,
            }),
            _ => None,
        })
    }

    fn trie_node(&self, location: &[u8], node_hash: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .inner
            .read()
            .trie_nodes
            .get(&(location.to_vec(), node_hash.to_vec()))
            .cloned())
    }

    fn trie_meta(&self, key: &[u8]) -> Result<Option<TrieMeta>, StorageError> {
        Ok(self.inner.read().trie_meta.get(key).cloned())
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), StorageError> {
        if self.fail_commits.load(Ordering::Relaxed) {
            return Err(StorageError::CommitFailed("simulated failure".into()));
        }
        let mut guard = self.inner.write();
        for op in batch.into_ops() {
            match op {
                WriteOp::PutFlatLeaf { key, leaf } => {
                    guard.flat_leaves.insert(key, leaf);
                }
                WriteOp::RemoveFlatLeaf { key } => {
                    guard.flat_leaves.remove(&key);
                }
                WriteOp::PutTrieNode {
                    location,
                    node_hash,
                    encoded,
                } => {
                    guard.trie_nodes.insert((location, node_hash), encoded);
                }
                WriteOp::SetTrieMeta { key, meta } => {
                    guard.trie_meta.insert(key, meta);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(index: u64) -> FlattenedLeaf {
        FlattenedLeaf {
            leaf_index: index,
            value: vec![index as u8],
        }
    }

    #[test]
    fn nearest_brackets_between_entries() {
        let storage = InMemoryStorage::new();
        let mut batch = WriteBatch::default();
        batch.push(WriteOp::PutFlatLeaf {
            key: vec![0x10],
            leaf: leaf(0),
        });
        batch.push(WriteOp::PutFlatLeaf {
            key: vec![0x30],
            leaf: leaf(1),
        });
        storage.apply(batch).unwrap();

        let nearest = storage.nearest_leaves(&[0x20]).unwrap().unwrap();
        assert_eq!(nearest.left.leaf_index, 0);
        assert!(nearest.center.is_none());
        assert_eq!(nearest.right.leaf_index, 1);
    }

    #[test]
    fn exact_hit_is_excluded_from_its_own_bracket() {
        let storage = InMemoryStorage::new();
        let mut batch = WriteBatch::default();
        for (key, index) in [(0x10u8, 0u64), (0x30, 1), (0x50, 2)] {
            batch.push(WriteOp::PutFlatLeaf {
                key: vec![key],
                leaf: leaf(index),
            });
        }
        storage.apply(batch).unwrap();

        let nearest = storage.nearest_leaves(&[0x30]).unwrap().unwrap();
        assert_eq!(nearest.left.leaf_index, 0);
        assert_eq!(nearest.center.as_ref().map(|l| l.leaf_index), Some(1));
        assert_eq!(nearest.right.leaf_index, 2);
    }

    #[test]
    fn nearest_requires_both_brackets() {
        let storage = InMemoryStorage::new();
        assert!(storage.nearest_leaves(&[0x20]).unwrap().is_none());

        let mut batch = WriteBatch::default();
        batch.push(WriteOp::PutFlatLeaf {
            key: vec![0x10],
            leaf: leaf(0),
        });
        storage.apply(batch).unwrap();
        // no entry above the target: still unbracketed.
        assert!(storage.nearest_leaves(&[0x20]).unwrap().is_none());
    }

    #[test]
    fn failed_apply_leaves_no_writes() {
        let storage = InMemoryStorage::new();
        storage.fail_commits(true);
        let mut batch = WriteBatch::default();
        batch.push(WriteOp::PutFlatLeaf {
            key: vec![0x10],
            leaf: leaf(0),
        });
        assert!(storage.apply(batch).is_err());
        assert_eq!(storage.flat_leaf(&[0x10]).unwrap(), None);
    }
}
