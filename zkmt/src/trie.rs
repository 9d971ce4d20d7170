//! The indexed trie engine.
//!
//! [`IndexedTrie`] maintains the sorted linked-leaf structure and its merkle commitment over
//! a [`TrieStorage`]. Each mutation is a single-threaded read-modify-write sequence: locate
//! the affected leaves through the flat index, rewrite their openings, rehash the changed
//! paths bottom-up, and stage every resulting write into one [`StorageUpdater`] session whose
//! `commit` is all-or-nothing. The engine's in-memory root and allocation counter are only
//! advanced after a successful commit, so a failed commit leaves the last known-good state.
//!
//! Mutations take `&mut self`, which enforces the single-writer discipline per logical trie;
//! reads take `&self` and may run concurrently against the committed root.

use crate::error::Error;
use crate::storage::{NearestLeaves, StorageError, StorageUpdater, TrieMeta, TrieStorage};

use std::collections::HashMap;
use std::marker::PhantomData;

use zkmt_core::hasher::{NodeHasher, ValueHasher};
use zkmt_core::leaf::{FlattenedLeaf, LeafOpening};
use zkmt_core::proof::Proof;
use zkmt_core::trace::{
    DeletionTrace, InsertionTrace, ReadTrace, ReadZeroTrace, Trace, UpdateTrace,
};
use zkmt_core::trie::{
    self, HashedKey, InternalData, LeafIndex, Node, HEAD_INDEX, TAIL_INDEX, TERMINATOR,
    TRIE_DEPTH,
};

/// The outcome of [`IndexedTrie::read`]: the value if the key is live, and in every case a
/// trace proving the outcome against the current subroot.
#[derive(Debug, Clone)]
pub struct ReadResult {
    /// The raw value, or `None` for a zero-read.
    pub value: Option<Vec<u8>>,
    /// A [`Trace::Read`] or [`Trace::ReadZero`].
    pub trace: Trace,
}

/// An authenticated key-value trie over a storage backend, generic over the node hasher.
pub struct IndexedTrie<S, H> {
    storage: S,
    root: Node,
    next_free_node: LeafIndex,
    empty_hashes: Vec<Node>,
    _hasher: PhantomData<H>,
}

impl<S: TrieStorage, H: NodeHasher + ValueHasher> IndexedTrie<S, H> {
    /// Open the trie stored behind `storage`, initializing an empty trie (sentinel leaves
    /// plus metadata) on first use.
    pub fn open(storage: S) -> Result<Self, Error> {
        let empty_hashes = trie::empty_subtree_hashes::<H>();
        let meta = storage.trie_meta(&[])?;
        let mut trie = IndexedTrie {
            root: empty_hashes[0],
            next_free_node: 0,
            storage,
            empty_hashes,
            _hasher: PhantomData,
        };
        match meta {
            Some(meta) => {
                trie.root = meta.root;
                trie.next_free_node = meta.next_free_node;
            }
            None => trie.initialize()?,
        }
        Ok(trie)
    }

    /// The current subroot.
    pub fn sub_root(&self) -> Node {
        self.root
    }

    /// The next leaf index to be allocated.
    pub fn next_free_node(&self) -> LeafIndex {
        self.next_free_node
    }

    /// Whether the trie holds no live leaves besides the sentinels.
    pub fn is_empty(&self) -> bool {
        self.next_free_node == 0
    }

    /// The underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn initialize(&mut self) -> Result<(), Error> {
        let mut updater = StorageUpdater::new(&self.storage);
        let mut walker = PathWalker::new(&self.storage, self.root, &self.empty_hashes);
        walker.write_leaf::<H>(HEAD_INDEX, Some(&LeafOpening::head()), &mut updater)?;
        walker.write_leaf::<H>(TAIL_INDEX, Some(&LeafOpening::tail()), &mut updater)?;
        updater.put_flat_leaf(&LeafOpening::head().hashed_key, FlattenedLeaf::head());
        updater.put_flat_leaf(&LeafOpening::tail().hashed_key, FlattenedLeaf::tail());
        let root = walker.root();
        updater.set_trie_meta(TrieMeta {
            root,
            next_free_node: 0,
        });
        updater.commit()?;
        self.root = root;
        log::debug!("initialized empty trie, sub-root {}", hex::encode(root));
        Ok(())
    }

    /// Read a key. A missing key is a successful zero-read, never an error.
    pub fn read(&self, key: &[u8]) -> Result<ReadResult, Error> {
        let hashed_key = H::hash_value(key);
        self.check_sentinel_keys(&hashed_key)?;
        let nearest = self.nearest(&hashed_key)?;
        let walker = PathWalker::new(&self.storage, self.root, &self.empty_hashes);

        match nearest.center {
            Some(flat) => {
                let leaf = self.expect_opening(&walker, flat.leaf_index)?;
                let proof = walker.prove(flat.leaf_index)?;
                let trace = ReadTrace {
                    next_free_node: self.next_free_node,
                    sub_root: self.root,
                    leaf,
                    proof,
                    key: key.to_vec(),
                    value: flat.value.clone(),
                };
                Ok(ReadResult {
                    value: Some(flat.value),
                    trace: Trace::Read(trace),
                })
            }
            None => {
                let left_leaf = self.expect_opening(&walker, nearest.left.leaf_index)?;
                let right_leaf = self.expect_opening(&walker, nearest.right.leaf_index)?;
                let left_proof = walker.prove(nearest.left.leaf_index)?;
                let right_proof = walker.prove(nearest.right.leaf_index)?;
                let trace = ReadZeroTrace::builder(self.root)
                    .next_free_node(self.next_free_node)
                    .leaves(left_leaf, right_leaf)
                    .proofs(left_proof, right_proof)
                    .key(key.to_vec())
                    .build()?;
                Ok(ReadResult {
                    value: None,
                    trace: Trace::ReadZero(trace),
                })
            }
        }
    }

    /// Insert a new key. Fails with [`Error::KeyAlreadyExists`] on a live key.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<InsertionTrace, Error> {
        let hashed_key = H::hash_value(key);
        self.check_sentinel_keys(&hashed_key)?;
        let nearest = self.nearest(&hashed_key)?;
        if nearest.center.is_some() {
            return Err(Error::KeyAlreadyExists);
        }
        let left_index = nearest.left.leaf_index;
        let right_index = nearest.right.leaf_index;

        let mut updater = StorageUpdater::new(&self.storage);
        let mut walker = PathWalker::new(&self.storage, self.root, &self.empty_hashes);

        let prior_left = self.expect_opening(&walker, left_index)?;
        let prior_right = self.expect_opening(&walker, right_index)?;
        self.check_bracket(&prior_left, &hashed_key, &prior_right)?;

        let builder = InsertionTrace::builder(self.root);
        let new_index = self.next_free_node;

        let left_proof = walker.write_leaf::<H>(
            left_index,
            Some(&LeafOpening {
                next_leaf: new_index,
                ..prior_left.clone()
            }),
            &mut updater,
        )?;
        let new_proof = walker.write_leaf::<H>(
            new_index,
            Some(&LeafOpening {
                prev_leaf: left_index,
                next_leaf: right_index,
                hashed_key,
                value_hash: H::hash_value(value),
            }),
            &mut updater,
        )?;
        let right_proof = walker.write_leaf::<H>(
            right_index,
            Some(&LeafOpening {
                prev_leaf: new_index,
                ..prior_right.clone()
            }),
            &mut updater,
        )?;

        updater.put_flat_leaf(
            &hashed_key,
            FlattenedLeaf {
                leaf_index: new_index,
                value: value.to_vec(),
            },
        );
        let new_root = walker.root();
        let new_next_free_node = new_index + 1;
        updater.set_trie_meta(TrieMeta {
            root: new_root,
            next_free_node: new_next_free_node,
        });
        updater.commit()?;
        self.root = new_root;
        self.next_free_node = new_next_free_node;

        Ok(builder
            .new_next_free_node(new_next_free_node)
            .new_sub_root(new_root)
            .proofs(left_proof, new_proof, right_proof)
            .key_value(key.to_vec(), value.to_vec())
            .prior_leaves(prior_left, prior_right)
            .build()?)
    }

    /// Replace the value of a live key. Fails with [`Error::KeyNotFound`] if absent.
    pub fn update(&mut self, key: &[u8], new_value: &[u8]) -> Result<UpdateTrace, Error> {
        let hashed_key = H::hash_value(key);
        self.check_sentinel_keys(&hashed_key)?;
        let nearest = self.nearest(&hashed_key)?;
        let flat = nearest.center.ok_or(Error::KeyNotFound)?;

        let mut updater = StorageUpdater::new(&self.storage);
        let mut walker = PathWalker::new(&self.storage, self.root, &self.empty_hashes);

        let prior = self.expect_opening(&walker, flat.leaf_index)?;
        let builder = UpdateTrace::builder(self.root);

        let proof = walker.write_leaf::<H>(
            flat.leaf_index,
            Some(&LeafOpening {
                value_hash: H::hash_value(new_value),
                ..prior.clone()
            }),
            &mut updater,
        )?;
        updater.put_flat_leaf(
            &hashed_key,
            FlattenedLeaf {
                leaf_index: flat.leaf_index,
                value: new_value.to_vec(),
            },
        );
        let new_root = walker.root();
        updater.set_trie_meta(TrieMeta {
            root: new_root,
            next_free_node: self.next_free_node,
        });
        updater.commit()?;
        self.root = new_root;

        Ok(builder
            .new_next_free_node(self.next_free_node)
            .new_sub_root(new_root)
            .proof(proof)
            .key(key.to_vec())
            .values(flat.value, new_value.to_vec())
            .prior_leaf(prior)
            .build()?)
    }

    /// Delete a live key, splicing its neighbors back together. The slot is marked removed
    /// and its index is never reassigned. Fails with [`Error::KeyNotFound`] if absent.
    pub fn remove(&mut self, key: &[u8]) -> Result<DeletionTrace, Error> {
        let hashed_key = H::hash_value(key);
        self.check_sentinel_keys(&hashed_key)?;
        let nearest = self.nearest(&hashed_key)?;
        let flat = nearest.center.ok_or(Error::KeyNotFound)?;
        let left_index = nearest.left.leaf_index;
        let right_index = nearest.right.leaf_index;

        let mut updater = StorageUpdater::new(&self.storage);
        let mut walker = PathWalker::new(&self.storage, self.root, &self.empty_hashes);

        let prior_left = self.expect_opening(&walker, left_index)?;
        let prior_deleted = self.expect_opening(&walker, flat.leaf_index)?;
        let prior_right = self.expect_opening(&walker, right_index)?;

        let builder = DeletionTrace::builder(self.root);

        let left_proof = walker.write_leaf::<H>(
            left_index,
            Some(&LeafOpening {
                next_leaf: right_index,
                ..prior_left.clone()
            }),
            &mut updater,
        )?;
        let deleted_proof = walker.write_leaf::<H>(flat.leaf_index, None, &mut updater)?;
        let right_proof = walker.write_leaf::<H>(
            right_index,
            Some(&LeafOpening {
                prev_leaf: left_index,
                ..prior_right.clone()
            }),
            &mut updater,
        )?;

        updater.remove_flat_leaf(&hashed_key);
        let new_root = walker.root();
        updater.set_trie_meta(TrieMeta {
            root: new_root,
            next_free_node: self.next_free_node,
        });
        updater.commit()?;
        self.root = new_root;

        Ok(builder
            .new_next_free_node(self.next_free_node)
            .new_sub_root(new_root)
            .proofs(left_proof, deleted_proof, right_proof)
            .key(key.to_vec())
            .prior_leaves(prior_left, prior_deleted, prior_right)
            .build()?)
    }

    fn nearest(&self, hashed_key: &HashedKey) -> Result<NearestLeaves, Error> {
        self.storage
            .nearest_leaves(hashed_key)?
            .ok_or_else(|| {
                Error::Storage(StorageError::Corrupted(
                    "trie sentinels missing from flat index".into(),
                ))
            })
    }

    fn expect_opening(
        &self,
        walker: &PathWalker<'_, S>,
        leaf_index: LeafIndex,
    ) -> Result<LeafOpening, Error> {
        walker.read_opening::<H>(leaf_index)?.ok_or_else(|| {
            Error::Storage(StorageError::Corrupted(format!(
                "flat index references empty leaf slot {leaf_index}"
            )))
        })
    }

    // A key hashing onto a sentinel cannot be represented; treat it as the collision it is.
    fn check_sentinel_keys(&self, hashed_key: &HashedKey) -> Result<(), Error> {
        if *hashed_key == LeafOpening::head().hashed_key
            || *hashed_key == LeafOpening::tail().hashed_key
        {
            return Err(Error::HashCollision(hex::encode(hashed_key)));
        }
        Ok(())
    }

    fn check_bracket(
        &self,
        left: &LeafOpening,
        hashed_key: &HashedKey,
        right: &LeafOpening,
    ) -> Result<(), Error> {
        if left.hashed_key == *hashed_key || right.hashed_key == *hashed_key {
            return Err(Error::HashCollision(hex::encode(hashed_key)));
        }
        if left.hashed_key > *hashed_key || right.hashed_key < *hashed_key {
            return Err(Error::Storage(StorageError::Corrupted(
                "flat index neighbors do not bracket the hashed key".into(),
            )));
        }
        Ok(())
    }
}

/// Walks leaf paths against storage, layering the current mutation's uncommitted node writes
/// over it so that successive path walks within one operation observe each other.
struct PathWalker<'a, S> {
    storage: &'a S,
    root: Node,
    empty_hashes: &'a [Node],
    overlay: HashMap<(Vec<u8>, Node), Vec<u8>>,
}

struct WalkedPath {
    leaf_hash: Node,
    leaf_location: Vec<u8>,
    // one sibling per level, ordered from the root down.
    siblings: Vec<Node>,
}

impl<'a, S: TrieStorage> PathWalker<'a, S> {
    fn new(storage: &'a S, root: Node, empty_hashes: &'a [Node]) -> Self {
        PathWalker {
            storage,
            root,
            empty_hashes,
            overlay: HashMap::new(),
        }
    }

    fn root(&self) -> Node {
        self.root
    }

    /// Fetch a node's stored bytes. `None` when the hash is the empty-subtree default for
    /// this depth, i.e. the node was never stored.
    fn node_bytes(
        &self,
        location: &[u8],
        node_hash: &Node,
        depth: usize,
    ) -> Result<Option<Vec<u8>>, Error> {
        if *node_hash == self.empty_hashes[depth] {
            return Ok(None);
        }
        if let Some(bytes) = self.overlay.get(&(location.to_vec(), *node_hash)) {
            return Ok(Some(bytes.clone()));
        }
        match self.storage.trie_node(location, node_hash)? {
            Some(bytes) => Ok(Some(bytes)),
            None => Err(Error::Storage(StorageError::MissingNode {
                location: hex::encode(location),
                node_hash: hex::encode(node_hash),
            })),
        }
    }

    fn walk(&self, leaf_index: LeafIndex) -> Result<WalkedPath, Error> {
        let mut location = Vec::with_capacity(TRIE_DEPTH);
        let mut current = self.root;
        let mut siblings = Vec::with_capacity(TRIE_DEPTH);
        for depth in 0..TRIE_DEPTH {
            let branch = match self.node_bytes(&location, &current, depth)? {
                Some(bytes) => InternalData::decode(&bytes)?,
                None => InternalData {
                    left: self.empty_hashes[depth + 1],
                    right: self.empty_hashes[depth + 1],
                },
            };
            if trie::leaf_path_bit(leaf_index, depth) {
                siblings.push(branch.left);
                current = branch.right;
                location.push(1);
            } else {
                siblings.push(branch.right);
                current = branch.left;
                location.push(0);
            }
        }
        Ok(WalkedPath {
            leaf_hash: current,
            leaf_location: location,
            siblings,
        })
    }

    /// The opening stored at a leaf slot, or `None` if the slot is empty or removed.
    fn read_opening<H: NodeHasher>(
        &self,
        leaf_index: LeafIndex,
    ) -> Result<Option<LeafOpening>, Error> {
        let walked = self.walk(leaf_index)?;
        if walked.leaf_hash == TERMINATOR {
            return Ok(None);
        }
        let bytes = self
            .node_bytes(&walked.leaf_location, &walked.leaf_hash, TRIE_DEPTH)?
            .ok_or_else(|| {
                Error::Storage(StorageError::Corrupted(format!(
                    "leaf slot {leaf_index} hashes to the empty default"
                )))
            })?;
        let opening = LeafOpening::from_bytes(&bytes)?;
        if H::hash_leaf(&opening) != walked.leaf_hash {
            return Err(Error::Storage(StorageError::Corrupted(format!(
                "leaf slot {leaf_index} does not hash to its stored node"
            ))));
        }
        Ok(Some(opening))
    }

    /// Produce an inclusion proof for a leaf slot against the walker's current root.
    fn prove(&self, leaf_index: LeafIndex) -> Result<Proof, Error> {
        let walked = self.walk(leaf_index)?;
        Ok(Proof {
            leaf_index,
            siblings: walked.siblings.into_iter().rev().collect(),
        })
    }

    /// Write (or, with `None`, clear) a leaf slot, recomputing hashes bottom-up along the
    /// path and staging every superseding node into the updater. Returns the proof captured
    /// at this step of the mutation.
    fn write_leaf<H: NodeHasher>(
        &mut self,
        leaf_index: LeafIndex,
        opening: Option<&LeafOpening>,
        updater: &mut StorageUpdater<'_, S>,
    ) -> Result<Proof, Error> {
        let walked = self.walk(leaf_index)?;

        let mut current = match opening {
            Some(opening) => {
                let encoded = opening.to_bytes().to_vec();
                let hash = H::hash_leaf(opening);
                updater.put_trie_node(&walked.leaf_location, &hash, encoded.clone());
                self.overlay
                    .insert((walked.leaf_location.clone(), hash), encoded);
                hash
            }
            None => TERMINATOR,
        };

        for depth in (0..TRIE_DEPTH).rev() {
            let sibling = walked.siblings[depth];
            let data = if trie::leaf_path_bit(leaf_index, depth) {
                InternalData {
                    left: sibling,
                    right: current,
                }
            } else {
                InternalData {
                    left: current,
                    right: sibling,
                }
            };
            let hash = H::hash_internal(&data);
            if hash != self.empty_hashes[depth] {
                let location = trie::node_location(leaf_index, depth);
                let encoded = data.encode().to_vec();
                updater.put_trie_node(&location, &hash, encoded.clone());
                self.overlay.insert((location, hash), encoded);
            }
            current = hash;
        }

        self.root = current;
        Ok(Proof {
            leaf_index,
            siblings: walked.siblings.into_iter().rev().collect(),
        })
    }
}
