//! Proof traces: the replay evidence emitted for every trie operation.
//!
//! Each mutation or zero-read of the trie produces one trace capturing exactly the pre/post
//! state an external proving circuit needs to replay and verify the operation without access
//! to the trie itself: old and new subroots, the leaf openings touched, and the bracketing
//! sibling proofs. Traces are immutable value objects once constructed; the staged builders
//! in this module are the only permitted partially-populated state.
//!
//! The wire form is a recursive length-prefixed list encoding (RLP). Each variant is a
//! fixed-arity list of fields in a fixed order; decoding is strict and fails the whole trace
//! on wrong arity, wrong type, or trailing bytes. When traces of mixed variants are stored in
//! one sequence, a leading discriminant byte precedes the field list so a reader can dispatch
//! without external context.

use crate::leaf::LeafOpening;
use crate::proof::Proof;
use crate::trie::{LeafIndex, Node};

use alloc::vec::Vec;
use alloy_rlp::{Decodable, Encodable, Header};

/// Discriminant of [`ReadTrace`].
pub const READ_TRACE_CODE: u8 = 0;
/// Discriminant of [`ReadZeroTrace`].
pub const READ_ZERO_TRACE_CODE: u8 = 1;
/// Discriminant of [`InsertionTrace`].
pub const INSERTION_TRACE_CODE: u8 = 2;
/// Discriminant of [`UpdateTrace`].
pub const UPDATE_TRACE_CODE: u8 = 3;
/// Discriminant of [`DeletionTrace`].
pub const DELETION_TRACE_CODE: u8 = 4;

/// Evidence of reading an existing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadTrace {
    /// The allocation counter at the time of the read.
    pub next_free_node: LeafIndex,
    /// The subroot the proof verifies against.
    pub sub_root: Node,
    /// The opening of the read leaf.
    pub leaf: LeafOpening,
    /// Inclusion proof of the read leaf.
    pub proof: Proof,
    /// The raw key.
    pub key: Vec<u8>,
    /// The raw value.
    pub value: Vec<u8>,
}

/// Evidence that a key has no value: its hashed key falls strictly between two
/// sorted-neighbor leaves that link past it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadZeroTrace {
    /// The allocation counter at the time of the read.
    pub next_free_node: LeafIndex,
    /// The subroot both proofs verify against.
    pub sub_root: Node,
    /// Opening of the left bracketing leaf (greatest hashed key below the target).
    pub left_leaf: LeafOpening,
    /// Opening of the right bracketing leaf (smallest hashed key above the target).
    pub right_leaf: LeafOpening,
    /// Inclusion proof of the left bracketing leaf.
    pub left_proof: Proof,
    /// Inclusion proof of the right bracketing leaf.
    pub right_proof: Proof,
    /// The raw key that was absent.
    pub key: Vec<u8>,
}

/// Evidence of inserting a new key between its two sorted neighbors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertionTrace {
    /// The allocation counter after the insertion.
    pub new_next_free_node: LeafIndex,
    /// Subroot before the mutation.
    pub old_sub_root: Node,
    /// Subroot after the mutation.
    pub new_sub_root: Node,
    /// Proof captured while relinking the left neighbor.
    pub left_proof: Proof,
    /// Proof captured while writing the inserted leaf.
    pub new_proof: Proof,
    /// Proof captured while relinking the right neighbor.
    pub right_proof: Proof,
    /// The raw inserted key.
    pub key: Vec<u8>,
    /// The raw inserted value.
    pub value: Vec<u8>,
    /// The left neighbor's opening before the splice.
    pub prior_left_leaf: LeafOpening,
    /// The right neighbor's opening before the splice.
    pub prior_right_leaf: LeafOpening,
}

/// Evidence of replacing the value of an existing key in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTrace {
    /// The allocation counter, unchanged by updates.
    pub new_next_free_node: LeafIndex,
    /// Subroot before the mutation.
    pub old_sub_root: Node,
    /// Subroot after the mutation.
    pub new_sub_root: Node,
    /// Proof captured while rewriting the leaf.
    pub proof: Proof,
    /// The raw key.
    pub key: Vec<u8>,
    /// The raw value before the update.
    pub old_value: Vec<u8>,
    /// The raw value after the update.
    pub new_value: Vec<u8>,
    /// The leaf's opening before the update.
    pub prior_updated_leaf: LeafOpening,
}

/// Evidence of deleting a key and splicing its neighbors back together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionTrace {
    /// The allocation counter, unchanged by deletions: the slot is never reassigned.
    pub new_next_free_node: LeafIndex,
    /// Subroot before the mutation.
    pub old_sub_root: Node,
    /// Subroot after the mutation.
    pub new_sub_root: Node,
    /// Proof captured while relinking the left neighbor.
    pub left_proof: Proof,
    /// Proof captured while clearing the deleted slot.
    pub deleted_proof: Proof,
    /// Proof captured while relinking the right neighbor.
    pub right_proof: Proof,
    /// The raw deleted key.
    pub key: Vec<u8>,
    /// The left neighbor's opening before the splice.
    pub prior_left_leaf: LeafOpening,
    /// The deleted leaf's opening before removal.
    pub prior_deleted_leaf: LeafOpening,
    /// The right neighbor's opening before the splice.
    pub prior_right_leaf: LeafOpening,
}

/// A trace of one trie operation, tagged by variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trace {
    /// A read of an existing key.
    Read(ReadTrace),
    /// A read of an absent key.
    ReadZero(ReadZeroTrace),
    /// An insertion.
    Insertion(InsertionTrace),
    /// An in-place value update.
    Update(UpdateTrace),
    /// A deletion.
    Deletion(DeletionTrace),
}

impl Trace {
    /// The discriminant written ahead of the field list on the wire.
    pub fn trace_code(&self) -> u8 {
        match self {
            Trace::Read(_) => READ_TRACE_CODE,
            Trace::ReadZero(_) => READ_ZERO_TRACE_CODE,
            Trace::Insertion(_) => INSERTION_TRACE_CODE,
            Trace::Update(_) => UPDATE_TRACE_CODE,
            Trace::Deletion(_) => DELETION_TRACE_CODE,
        }
    }

    /// Encode as a discriminant byte followed by the variant's RLP list.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.inner_length());
        out.push(self.trace_code());
        match self {
            Trace::Read(t) => t.encode(&mut out),
            Trace::ReadZero(t) => t.encode(&mut out),
            Trace::Insertion(t) => t.encode(&mut out),
            Trace::Update(t) => t.encode(&mut out),
            Trace::Deletion(t) => t.encode(&mut out),
        }
        out
    }

    /// Decode a discriminated trace. The input must contain exactly one trace.
    pub fn decode(mut buf: &[u8]) -> alloy_rlp::Result<Self> {
        let code = *buf.first().ok_or(alloy_rlp::Error::InputTooShort)?;
        buf = &buf[1..];
        let trace = match code {
            READ_TRACE_CODE => Trace::Read(ReadTrace::decode(&mut buf)?),
            READ_ZERO_TRACE_CODE => Trace::ReadZero(ReadZeroTrace::decode(&mut buf)?),
            INSERTION_TRACE_CODE => Trace::Insertion(InsertionTrace::decode(&mut buf)?),
            UPDATE_TRACE_CODE => Trace::Update(UpdateTrace::decode(&mut buf)?),
            DELETION_TRACE_CODE => Trace::Deletion(DeletionTrace::decode(&mut buf)?),
            _ => return Err(alloy_rlp::Error::Custom("unknown trace discriminant")),
        };
        if !buf.is_empty() {
            return Err(alloy_rlp::Error::UnexpectedLength);
        }
        Ok(trace)
    }

    fn inner_length(&self) -> usize {
        match self {
            Trace::Read(t) => t.length(),
            Trace::ReadZero(t) => t.length(),
            Trace::Insertion(t) => t.length(),
            Trace::Update(t) => t.length(),
            Trace::Deletion(t) => t.length(),
        }
    }
}

/// An attempt to build a trace before all of its fields were set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncompleteTrace(pub &'static str);

impl core::fmt::Display for IncompleteTrace {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "trace field `{}` was never set", self.0)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for IncompleteTrace {}

fn opening_length(opening: &LeafOpening) -> usize {
    opening.to_bytes().length()
}

fn decode_list_payload<'a>(buf: &mut &'a [u8]) -> alloy_rlp::Result<&'a [u8]> {
    let header = Header::decode(buf)?;
    if !header.list {
        return Err(alloy_rlp::Error::UnexpectedString);
    }
    if buf.len() < header.payload_length {
        return Err(alloy_rlp::Error::InputTooShort);
    }
    let payload = &buf[..header.payload_length];
    *buf = &buf[header.payload_length..];
    Ok(payload)
}

fn decode_bytes(buf: &mut &[u8]) -> alloy_rlp::Result<Vec<u8>> {
    Ok(Header::decode_bytes(buf, false)?.to_vec())
}

fn decode_opening(buf: &mut &[u8]) -> alloy_rlp::Result<LeafOpening> {
    let bytes = Header::decode_bytes(buf, false)?;
    LeafOpening::from_bytes(bytes).map_err(|_| alloy_rlp::Error::Custom("invalid leaf opening"))
}

fn finish_list(payload: &[u8]) -> alloy_rlp::Result<()> {
    if payload.is_empty() {
        Ok(())
    } else {
        Err(alloy_rlp::Error::UnexpectedLength)
    }
}

impl ReadTrace {
    fn payload_length(&self) -> usize {
        self.next_free_node.length()
            + self.sub_root.length()
            + opening_length(&self.leaf)
            + self.proof.length()
            + self.key.as_slice().length()
            + self.value.as_slice().length()
    }
}

impl Encodable for ReadTrace {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        let payload_length = self.payload_length();
        Header {
            list: true,
            payload_length,
        }
        .encode(out);
        self.next_free_node.encode(out);
        self.sub_root.encode(out);
        self.leaf.to_bytes().encode(out);
        self.proof.encode(out);
        self.key.as_slice().encode(out);
        self.value.as_slice().encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

impl Decodable for ReadTrace {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let mut payload = decode_list_payload(buf)?;
        let trace = ReadTrace {
            next_free_node: u64::decode(&mut payload)?,
            sub_root: Node::decode(&mut payload)?,
            leaf: decode_opening(&mut payload)?,
            proof: Proof::decode(&mut payload)?,
            key: decode_bytes(&mut payload)?,
            value: decode_bytes(&mut payload)?,
        };
        finish_list(payload)?;
        Ok(trace)
    }
}

impl ReadZeroTrace {
    /// Start building a zero-read trace from the subroot it will verify against.
    pub fn builder(sub_root: Node) -> ReadZeroTraceBuilder {
        ReadZeroTraceBuilder {
            sub_root,
            next_free_node: None,
            left_leaf: None,
            right_leaf: None,
            left_proof: None,
            right_proof: None,
            key: None,
        }
    }

    fn payload_length(&self) -> usize {
        self.next_free_node.length()
            + self.sub_root.length()
            + opening_length(&self.left_leaf)
            + opening_length(&self.right_leaf)
            + self.left_proof.length()
            + self.right_proof.length()
            + self.key.as_slice().length()
    }
}

impl Encodable for ReadZeroTrace {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        let payload_length = self.payload_length();
        Header {
            list: true,
            payload_length,
        }
        .encode(out);
        self.next_free_node.encode(out);
        self.sub_root.encode(out);
        self.left_leaf.to_bytes().encode(out);
        self.right_leaf.to_bytes().encode(out);
        self.left_proof.encode(out);
        self.right_proof.encode(out);
        self.key.as_slice().encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

impl Decodable for ReadZeroTrace {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let mut payload = decode_list_payload(buf)?;
        let trace = ReadZeroTrace {
            next_free_node: u64::decode(&mut payload)?,
            sub_root: Node::decode(&mut payload)?,
            left_leaf: decode_opening(&mut payload)?,
            right_leaf: decode_opening(&mut payload)?,
            left_proof: Proof::decode(&mut payload)?,
            right_proof: Proof::decode(&mut payload)?,
            key: decode_bytes(&mut payload)?,
        };
        finish_list(payload)?;
        Ok(trace)
    }
}

impl InsertionTrace {
    /// Start building an insertion trace from the pre-mutation subroot.
    pub fn builder(old_sub_root: Node) -> InsertionTraceBuilder {
        InsertionTraceBuilder {
            old_sub_root,
            new_next_free_node: None,
            new_sub_root: None,
            left_proof: None,
            new_proof: None,
            right_proof: None,
            key: None,
            value: None,
            prior_left_leaf: None,
            prior_right_leaf: None,
        }
    }

    fn payload_length(&self) -> usize {
        self.new_next_free_node.length()
            + self.old_sub_root.length()
            + self.new_sub_root.length()
            + self.left_proof.length()
            + self.new_proof.length()
            + self.right_proof.length()
            + self.key.as_slice().length()
            + self.value.as_slice().length()
            + opening_length(&self.prior_left_leaf)
            + opening_length(&self.prior_right_leaf)
    }
}

impl Encodable for InsertionTrace {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        let payload_length = self.payload_length();
        Header {
            list: true,
            payload_length,
        }
        .encode(out);
        self.new_next_free_node.encode(out);
        self.old_sub_root.encode(out);
        self.new_sub_root.encode(out);
        self.left_proof.encode(out);
        self.new_proof.encode(out);
        self.right_proof.encode(out);
        self.key.as_slice().encode(out);
        self.value.as_slice().encode(out);
        self.prior_left_leaf.to_bytes().encode(out);
        self.prior_right_leaf.to_bytes().encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

impl Decodable for InsertionTrace {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let mut payload = decode_list_payload(buf)?;
        let trace = InsertionTrace {
            new_next_free_node: u64::decode(&mut payload)?,
            old_sub_root: Node::decode(&mut payload)?,
            new_sub_root: Node::decode(&mut payload)?,
            left_proof: Proof::decode(&mut payload)?,
            new_proof: Proof::decode(&mut payload)?,
            right_proof: Proof::decode(&mut payload)?,
            key: decode_bytes(&mut payload)?,
            value: decode_bytes(&mut payload)?,
            prior_left_leaf: decode_opening(&mut payload)?,
            prior_right_leaf: decode_opening(&mut payload)?,
        };
        finish_list(payload)?;
        Ok(trace)
    }
}

impl UpdateTrace {
    /// Start building an update trace from the pre-mutation subroot.
    pub fn builder(old_sub_root: Node) -> UpdateTraceBuilder {
        UpdateTraceBuilder {
            old_sub_root,
            new_next_free_node: None,
            new_sub_root: None,
            proof: None,
            key: None,
            old_value: None,
            new_value: None,
            prior_updated_leaf: None,
        }
    }

    fn payload_length(&self) -> usize {
        self.new_next_free_node.length()
            + self.old_sub_root.length()
            + self.new_sub_root.length()
            + self.proof.length()
            + self.key.as_slice().length()
            + self.old_value.as_slice().length()
            + self.new_value.as_slice().length()
            + opening_length(&self.prior_updated_leaf)
    }
}

impl Encodable for UpdateTrace {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        let payload_length = self.payload_length();
        Header {
            list: true,
            payload_length,
        }
        .encode(out);
        self.new_next_free_node.encode(out);
        self.old_sub_root.encode(out);
        self.new_sub_root.encode(out);
        self.proof.encode(out);
        self.key.as_slice().encode(out);
        self.old_value.as_slice().encode(out);
        self.new_value.as_slice().encode(out);
        self.prior_updated_leaf.to_bytes().encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

impl Decodable for UpdateTrace {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let mut payload = decode_list_payload(buf)?;
        let trace = UpdateTrace {
            new_next_free_node: u64::decode(&mut payload)?,
            old_sub_root: Node::decode(&mut payload)?,
            new_sub_root: Node::decode(&mut payload)?,
            proof: Proof::decode(&mut payload)?,
            key: decode_bytes(&mut payload)?,
            old_value: decode_bytes(&mut payload)?,
            new_value: decode_bytes(&mut payload)?,
            prior_updated_leaf: decode_opening(&mut payload)?,
        };
        finish_list(payload)?;
        Ok(trace)
    }
}

impl DeletionTrace {
    /// Start building a deletion trace from the pre-mutation subroot.
    pub fn builder(old_sub_root: Node) -> DeletionTraceBuilder {
        DeletionTraceBuilder {
            old_sub_root,
            new_next_free_node: None,
            new_sub_root: None,
            left_proof: None,
            deleted_proof: None,
            right_proof: None,
            key: None,
            prior_left_leaf: None,
            prior_deleted_leaf: None,
            prior_right_leaf: None,
        }
    }

    fn payload_length(&self) -> usize {
        self.new_next_free_node.length()
            + self.old_sub_root.length()
            + self.new_sub_root.length()
            + self.left_proof.length()
            + self.deleted_proof.length()
            + self.right_proof.length()
            + self.key.as_slice().length()
            + opening_length(&self.prior_left_leaf)
            + opening_length(&self.prior_deleted_leaf)
            + opening_length(&self.prior_right_leaf)
    }
}

impl Encodable for DeletionTrace {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        let payload_length = self.payload_length();
        Header {
            list: true,
            payload_length,
        }
        .encode(out);
        self.new_next_free_node.encode(out);
        self.old_sub_root.encode(out);
        self.new_sub_root.encode(out);
        self.left_proof.encode(out);
        self.deleted_proof.encode(out);
        self.right_proof.encode(out);
        self.key.as_slice().encode(out);
        self.prior_left_leaf.to_bytes().encode(out);
        self.prior_deleted_leaf.to_bytes().encode(out);
        self.prior_right_leaf.to_bytes().encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

impl Decodable for DeletionTrace {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let mut payload = decode_list_payload(buf)?;
        let trace = DeletionTrace {
            new_next_free_node: u64::decode(&mut payload)?,
            old_sub_root: Node::decode(&mut payload)?,
            new_sub_root: Node::decode(&mut payload)?,
            left_proof: Proof::decode(&mut payload)?,
            deleted_proof: Proof::decode(&mut payload)?,
            right_proof: Proof::decode(&mut payload)?,
            key: decode_bytes(&mut payload)?,
            prior_left_leaf: decode_opening(&mut payload)?,
            prior_deleted_leaf: decode_opening(&mut payload)?,
            prior_right_leaf: decode_opening(&mut payload)?,
        };
        finish_list(payload)?;
        Ok(trace)
    }
}

/// Staged construction of a [`ReadZeroTrace`]. The subroot is captured first; leaves, proofs
/// and the key follow as the engine walks the bracketing paths.
#[derive(Debug)]
pub struct ReadZeroTraceBuilder {
    sub_root: Node,
    next_free_node: Option<LeafIndex>,
    left_leaf: Option<LeafOpening>,
    right_leaf: Option<LeafOpening>,
    left_proof: Option<Proof>,
    right_proof: Option<Proof>,
    key: Option<Vec<u8>>,
}

impl ReadZeroTraceBuilder {
    pub fn next_free_node(mut self, next_free_node: LeafIndex) -> Self {
        self.next_free_node = Some(next_free_node);
        self
    }

    pub fn leaves(mut self, left: LeafOpening, right: LeafOpening) -> Self {
        self.left_leaf = Some(left);
        self.right_leaf = Some(right);
        self
    }

    pub fn proofs(mut self, left: Proof, right: Proof) -> Self {
        self.left_proof = Some(left);
        self.right_proof = Some(right);
        self
    }

    pub fn key(mut self, key: Vec<u8>) -> Self {
        self.key = Some(key);
        self
    }

    /// Produce the immutable trace; fails if any field was never set.
    pub fn build(self) -> Result<ReadZeroTrace, IncompleteTrace> {
        Ok(ReadZeroTrace {
            next_free_node: self.next_free_node.ok_or(IncompleteTrace("next_free_node"))?,
            sub_root: self.sub_root,
            left_leaf: self.left_leaf.ok_or(IncompleteTrace("left_leaf"))?,
            right_leaf: self.right_leaf.ok_or(IncompleteTrace("right_leaf"))?,
            left_proof: self.left_proof.ok_or(IncompleteTrace("left_proof"))?,
            right_proof: self.right_proof.ok_or(IncompleteTrace("right_proof"))?,
            key: self.key.ok_or(IncompleteTrace("key"))?,
        })
    }
}

/// Staged construction of an [`InsertionTrace`]. The old subroot is captured before the
/// mutation; the remaining fields are set as the splice progresses.
#[derive(Debug)]
pub struct InsertionTraceBuilder {
    old_sub_root: Node,
    new_next_free_node: Option<LeafIndex>,
    new_sub_root: Option<Node>,
    left_proof: Option<Proof>,
    new_proof: Option<Proof>,
    right_proof: Option<Proof>,
    key: Option<Vec<u8>>,
    value: Option<Vec<u8>>,
    prior_left_leaf: Option<LeafOpening>,
    prior_right_leaf: Option<LeafOpening>,
}

impl InsertionTraceBuilder {
    pub fn new_next_free_node(mut self, new_next_free_node: LeafIndex) -> Self {
        self.new_next_free_node = Some(new_next_free_node);
        self
    }

    pub fn new_sub_root(mut self, new_sub_root: Node) -> Self {
        self.new_sub_root = Some(new_sub_root);
        self
    }

    pub fn proofs(mut self, left: Proof, new: Proof, right: Proof) -> Self {
        self.left_proof = Some(left);
        self.new_proof = Some(new);
        self.right_proof = Some(right);
        self
    }

    pub fn key_value(mut self, key: Vec<u8>, value: Vec<u8>) -> Self {
        self.key = Some(key);
        self.value = Some(value);
        self
    }

    pub fn prior_leaves(mut self, left: LeafOpening, right: LeafOpening) -> Self {
        self.prior_left_leaf = Some(left);
        self.prior_right_leaf = Some(right);
        self
    }

    /// Produce the immutable trace; fails if any field was never set.
    pub fn build(self) -> Result<InsertionTrace, IncompleteTrace> {
        Ok(InsertionTrace {
            new_next_free_node: self
                .new_next_free_node
                .ok_or(IncompleteTrace("new_next_free_node"))?,
            old_sub_root: self.old_sub_root,
            new_sub_root: self.new_sub_root.ok_or(IncompleteTrace("new_sub_root"))?,
            left_proof: self.left_proof.ok_or(IncompleteTrace("left_proof"))?,
            new_proof: self.new_proof.ok_or(IncompleteTrace("new_proof"))?,
            right_proof: self.right_proof.ok_or(IncompleteTrace("right_proof"))?,
            key: self.key.ok_or(IncompleteTrace("key"))?,
            value: self.value.ok_or(IncompleteTrace("value"))?,
            prior_left_leaf: self
                .prior_left_leaf
                .ok_or(IncompleteTrace("prior_left_leaf"))?,
            prior_right_leaf: self
                .prior_right_leaf
                .ok_or(IncompleteTrace("prior_right_leaf"))?,
        })
    }
}

/// Staged construction of an [`UpdateTrace`].
#[derive(Debug)]
pub struct UpdateTraceBuilder {
    old_sub_root: Node,
    new_next_free_node: Option<LeafIndex>,
    new_sub_root: Option<Node>,
    proof: Option<Proof>,
    key: Option<Vec<u8>>,
    old_value: Option<Vec<u8>>,
    new_value: Option<Vec<u8>>,
    prior_updated_leaf: Option<LeafOpening>,
}

impl UpdateTraceBuilder {
    pub fn new_next_free_node(mut self, new_next_free_node: LeafIndex) -> Self {
        self.new_next_free_node = Some(new_next_free_node);
        self
    }

    pub fn new_sub_root(mut self, new_sub_root: Node) -> Self {
        self.new_sub_root = Some(new_sub_root);
        self
    }

    pub fn proof(mut self, proof: Proof) -> Self {
        self.proof = Some(proof);
        self
    }

    pub fn key(mut self, key: Vec<u8>) -> Self {
        self.key = Some(key);
        self
    }

    pub fn values(mut self, old_value: Vec<u8>, new_value: Vec<u8>) -> Self {
        self.old_value = Some(old_value);
        self.new_value = Some(new_value);
        self
    }

    pub fn prior_leaf(mut self, prior_updated_leaf: LeafOpening) -> Self {
        self.prior_updated_leaf = Some(prior_updated_leaf);
        self
    }

    /// Produce the immutable trace; fails if any field was never set.
    pub fn build(self) -> Result<UpdateTrace, IncompleteTrace> {
        Ok(UpdateTrace {
            new_next_free_node: self
                .new_next_free_node
                .ok_or(IncompleteTrace("new_next_free_node"))?,
            old_sub_root: self.old_sub_root,
            new_sub_root: self.new_sub_root.ok_or(IncompleteTrace("new_sub_root"))?,
            proof: self.proof.ok_or(IncompleteTrace("proof"))?,
            key: self.key.ok_or(IncompleteTrace("key"))?,
            old_value: self.old_value.ok_or(IncompleteTrace("old_value"))?,
            new_value: self.new_value.ok_or(IncompleteTrace("new_value"))?,
            prior_updated_leaf: self
                .prior_updated_leaf
                .ok_or(IncompleteTrace("prior_updated_leaf"))?,
        })
    }
}

/// Staged construction of a [`DeletionTrace`].
#[derive(Debug)]
pub struct DeletionTraceBuilder {
    old_sub_root: Node,
    new_next_free_node: Option<LeafIndex>,
    new_sub_root: Option<Node>,
    left_proof: Option<Proof>,
    deleted_proof: Option<Proof>,
    right_proof: Option<Proof>,
    key: Option<Vec<u8>>,
    prior_left_leaf: Option<LeafOpening>,
    prior_deleted_leaf: Option<LeafOpening>,
    prior_right_leaf: Option<LeafOpening>,
}

impl DeletionTraceBuilder {
    pub fn new_next_free_node(mut self, new_next_free_node: LeafIndex) -> Self {
        self.new_next_free_node = Some(new_next_free_node);
        self
    }

    pub fn new_sub_root(mut self, new_sub_root: Node) -> Self {
        self.new_sub_root = Some(new_sub_root);
        self
    }

    pub fn proofs(mut self, left: Proof, deleted: Proof, right: Proof) -> Self {
        self.left_proof = Some(left);
        self.deleted_proof = Some(deleted);
        self.right_proof = Some(right);
        self
    }

    pub fn key(mut self, key: Vec<u8>) -> Self {
        self.key = Some(key);
        self
    }

    pub fn prior_leaves(
        mut self,
        left: LeafOpening,
        deleted: LeafOpening,
        right: LeafOpening,
    ) -> Self {
        self.prior_left_leaf = Some(left);
        self.prior_deleted_leaf = Some(deleted);
        self.prior_right_leaf = Some(right);
        self
    }

    /// Produce the immutable trace; fails if any field was never set.
    pub fn build(self) -> Result<DeletionTrace, IncompleteTrace> {
        Ok(DeletionTrace {
            new_next_free_node: self
                .new_next_free_node
                .ok_or(IncompleteTrace("new_next_free_node"))?,
            old_sub_root: self.old_sub_root,
            new_sub_root: self.new_sub_root.ok_or(IncompleteTrace("new_sub_root"))?,
            left_proof: self.left_proof.ok_or(IncompleteTrace("left_proof"))?,
            deleted_proof: self.deleted_proof.ok_or(IncompleteTrace("deleted_proof"))?,
            right_proof: self.right_proof.ok_or(IncompleteTrace("right_proof"))?,
            key: self.key.ok_or(IncompleteTrace("key"))?,
            prior_left_leaf: self
                .prior_left_leaf
                .ok_or(IncompleteTrace("prior_left_leaf"))?,
            prior_deleted_leaf: self
                .prior_deleted_leaf
                .ok_or(IncompleteTrace("prior_deleted_leaf"))?,
            prior_right_leaf: self
                .prior_right_leaf
                .ok_or(IncompleteTrace("prior_right_leaf"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trie::TRIE_DEPTH;

    fn proof(leaf_index: LeafIndex, fill: u8) -> Proof {
        Proof {
            leaf_index,
            siblings: (0..TRIE_DEPTH as u8).map(|i| [i ^ fill; 32]).collect(),
        }
    }

    fn opening(prev: u64, next: u64, fill: u8) -> LeafOpening {
        LeafOpening {
            prev_leaf: prev,
            next_leaf: next,
            hashed_key: [fill; 32],
            value_hash: [fill.wrapping_add(1); 32],
        }
    }

    fn sample_insertion() -> InsertionTrace {
        InsertionTrace {
            new_next_free_node: 3,
            old_sub_root: [0x0a; 32],
            new_sub_root: [0x0b; 32],
            left_proof: proof(0, 1),
            new_proof: proof(2, 2),
            right_proof: proof(1, 3),
            key: b"key".to_vec(),
            value: b"value".to_vec(),
            prior_left_leaf: opening(0, 1, 0x10),
            prior_right_leaf: opening(0, 1, 0x20),
        }
    }

    #[test]
    fn insertion_round_trips() {
        let trace = sample_insertion();
        let mut encoded = Vec::new();
        trace.encode(&mut encoded);
        assert_eq!(encoded.len(), trace.length());
        assert_eq!(InsertionTrace::decode(&mut &encoded[..]).unwrap(), trace);
    }

    #[test]
    fn read_round_trips() {
        let trace = ReadTrace {
            next_free_node: 5,
            sub_root: [0x0c; 32],
            leaf: opening(1, 2, 0x30),
            proof: proof(4, 4),
            key: b"k".to_vec(),
            value: vec![0x01],
        };
        let mut encoded = Vec::new();
        trace.encode(&mut encoded);
        assert_eq!(ReadTrace::decode(&mut &encoded[..]).unwrap(), trace);
    }

    #[test]
    fn read_zero_round_trips() {
        let trace = ReadZeroTrace {
            next_free_node: 2,
            sub_root: [0x0d; 32],
            left_leaf: opening(0, 1, 0x40),
            right_leaf: opening(0, 1, 0x50),
            left_proof: proof(0, 5),
            right_proof: proof(1, 6),
            key: b"absent".to_vec(),
        };
        let mut encoded = Vec::new();
        trace.encode(&mut encoded);
        assert_eq!(ReadZeroTrace::decode(&mut &encoded[..]).unwrap(), trace);
    }

    #[test]
    fn update_round_trips() {
        let trace = UpdateTrace {
            new_next_free_node: 7,
            old_sub_root: [0x0e; 32],
            new_sub_root: [0x0f; 32],
            proof: proof(3, 7),
            key: b"k".to_vec(),
            old_value: vec![0x01],
            new_value: vec![0x02, 0x03],
            prior_updated_leaf: opening(2, 4, 0x60),
        };
        let mut encoded = Vec::new();
        trace.encode(&mut encoded);
        assert_eq!(UpdateTrace::decode(&mut &encoded[..]).unwrap(), trace);
    }

    #[test]
    fn deletion_round_trips() {
        let trace = DeletionTrace {
            new_next_free_node: 9,
            old_sub_root: [0x1a; 32],
            new_sub_root: [0x1b; 32],
            left_proof: proof(0, 8),
            deleted_proof: proof(4, 9),
            right_proof: proof(1, 10),
            key: b"gone".to_vec(),
            prior_left_leaf: opening(0, 4, 0x70),
            prior_deleted_leaf: opening(0, 1, 0x80),
            prior_right_leaf: opening(4, 1, 0x90),
        };
        let mut encoded = Vec::new();
        trace.encode(&mut encoded);
        assert_eq!(DeletionTrace::decode(&mut &encoded[..]).unwrap(), trace);
    }

    #[test]
    fn discriminated_stream_dispatches() {
        let trace = Trace::Insertion(sample_insertion());
        let encoded = trace.encode();
        assert_eq!(encoded[0], INSERTION_TRACE_CODE);
        assert_eq!(Trace::decode(&encoded).unwrap(), trace);

        let mut unknown = encoded.clone();
        unknown[0] = 0xee;
        assert!(Trace::decode(&unknown).is_err());
    }

    #[test]
    fn strict_decoding_rejects_mangled_input() {
        let encoded = Trace::Insertion(sample_insertion()).encode();

        // truncated.
        assert!(Trace::decode(&encoded[..encoded.len() - 1]).is_err());

        // trailing garbage.
        let mut trailing = encoded.clone();
        trailing.push(0x00);
        assert!(Trace::decode(&trailing).is_err());

        // an insertion body does not decode as an update.
        assert!(UpdateTrace::decode(&mut &encoded[1..]).is_err());
    }

    #[test]
    fn builder_produces_the_same_trace() {
        let expected = sample_insertion();
        let built = InsertionTrace::builder(expected.old_sub_root)
            .new_next_free_node(expected.new_next_free_node)
            .new_sub_root(expected.new_sub_root)
            .proofs(
                expected.left_proof.clone(),
                expected.new_proof.clone(),
                expected.right_proof.clone(),
            )
            .key_value(expected.key.clone(), expected.value.clone())
            .prior_leaves(
                expected.prior_left_leaf.clone(),
                expected.prior_right_leaf.clone(),
            )
            .build()
            .unwrap();
        assert_eq!(built, expected);
    }

    #[test]
    fn builder_rejects_missing_fields() {
        let result = InsertionTrace::builder([0; 32])
            .new_next_free_node(1)
            .build();
        assert_eq!(result, Err(IncompleteTrace("new_sub_root")));
    }
}
