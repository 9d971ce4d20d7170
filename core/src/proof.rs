//! Inclusion and non-membership proofs against a subroot.
//!
//! A [`Proof`] is the sibling-hash path from a leaf slot to the subroot: a pure function of
//! the trie's stored nodes at a point in time, immutable once produced. Verifying it
//! recomputes the subroot from the leaf preimage (or the [`TERMINATOR`] for an empty slot)
//! and the recorded siblings.

use crate::hasher::NodeHasher;
use crate::leaf::LeafOpening;
use crate::trie::{InternalData, LeafIndex, Node, TERMINATOR, TRIE_DEPTH};

use alloc::vec::Vec;
use alloy_rlp::{Decodable, Encodable, Header};

/// Sibling nodes along the path from a leaf slot up to the subroot, ordered from the leaf
/// level upward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    /// The position of the proven leaf slot.
    pub leaf_index: LeafIndex,
    /// One sibling per level, `siblings[0]` adjacent to the leaf.
    pub siblings: Vec<Node>,
}

/// A failure to verify a [`Proof`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofVerificationError {
    /// The sibling path does not span the full trie depth.
    WrongDepth,
    /// The recomputed subroot differs from the expected one.
    RootMismatch,
}

impl core::fmt::Display for ProofVerificationError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            ProofVerificationError::WrongDepth => write!(f, "sibling path has wrong depth"),
            ProofVerificationError::RootMismatch => write!(f, "recomputed root does not match"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ProofVerificationError {}

impl Proof {
    /// Verify this proof against a subroot.
    ///
    /// Provide the opening of the proven leaf, or `None` to prove that the slot is empty or
    /// removed.
    pub fn verify<H: NodeHasher>(
        &self,
        leaf: Option<&LeafOpening>,
        root: &Node,
    ) -> Result<(), ProofVerificationError> {
        if self.siblings.len() != TRIE_DEPTH {
            return Err(ProofVerificationError::WrongDepth);
        }

        let mut current = match leaf {
            Some(opening) => H::hash_leaf(opening),
            None => TERMINATOR,
        };
        for (level, sibling) in self.siblings.iter().enumerate() {
            let data = if (self.leaf_index >> level) & 1 == 1 {
                InternalData {
                    left: *sibling,
                    right: current,
                }
            } else {
                InternalData {
                    left: current,
                    right: *sibling,
                }
            };
            current = H::hash_internal(&data);
        }

        if current == *root {
            Ok(())
        } else {
            Err(ProofVerificationError::RootMismatch)
        }
    }
}

// Wire form: `[leaf_index, [sibling, ...]]`.
impl Encodable for Proof {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        let payload_length = self.leaf_index.length() + self.siblings.length();
        Header {
            list: true,
            payload_length,
        }
        .encode(out);
        self.leaf_index.encode(out);
        self.siblings.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.leaf_index.length() + self.siblings.length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

impl Decodable for Proof {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let header = Header::decode(buf)?;
        if !header.list {
            return Err(alloy_rlp::Error::UnexpectedString);
        }
        if buf.len() < header.payload_length {
            return Err(alloy_rlp::Error::InputTooShort);
        }
        let mut payload = &buf[..header.payload_length];
        *buf = &buf[header.payload_length..];

        let leaf_index = u64::decode(&mut payload)?;
        let siblings = Vec::<Node>::decode(&mut payload)?;
        if !payload.is_empty() {
            return Err(alloy_rlp::Error::UnexpectedLength);
        }
        Ok(Proof {
            leaf_index,
            siblings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::Blake3Hasher;

    fn test_siblings() -> Vec<Node> {
        (0..TRIE_DEPTH as u8).map(|level| [level + 1; 32]).collect()
    }

    fn root_for(leaf_index: LeafIndex, leaf: Option<&LeafOpening>, siblings: &[Node]) -> Node {
        let mut current = match leaf {
            Some(opening) => Blake3Hasher::hash_leaf(opening),
            None => TERMINATOR,
        };
        for (level, sibling) in siblings.iter().enumerate() {
            let (left, right) = if (leaf_index >> level) & 1 == 1 {
                (*sibling, current)
            } else {
                (current, *sibling)
            };
            current = Blake3Hasher::hash_internal(&InternalData { left, right });
        }
        current
    }

    #[test]
    fn verifies_inclusion() {
        let opening = LeafOpening {
            prev_leaf: 0,
            next_leaf: 2,
            hashed_key: [0x55; 32],
            value_hash: [0x66; 32],
        };
        let siblings = test_siblings();
        let root = root_for(5, Some(&opening), &siblings);
        let proof = Proof {
            leaf_index: 5,
            siblings,
        };
        assert_eq!(proof.verify::<Blake3Hasher>(Some(&opening), &root), Ok(()));
    }

    #[test]
    fn verifies_empty_slot() {
        let siblings = test_siblings();
        let root = root_for(9, None, &siblings);
        let proof = Proof {
            leaf_index: 9,
            siblings,
        };
        assert_eq!(proof.verify::<Blake3Hasher>(None, &root), Ok(()));
    }

    #[test]
    fn rejects_wrong_root_and_depth() {
        let opening = LeafOpening::head();
        let siblings = test_siblings();
        let root = root_for(1, Some(&opening), &siblings);

        let tampered = Proof {
            leaf_index: 2,
            siblings: siblings.clone(),
        };
        assert_eq!(
            tampered.verify::<Blake3Hasher>(Some(&opening), &root),
            Err(ProofVerificationError::RootMismatch)
        );

        let short = Proof {
            leaf_index: 1,
            siblings: siblings[..TRIE_DEPTH - 1].to_vec(),
        };
        assert_eq!(
            short.verify::<Blake3Hasher>(Some(&opening), &root),
            Err(ProofVerificationError::WrongDepth)
        );
    }

    #[test]
    fn rlp_round_trips() {
        let proof = Proof {
            leaf_index: 1234,
            siblings: test_siblings(),
        };
        let mut encoded = Vec::new();
        proof.encode(&mut encoded);
        assert_eq!(encoded.len(), proof.length());
        assert_eq!(Proof::decode(&mut &encoded[..]).unwrap(), proof);

        // truncation fails rather than defaulting.
        assert!(Proof::decode(&mut &encoded[..encoded.len() - 1]).is_err());
    }
}
