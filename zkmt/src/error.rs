use crate::storage::StorageError;
use zkmt_core::trace::IncompleteTrace;
use zkmt_core::trie::MalformedEncoding;

/// Errors surfaced by the trie engine.
///
/// `KeyAlreadyExists` and `KeyNotFound` are recoverable by the caller and are never retried
/// internally. `HashCollision` and commit failures are fatal to the in-flight operation;
/// nothing is committed and the engine's in-memory state is left at the last known-good root.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An insert hit a live leaf; the caller must use update instead.
    #[error("key already exists in the trie")]
    KeyAlreadyExists,
    /// An update or deletion addressed an absent key.
    #[error("key not found in the trie")]
    KeyNotFound,
    /// Two distinct keys mapped to the same hashed key.
    #[error("hash collision on hashed key {0}")]
    HashCollision(String),
    /// A stored node or leaf failed to decode. Aborts only the item in question.
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),
    /// The storage layer failed; see [`StorageError`].
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// A trace was assembled without all of its required fields.
    #[error(transparent)]
    IncompleteTrace(#[from] IncompleteTrace),
}

impl From<MalformedEncoding> for Error {
    fn from(e: MalformedEncoding) -> Self {
        Error::MalformedEncoding(e.to_string())
    }
}
