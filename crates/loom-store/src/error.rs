use loom_types::{CommitId, ErrorKind};

/// Errors from commit store and storage backend operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested commit was not found.
    #[error("commit not found: {0}")]
    NotFound(CommitId),

    /// A new commit names a parent that is not in the store.
    #[error("invalid parent: {0} does not exist")]
    InvalidParent(CommitId),

    /// Content hash mismatch (data corruption or a lying peer).
    #[error("hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch {
        expected: CommitId,
        computed: CommitId,
    },

    /// The stored record is malformed or its history is incomplete.
    #[error("corrupt commit {id}: {reason}")]
    Corrupt { id: CommitId, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Position of this error in the engine-wide taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidParent(_) => ErrorKind::InvalidParent,
            Self::HashMismatch { .. } | Self::Corrupt { .. } => ErrorKind::Corrupt,
            Self::Serialization(_) | Self::Io(_) => ErrorKind::Storage,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
