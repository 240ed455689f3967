//! Error types for merge operations.

use loom_dag::DagError;
use loom_refs::RefError;
use loom_store::StoreError;
use loom_types::{CommitId, ErrorKind};

/// Errors that can occur while merging.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// Content reconciliation failed. No ref was changed.
    #[error(
        "merge of {ours} and {theirs} conflicts in {}",
        .paths.join(", ")
    )]
    MergeConflict {
        /// The chosen merge base, `None` for unrelated histories.
        base: Option<CommitId>,
        ours: CommitId,
        theirs: CommitId,
        paths: Vec<String>,
    },

    /// A merge commit cannot be recorded on a remote-tracking ref.
    #[error("ref is read-only outside of sync: {name}")]
    ReadOnlyRef { name: String },

    #[error("ref error: {0}")]
    Ref(#[from] RefError),

    #[error("ancestry error: {0}")]
    Dag(#[from] DagError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl MergeError {
    /// Position of this error in the engine-wide taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MergeConflict { .. } => ErrorKind::MergeConflict,
            Self::ReadOnlyRef { .. } => ErrorKind::InvalidRef,
            Self::Ref(e) => e.kind(),
            Self::Dag(e) => e.kind(),
            Self::Store(e) => e.kind(),
        }
    }
}

/// Convenience alias for merge operations.
pub type MergeOpResult<T> = Result<T, MergeError>;
