//! Error types for ancestry queries.

use loom_store::StoreError;
use loom_types::{CommitId, ErrorKind};

/// Errors that can occur during ancestry queries.
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    /// A queried endpoint is not in the commit store.
    #[error("commit not found: {0}")]
    NotFound(CommitId),

    /// The store failed while walking parent edges.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl DagError {
    /// Position of this error in the engine-wide taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Store(e) => e.kind(),
        }
    }
}

/// Convenience alias for DAG results.
pub type DagResult<T> = Result<T, DagError>;
