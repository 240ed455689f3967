use std::time::Duration;

use thiserror::Error;

use loom_dag::DagError;
use loom_merge::MergeError;
use loom_refs::RefError;
use loom_rewrite::RewriteError;
use loom_store::StoreError;
use loom_types::{CommitId, ErrorKind};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("non-fast-forward update of {name}: remote is at {remote}, local is at {local}")]
    NonFastForward {
        name: String,
        local: CommitId,
        remote: CommitId,
    },

    #[error("ref rejected by remote: {name}: {reason}")]
    RefRejected { name: String, reason: String },

    #[error("remote ref not found: {name}")]
    RemoteRefNotFound { name: String },

    #[error("invalid refspec {spec:?}: {reason}")]
    InvalidRefSpec { spec: String, reason: String },

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("transport call {operation} timed out after {after:?}")]
    TransportTimeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("remote did not supply {} requested commit(s)", .missing.len())]
    IncompleteFetch { missing: Vec<CommitId> },

    #[error("ref error: {0}")]
    Ref(#[from] RefError),

    #[error("ancestry error: {0}")]
    Dag(#[from] DagError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("rewrite error: {0}")]
    Rewrite(#[from] RewriteError),

    #[error("merge error: {0}")]
    Merge(#[from] MergeError),
}

impl SyncError {
    /// Position of this error in the engine-wide taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NonFastForward { .. } => ErrorKind::NonFastForward,
            Self::RefRejected { .. } => ErrorKind::RefConflict,
            Self::RemoteRefNotFound { .. } => ErrorKind::NotFound,
            Self::InvalidRefSpec { .. } => ErrorKind::InvalidRef,
            Self::TransportError(_) | Self::IncompleteFetch { .. } => ErrorKind::TransportError,
            Self::TransportTimeout { .. } => ErrorKind::TransportTimeout,
            Self::Ref(e) => e.kind(),
            Self::Dag(e) => e.kind(),
            Self::Store(e) => e.kind(),
            Self::Rewrite(e) => e.kind(),
            Self::Merge(e) => e.kind(),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
