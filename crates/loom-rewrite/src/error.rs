//! Error types for history rewriting.

use loom_dag::DagError;
use loom_refs::RefError;
use loom_store::StoreError;
use loom_types::{CommitId, ErrorKind};

/// Errors that can occur while rewriting history.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    /// The inverse of `commit` does not apply to the ref's tip.
    #[error("revert of {commit} conflicts in {}", .paths.join(", "))]
    RevertConflict { commit: CommitId, paths: Vec<String> },

    /// A replayed commit did not apply. Nothing was moved.
    #[error(
        "rebase stopped at {commit} after {} replayed, {} remaining: {}",
        .replayed.len(),
        .remaining.len(),
        .paths.join(", ")
    )]
    RebaseConflict {
        commit: CommitId,
        /// New commits created before the failure (now orphaned).
        replayed: Vec<CommitId>,
        /// Original commits that were not attempted.
        remaining: Vec<CommitId>,
        paths: Vec<String>,
    },

    /// A pick did not apply. Earlier picks remain on the ref.
    #[error(
        "cherry-pick stopped at {commit} after {} applied, {} remaining: {}",
        .applied.len(),
        .remaining.len(),
        .paths.join(", ")
    )]
    CherryPickConflict {
        commit: CommitId,
        /// New commits already written to the ref.
        applied: Vec<CommitId>,
        remaining: Vec<CommitId>,
        paths: Vec<String>,
    },

    /// Another writer moved the ref between picks. Earlier picks remain on
    /// the ref; `remaining` starts with the pick whose update lost the race.
    #[error(
        "cherry-pick interrupted after {} applied, {} remaining: {source}",
        .applied.len(),
        .remaining.len()
    )]
    CherryPickInterrupted {
        applied: Vec<CommitId>,
        remaining: Vec<CommitId>,
        #[source]
        source: RefError,
    },

    /// Remote-tracking refs are only moved by sync.
    #[error("ref is read-only outside of sync: {name}")]
    ReadOnlyRef { name: String },

    /// The worktree hook rejected or failed a reset.
    #[error("worktree hook failed: {0}")]
    Worktree(String),

    #[error("ref error: {0}")]
    Ref(#[from] RefError),

    #[error("ancestry error: {0}")]
    Dag(#[from] DagError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl RewriteError {
    /// Position of this error in the engine-wide taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RevertConflict { .. } => ErrorKind::RevertConflict,
            Self::RebaseConflict { .. } => ErrorKind::RebaseConflict,
            Self::CherryPickConflict { .. } => ErrorKind::CherryPickConflict,
            Self::CherryPickInterrupted { source, .. } => source.kind(),
            Self::ReadOnlyRef { .. } => ErrorKind::InvalidRef,
            Self::Worktree(_) => ErrorKind::Storage,
            Self::Ref(e) => e.kind(),
            Self::Dag(e) => e.kind(),
            Self::Store(e) => e.kind(),
        }
    }
}

/// Convenience alias for rewrite results.
pub type RewriteResult<T> = Result<T, RewriteError>;
