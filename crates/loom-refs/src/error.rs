//! Error types for reference operations.

use thiserror::Error;

use loom_store::StoreError;
use loom_types::{CommitId, ErrorKind};

use crate::types::RefExpectation;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The reference was not found (or HEAD's branch is unborn).
    #[error("ref not found: {name}")]
    NotFound { name: String },

    /// Compare-and-swap precondition failed.
    #[error("ref conflict on {name}: expected {expected}, found {}", display_actual(.actual))]
    RefConflict {
        name: String,
        expected: RefExpectation,
        actual: Option<CommitId>,
    },

    /// HEAD may only be attached to a local branch.
    #[error("invalid HEAD target: {reason}")]
    InvalidHead { reason: String },

    /// The ref name is malformed or outside the supported namespaces.
    #[error("invalid ref name: {name}: {reason}")]
    InvalidRefName { name: String, reason: String },

    /// The ref would point at a commit that does not exist.
    #[error("ref {name} would dangle: commit {id} does not exist")]
    DanglingTarget { name: String, id: CommitId },

    /// Cannot delete the branch HEAD is attached to.
    #[error("cannot delete current branch: {name}")]
    DeleteCurrentBranch { name: String },

    /// Persisted HEAD state could not be decoded.
    #[error("corrupt HEAD state: {0}")]
    CorruptHead(String),

    /// The in-memory table lock was poisoned by a panicking writer.
    #[error("ref table lock poisoned")]
    LockPoisoned,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

fn display_actual(actual: &Option<CommitId>) -> String {
    match actual {
        Some(id) => id.short_hex(),
        None => "<absent>".into(),
    }
}

impl RefError {
    /// Position of this error in the engine-wide taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::RefConflict { .. } => ErrorKind::RefConflict,
            Self::InvalidHead { .. } => ErrorKind::InvalidHead,
            Self::InvalidRefName { .. }
            | Self::DanglingTarget { .. }
            | Self::DeleteCurrentBranch { .. } => ErrorKind::InvalidRef,
            Self::CorruptHead(_) => ErrorKind::Corrupt,
            Self::LockPoisoned => ErrorKind::Storage,
            Self::Store(e) => e.kind(),
        }
    }
}

/// Convenience type alias for ref operations.
pub type RefResult<T> = std::result::Result<T, RefError>;
