use std::fmt;

use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// The engine-wide error taxonomy.
///
/// Every crate error maps onto exactly one kind through its `kind()`
/// accessor, so callers (and a future front end) can branch on the class of
/// failure without matching crate-specific variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A referenced commit or ref is absent.
    NotFound,
    /// A commit names a parent that does not exist.
    InvalidParent,
    /// HEAD was pointed at something other than a local branch.
    InvalidHead,
    /// A ref name is malformed or would dangle.
    InvalidRef,
    /// A compare-and-swap on a ref lost its race.
    RefConflict,
    /// A push would discard remote history.
    NonFastForward,
    RebaseConflict,
    CherryPickConflict,
    RevertConflict,
    MergeConflict,
    /// Stored or received data does not match its content address.
    Corrupt,
    /// The storage backend failed.
    Storage,
    TransportError,
    TransportTimeout,
}

impl ErrorKind {
    /// Process exit code for this kind. `0` is reserved for success.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::NotFound => 2,
            Self::InvalidParent => 3,
            Self::InvalidHead => 4,
            Self::InvalidRef => 5,
            Self::RefConflict => 6,
            Self::NonFastForward => 7,
            Self::RebaseConflict => 8,
            Self::CherryPickConflict => 9,
            Self::RevertConflict => 10,
            Self::MergeConflict => 11,
            Self::Corrupt => 12,
            Self::Storage => 13,
            Self::TransportError => 14,
            Self::TransportTimeout => 15,
        }
    }

    /// Content could not be reconciled; the user can resolve and retry.
    pub fn is_conflict(self) -> bool {
        matches!(
            self,
            Self::RebaseConflict | Self::CherryPickConflict | Self::RevertConflict | Self::MergeConflict
        )
    }

    /// Only transport timeouts may be retried as-is by the caller.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::TransportTimeout)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
