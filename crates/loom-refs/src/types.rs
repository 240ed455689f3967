//! Core reference types: HEAD state, CAS expectations, and ref classification.

use std::fmt;

use serde::{Deserialize, Serialize};

use loom_types::CommitId;

use crate::error::{RefError, RefResult};

/// The distinguished name of HEAD.
pub const HEAD: &str = "HEAD";

/// The state of HEAD: attached to a local branch, or detached at a commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Head {
    /// HEAD names a local branch by its canonical name (`refs/heads/...`).
    Attached(String),
    /// HEAD points directly at a commit.
    Detached(CommitId),
}

impl Head {
    /// Encode for a storage backend: `ref: <name>` or a bare hex id.
    pub fn encode(&self) -> String {
        match self {
            Head::Attached(name) => format!("ref: {name}"),
            Head::Detached(id) => id.to_hex(),
        }
    }

    /// Decode the form produced by [`Head::encode`].
    pub fn decode(s: &str) -> RefResult<Self> {
        if let Some(name) = s.strip_prefix("ref: ") {
            return Ok(Head::Attached(name.to_string()));
        }
        CommitId::from_hex(s)
            .map(Head::Detached)
            .map_err(|e| RefError::CorruptHead(e.to_string()))
    }

    /// The branch HEAD is attached to, if any.
    pub fn branch(&self) -> Option<&str> {
        match self {
            Head::Attached(name) => Some(name),
            Head::Detached(_) => None,
        }
    }
}

impl Default for Head {
    fn default() -> Self {
        Head::Attached("refs/heads/main".into())
    }
}

/// What a compare-and-swap expects the current value of a ref to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefExpectation {
    /// The ref must not exist.
    Absent,
    /// The ref must currently point at this commit.
    Is(CommitId),
    /// Skip the check.
    Force,
}

impl RefExpectation {
    /// Expectation matching an observed optional value.
    pub fn from_current(current: Option<CommitId>) -> Self {
        match current {
            Some(id) => RefExpectation::Is(id),
            None => RefExpectation::Absent,
        }
    }

    /// Whether the precondition holds for the current value.
    pub fn matches(&self, current: Option<CommitId>) -> bool {
        match (self, current) {
            (RefExpectation::Force, _) => true,
            (RefExpectation::Absent, None) => true,
            (RefExpectation::Is(expected), Some(actual)) => *expected == actual,
            _ => false,
        }
    }
}

impl fmt::Display for RefExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefExpectation::Absent => write!(f, "<absent>"),
            RefExpectation::Is(id) => write!(f, "{}", id.short_hex()),
            RefExpectation::Force => write!(f, "<any>"),
        }
    }
}

/// Which namespace a canonical ref name belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefKind {
    /// `HEAD` itself.
    Head,
    /// `refs/heads/<branch>`, movable by local operations.
    Local { branch: String },
    /// `refs/remotes/<remote>/<branch>`, movable only by remote sync.
    RemoteTracking { remote: String, branch: String },
}

impl RefKind {
    pub fn is_remote_tracking(&self) -> bool {
        matches!(self, RefKind::RemoteTracking { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(b: u8) -> CommitId {
        CommitId::from_hash([b; 32])
    }

    #[test]
    fn expectation_matrix() {
        assert!(RefExpectation::Absent.matches(None));
        assert!(!RefExpectation::Absent.matches(Some(id(1))));
        assert!(RefExpectation::Is(id(1)).matches(Some(id(1))));
        assert!(!RefExpectation::Is(id(1)).matches(Some(id(2))));
        assert!(!RefExpectation::Is(id(1)).matches(None));
        assert!(RefExpectation::Force.matches(None));
        assert!(RefExpectation::Force.matches(Some(id(3))));
    }

    #[test]
    fn from_current_roundtrips() {
        assert_eq!(RefExpectation::from_current(None), RefExpectation::Absent);
        assert_eq!(
            RefExpectation::from_current(Some(id(4))),
            RefExpectation::Is(id(4))
        );
    }

    #[test]
    fn head_encoding_roundtrip() {
        let attached = Head::Attached("refs/heads/dev".into());
        assert_eq!(Head::decode(&attached.encode()).unwrap(), attached);
        let detached = Head::Detached(id(5));
        assert_eq!(Head::decode(&detached.encode()).unwrap(), detached);
        assert!(Head::decode("garbage").is_err());
    }

    #[test]
    fn default_head_is_main() {
        assert_eq!(Head::default().branch(), Some("refs/heads/main"));
    }
}
