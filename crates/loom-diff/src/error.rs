//! Error types for the diff crate.

use serde::{Deserialize, Serialize};

/// A three-way content merge that could not be completed.
///
/// `paths` names the conflicting regions. For the line merger these are
/// base line ranges (`"lines 3-5"`); other mergers may use file paths.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("merge conflict in {}", .paths.join(", "))]
pub struct MergeConflicts {
    pub paths: Vec<String>,
}

impl MergeConflicts {
    pub fn new(paths: Vec<String>) -> Self {
        Self { paths }
    }

    /// A conflict covering content that cannot be merged line by line.
    pub fn binary() -> Self {
        Self::new(vec!["<binary>".into()])
    }
}

/// Convenience alias for merge results.
pub type MergeOutcome = Result<Vec<u8>, MergeConflicts>;
