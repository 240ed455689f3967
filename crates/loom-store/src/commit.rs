//! The immutable commit node and its on-disk record.

use serde::{Deserialize, Serialize};

use loom_types::{CommitId, ContentHasher};

use crate::error::{StoreError, StoreResult};

/// An immutable node in the commit graph.
///
/// The id is a pure function of `parents` and `payload`. `generation` is
/// derived from the parents (`1 + max(parent generations)`, roots are `1`)
/// and is not part of the identity; ancestry walks use it to prune.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: CommitId,
    /// Ordered parent ids. Empty for a root, two or more for a merge.
    pub parents: Vec<CommitId>,
    /// Opaque content (tree reference, author, message...).
    pub payload: Vec<u8>,
    pub generation: u64,
}

impl Commit {
    /// Compute the content address of a `(parents, payload)` pair.
    pub fn compute_id(parents: &[CommitId], payload: &[u8]) -> CommitId {
        let mut preimage = Vec::with_capacity(4 + parents.len() * 32 + payload.len());
        preimage.extend_from_slice(&(parents.len() as u32).to_le_bytes());
        for parent in parents {
            preimage.extend_from_slice(parent.as_bytes());
        }
        preimage.extend_from_slice(payload);
        ContentHasher::COMMIT.hash(&preimage)
    }

    /// Returns `true` if this commit has no parents.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Returns `true` if this commit has two or more parents.
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// The mainline parent, if any.
    pub fn first_parent(&self) -> Option<CommitId> {
        self.parents.first().copied()
    }

    /// Recompute the id from content and compare it to the recorded one.
    pub fn verify(&self) -> StoreResult<()> {
        let computed = Self::compute_id(&self.parents, &self.payload);
        if computed != self.id {
            return Err(StoreError::HashMismatch {
                expected: self.id,
                computed,
            });
        }
        Ok(())
    }

    /// Short human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "{} gen={} parents={} payload={}B",
            self.id.short_hex(),
            self.generation,
            self.parents.len(),
            self.payload.len()
        )
    }
}

/// Persisted form of a commit: everything needed to recompute the id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CommitRecord {
    pub parents: Vec<CommitId>,
    pub payload: Vec<u8>,
}

impl CommitRecord {
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Decode bytes loaded for `id`, verifying the content address.
    pub fn decode(id: &CommitId, bytes: &[u8]) -> StoreResult<Self> {
        let record: Self = bincode::deserialize(bytes).map_err(|e| StoreError::Corrupt {
            id: *id,
            reason: e.to_string(),
        })?;
        let computed = Commit::compute_id(&record.parents, &record.payload);
        if computed != *id {
            return Err(StoreError::HashMismatch {
                expected: *id,
                computed,
            });
        }
        Ok(record)
    }
}
