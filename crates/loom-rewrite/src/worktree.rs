//! Notification seam for working-copy updates after a reset.

use serde::{Deserialize, Serialize};

use loom_types::CommitId;

use crate::error::RewriteResult;

/// How far a reset reaches beyond the ref itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetMode {
    /// Move the ref only.
    Soft,
    /// Move the ref and reset the index.
    #[default]
    Mixed,
    /// Move the ref, reset the index and the working copy.
    Hard,
}

/// Called after a reset has moved a ref.
///
/// The engine has no working copy of its own; front ends that do implement
/// this to bring the index and files in line with `mode`.
pub trait WorktreeHook: Send + Sync {
    fn on_reset(&self, name: &str, target: &CommitId, mode: ResetMode) -> RewriteResult<()>;
}

/// Hook that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpWorktree;

impl WorktreeHook for NoOpWorktree {
    fn on_reset(&self, _name: &str, _target: &CommitId, _mode: ResetMode) -> RewriteResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_hook_accepts_every_mode() {
        let id = CommitId::from_hash([1; 32]);
        for mode in [ResetMode::Soft, ResetMode::Mixed, ResetMode::Hard] {
            NoOpWorktree.on_reset("refs/heads/main", &id, mode).unwrap();
        }
    }

    #[test]
    fn default_mode_is_mixed() {
        assert_eq!(ResetMode::default(), ResetMode::Mixed);
    }
}
