//! History rewriting for Loom.
//!
//! [`HistoryRewriter`] implements reset, revert, rebase and cherry-pick on
//! top of the commit store, the ref store and the ancestry engine. Changes
//! are carried between histories as three-way merges through a
//! [`loom_diff::ContentMerger`].

pub mod error;
pub mod rewriter;
pub mod worktree;

pub use error::{RewriteError, RewriteResult};
pub use rewriter::{HistoryRewriter, RebaseOutcome};
pub use worktree::{NoOpWorktree, ResetMode, WorktreeHook};
