use async_trait::async_trait;

use loom_store::Commit;
use loom_types::CommitId;

use crate::error::SyncResult;
use crate::types::RefUpdate;

/// Transport interface for remote repositories.
///
/// Every call may be slow; [`RemoteSync`](crate::RemoteSync) bounds each one
/// with its configured timeout.
#[async_trait]
pub trait Transport: Send + Sync {
    /// The remote's local branches (`refs/heads/*`) and their tips.
    async fn list_refs(&self, remote: &str) -> SyncResult<Vec<(String, CommitId)>>;

    /// The commits named by `wants`. A remote may return fewer than asked
    /// (the caller requests again) but never substitutes other content.
    async fn fetch_commits(&self, remote: &str, wants: &[CommitId]) -> SyncResult<Vec<Commit>>;

    /// The remote's current tip of `name`, if it exists.
    async fn remote_tip(&self, remote: &str, name: &str) -> SyncResult<Option<CommitId>>;

    /// Store `commits` (parents first) on the remote, then move
    /// `update.name` from `update.old` to `update.new`. Unless `force` is
    /// set, the remote rejects the update if the ref has moved since.
    async fn upload(&self, remote: &str, update: &RefUpdate, force: bool, commits: Vec<Commit>) -> SyncResult<()>;
}
