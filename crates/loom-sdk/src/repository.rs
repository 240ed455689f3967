use std::sync::Arc;

use tracing::info;

use loom_dag::AncestryEngine;
use loom_diff::{ContentMerger, LineMerger};
use loom_merge::Merger;
use loom_refs::{classify, local_ref, RefError, RefExpectation, RefKind, RefStore, RefTable, HEAD};
use loom_rewrite::HistoryRewriter;
use loom_store::{Commit, CommitStore, FsBackend, MemoryBackend, StorageBackend};
use loom_sync::{FetchResult, PullResult, PullStrategy, PushResult, RefSpec, RemoteSync, Transport};
use loom_types::CommitId;

use crate::config::LoomConfig;
use crate::error::{SdkError, SdkResult};

/// A Loom repository: one commit store, its refs, and the engines over them.
pub struct Repository {
    config: LoomConfig,
    store: Arc<CommitStore>,
    refs: Arc<RefTable>,
    dag: AncestryEngine,
    rewriter: Arc<HistoryRewriter>,
    merger: Arc<Merger>,
    sync: Option<RemoteSync>,
}

impl Repository {
    /// Open the repository described by `config`, restoring persisted refs
    /// when `storage.path` is set.
    pub fn open(config: &LoomConfig) -> SdkResult<Self> {
        let backend: Arc<dyn StorageBackend> = match &config.storage.path {
            Some(path) => Arc::new(FsBackend::open(path)?),
            None => Arc::new(MemoryBackend::new()),
        };
        let store = Arc::new(CommitStore::new(backend));
        let refs = Arc::new(RefTable::open(Arc::clone(&store))?);
        Ok(Self::assemble(config.clone(), store, refs))
    }

    /// An ephemeral repository with default configuration.
    pub fn in_memory() -> Self {
        let store = Arc::new(CommitStore::in_memory());
        let refs = Arc::new(RefTable::new(Arc::clone(&store)));
        Self::assemble(LoomConfig::default(), store, refs)
    }

    fn assemble(config: LoomConfig, store: Arc<CommitStore>, refs: Arc<RefTable>) -> Self {
        let content: Arc<dyn ContentMerger> = Arc::new(LineMerger);
        let rewriter = Arc::new(HistoryRewriter::new(
            Arc::clone(&store),
            refs.clone(),
            Arc::clone(&content),
        ));
        let merger = Arc::new(Merger::new(Arc::clone(&store), refs.clone(), content));
        Self {
            dag: AncestryEngine::new(Arc::clone(&store)),
            config,
            store,
            refs,
            rewriter,
            merger,
            sync: None,
        }
    }

    /// Enable remote operations over `transport`.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        let sync = RemoteSync::new(
            Arc::clone(&self.store),
            self.refs.clone(),
            Arc::clone(&self.rewriter),
            Arc::clone(&self.merger),
            transport,
        )
        .with_options(self.config.sync.options());
        self.sync = Some(sync);
        self
    }

    // ---- Accessors ----

    pub fn config(&self) -> &LoomConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<CommitStore> {
        &self.store
    }

    pub fn refs(&self) -> &Arc<RefTable> {
        &self.refs
    }

    pub fn ancestry(&self) -> &AncestryEngine {
        &self.dag
    }

    pub fn rewriter(&self) -> &HistoryRewriter {
        &self.rewriter
    }

    pub fn merger(&self) -> &Merger {
        &self.merger
    }

    pub fn sync(&self) -> SdkResult<&RemoteSync> {
        self.sync.as_ref().ok_or(SdkError::SyncUnavailable)
    }

    // ---- History ----

    /// Record `payload` on top of `branch` and advance it.
    ///
    /// `branch` is a short name, a canonical local ref or `HEAD`. The first
    /// commit on an unborn branch is a root. The ref moves by compare-and-swap
    /// against the tip that was read, so a concurrent writer makes this fail
    /// with a ref conflict rather than lose its commit.
    pub fn commit(&self, branch: &str, payload: impl Into<Vec<u8>>) -> SdkResult<CommitId> {
        let name = qualify(branch);
        if let RefKind::RemoteTracking { .. } = classify(&name)? {
            return Err(RefError::InvalidRefName {
                name,
                reason: "remote-tracking refs cannot be committed to".into(),
            }
            .into());
        }
        let parent = self.refs.read(&name)?;
        let parents: Vec<CommitId> = parent.into_iter().collect();
        let id = self.store.create(&parents, payload)?;
        self.refs.write(&name, id, RefExpectation::from_current(parent))?;
        info!(name = %name, commit = %id.short_hex(), "committed");
        Ok(id)
    }

    /// Up to `limit` commits reachable from `name`, newest first.
    pub fn log(&self, name: &str, limit: usize) -> SdkResult<Vec<Arc<Commit>>> {
        let name = qualify(name);
        let tip = self.refs.read(&name)?.ok_or(RefError::NotFound { name })?;
        Ok(self.dag.ancestors(&tip, limit)?)
    }

    // ---- Remotes (default remote) ----

    pub async fn fetch(&self) -> SdkResult<FetchResult> {
        let remote = &self.config.sync.default_remote;
        Ok(self.sync()?.fetch(remote, &[]).await?)
    }

    pub async fn push(&self, branch: &str) -> SdkResult<PushResult> {
        let remote = &self.config.sync.default_remote;
        let name = qualify(branch);
        Ok(self.sync()?.push(remote, &RefSpec::new(name.clone(), name)).await?)
    }

    pub async fn pull(&self, branch: &str, strategy: PullStrategy) -> SdkResult<PullResult> {
        let remote = &self.config.sync.default_remote;
        let name = qualify(branch);
        Ok(self
            .sync()?
            .pull(remote, &RefSpec::new(name.clone(), name), strategy)
            .await?)
    }
}

fn qualify(name: &str) -> String {
    if name == HEAD || name.starts_with("refs/") {
        name.to_string()
    } else {
        local_ref(name)
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("storage", &self.config.storage.path)
            .field("commits", &self.store.cached_len())
            .field("sync", &self.sync.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_rewrite::ResetMode;
    use loom_sync::{LoopbackTransport, MergeStatus, SyncError};
    use loom_types::ErrorKind;

    fn connected() -> (Repository, Repository) {
        let remote = Repository::in_memory();
        let transport = LoopbackTransport::new().with_remote(
            "origin",
            Arc::clone(remote.store()),
            remote.refs().clone(),
        );
        let local = Repository::in_memory().with_transport(Arc::new(transport));
        (local, remote)
    }

    #[test]
    fn commits_chain_on_a_branch() {
        let repo = Repository::in_memory();
        let a = repo.commit("main", "a\n").unwrap();
        let b = repo.commit("main", "b\n").unwrap();
        let c = repo.commit(HEAD, "c\n").unwrap();

        let log = repo.log("main", 10).unwrap();
        let ids: Vec<CommitId> = log.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![c, b, a]);
        assert!(log[2].is_root());
        assert_eq!(repo.log("main", 2).unwrap().len(), 2);
        assert_eq!(repo.refs().resolve_head().unwrap(), c);
    }

    #[test]
    fn cannot_commit_to_tracking_ref_or_log_unborn_branch() {
        let repo = Repository::in_memory();
        let err = repo.commit("refs/remotes/origin/main", "x").unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::InvalidRef));
        let err = repo.log("nothing", 5).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::NotFound));
    }

    #[test]
    fn reset_moves_branch_and_keeps_commits() {
        let repo = Repository::in_memory();
        let c1 = repo.commit("main", "one\n").unwrap();
        let c2 = repo.commit("main", "two\n").unwrap();
        let c3 = repo.commit("main", "three\n").unwrap();

        let previous = repo.rewriter().reset("refs/heads/main", &c1, ResetMode::Hard).unwrap();
        assert_eq!(previous, Some(c3));
        assert_eq!(repo.refs().read("refs/heads/main").unwrap(), Some(c1));
        assert!(repo.store().exists(&c2).unwrap());
        assert!(repo.store().exists(&c3).unwrap());
    }

    #[test]
    fn persisted_repository_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoomConfig::from_toml_str(&format!(
            "[storage]\npath = {:?}\n",
            dir.path().display().to_string()
        ))
        .unwrap();

        let (a, b) = {
            let repo = Repository::open(&config).unwrap();
            let a = repo.commit("main", "a\n").unwrap();
            repo.commit("dev", "side\n").unwrap();
            let b = repo.commit("main", "b\n").unwrap();
            (a, b)
        };

        let reopened = Repository::open(&config).unwrap();
        let ids: Vec<CommitId> = reopened.log("main", 10).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![b, a]);
        assert_eq!(reopened.refs().branches().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn sync_requires_transport() {
        let repo = Repository::in_memory();
        assert!(matches!(repo.fetch().await, Err(SdkError::SyncUnavailable)));
    }

    #[tokio::test]
    async fn push_then_stale_push_is_rejected() {
        let (local, remote) = connected();
        let m1 = local.commit("main", "m1\n").unwrap();
        local.refs().write("refs/heads/feature", m1, RefExpectation::Absent).unwrap();
        let f1 = local.commit("feature", "f1\n").unwrap();

        local.push("feature").await.unwrap();
        assert_eq!(remote.refs().read("refs/heads/feature").unwrap(), Some(f1));

        // The remote branch is replaced by history the local side never saw.
        remote.refs().write("refs/heads/feature", m1, RefExpectation::Force).unwrap();
        let f2 = remote.commit("feature", "f2\n").unwrap();

        let err = local.push("feature").await.unwrap_err();
        assert!(matches!(err, SdkError::Sync(SyncError::NonFastForward { .. })));
        assert_eq!(err.kind(), Some(ErrorKind::NonFastForward));
        assert_eq!(remote.refs().read("refs/heads/feature").unwrap(), Some(f2));
    }

    #[tokio::test]
    async fn pull_brings_in_remote_work() {
        let (local, remote) = connected();
        let base = remote.commit("main", "base\n").unwrap();
        let next = remote.commit("main", "next\n").unwrap();

        let pulled = local.pull("main", PullStrategy::Merge).await.unwrap();
        assert_eq!(pulled.status, MergeStatus::FastForward);
        assert_eq!(pulled.tip, next);
        assert!(local.store().exists(&base).unwrap());

        let fetched = local.fetch().await.unwrap();
        assert_eq!(fetched.commits_received, 0);
        let descriptor = local.sync().unwrap().remote("origin").unwrap().unwrap();
        assert_eq!(descriptor.branches, vec![("main".to_string(), next)]);
    }
}
