//! The [`RemoteSync`] engine: fetch, push and pull.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::time::timeout;
use tracing::{debug, info};

use loom_dag::AncestryEngine;
use loom_merge::{MergeResult, Merger};
use loom_refs::{
    classify, local_ref, remote_tracking_ref, validate_remote_name, RefError, RefExpectation, RefKind, RefStore,
    HEAD,
};
use loom_rewrite::HistoryRewriter;
use loom_store::{Commit, CommitStore};
use loom_types::CommitId;

use crate::error::{SyncError, SyncResult};
use crate::negotiation::NegotiationEngine;
use crate::transport::Transport;
use crate::types::{
    FetchResult, MergeStatus, PullResult, PullStrategy, PushResult, RefSpec, RefUpdate, RemoteDescriptor,
    SyncOptions,
};

/// Reconciles local refs with remotes reached through a [`Transport`].
///
/// Remote-tracking refs (`refs/remotes/<remote>/<branch>`) are only ever
/// moved here, and always by force: the remote is authoritative for them.
pub struct RemoteSync {
    store: Arc<CommitStore>,
    refs: Arc<dyn RefStore>,
    dag: AncestryEngine,
    rewriter: Arc<HistoryRewriter>,
    merger: Arc<Merger>,
    transport: Arc<dyn Transport>,
    options: SyncOptions,
}

impl RemoteSync {
    pub fn new(
        store: Arc<CommitStore>,
        refs: Arc<dyn RefStore>,
        rewriter: Arc<HistoryRewriter>,
        merger: Arc<Merger>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            dag: AncestryEngine::new(Arc::clone(&store)),
            store,
            refs,
            rewriter,
            merger,
            transport,
            options: SyncOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Run one transport call under the configured timeout.
    async fn call<T>(&self, operation: &'static str, fut: impl Future<Output = SyncResult<T>>) -> SyncResult<T> {
        match timeout(self.options.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::TransportTimeout {
                operation,
                after: self.options.timeout,
            }),
        }
    }

    // ---------------------------------------------------------------
    // Remotes
    // ---------------------------------------------------------------

    /// The remote `name` as described by its remote-tracking refs.
    pub fn remote(&self, name: &str) -> SyncResult<Option<RemoteDescriptor>> {
        validate_remote_name(name)?;
        let prefix = remote_tracking_ref(name, "");
        let branches: Vec<(String, CommitId)> = self
            .refs
            .list(&prefix)?
            .into_iter()
            .filter_map(|(ref_name, id)| Some((ref_name.strip_prefix(&prefix)?.to_string(), id)))
            .collect();
        if branches.is_empty() {
            return Ok(None);
        }
        Ok(Some(RemoteDescriptor {
            name: name.to_string(),
            branches,
        }))
    }

    /// Every remote that has at least one remote-tracking ref.
    pub fn remotes(&self) -> SyncResult<Vec<String>> {
        Ok(self.refs.remotes()?)
    }

    // ---------------------------------------------------------------
    // Fetch
    // ---------------------------------------------------------------

    /// Where a fetched remote ref lands locally, if `spec` selects it.
    fn tracking_target(remote: &str, spec: &RefSpec, name: &str) -> SyncResult<Option<String>> {
        let Some(mapped) = spec.map(name) else {
            return Ok(None);
        };
        let invalid = |reason: String| SyncError::InvalidRefSpec {
            spec: spec.to_string(),
            reason,
        };
        match classify(&mapped).map_err(|e| invalid(e.to_string()))? {
            RefKind::RemoteTracking { remote: owner, .. } if owner == remote => Ok(Some(mapped)),
            RefKind::Local { branch } => Ok(Some(remote_tracking_ref(remote, &branch))),
            _ => Err(invalid(format!("{mapped} is not a tracking ref of {remote}"))),
        }
    }

    /// Download what `refspecs` select from `remote` and force-update the
    /// matching remote-tracking refs. An empty slice fetches every branch.
    pub async fn fetch(&self, remote: &str, refspecs: &[RefSpec]) -> SyncResult<FetchResult> {
        let (result, _) = self.fetch_selected(remote, refspecs).await?;
        Ok(result)
    }

    /// [`fetch`](Self::fetch), also returning every `(tracking ref, tip)`
    /// the remote advertised for `refspecs` in this round.
    async fn fetch_selected(
        &self,
        remote: &str,
        refspecs: &[RefSpec],
    ) -> SyncResult<(FetchResult, Vec<(String, CommitId)>)> {
        validate_remote_name(remote)?;
        let default_spec = [RefSpec::fetch_all(remote)];
        let refspecs = if refspecs.is_empty() { &default_spec[..] } else { refspecs };

        let advertised = self.call("list_refs", self.transport.list_refs(remote)).await?;
        let mut selected: Vec<(String, CommitId)> = Vec::new();
        for (name, id) in &advertised {
            for spec in refspecs {
                if let Some(target) = Self::tracking_target(remote, spec, name)? {
                    selected.push((target, *id));
                    break;
                }
            }
        }
        debug!(remote, advertised = advertised.len(), selected = selected.len(), "negotiated refs");

        let commits_received = self.download(remote, &selected).await?;

        let mut refs_updated = Vec::new();
        for (name, id) in &selected {
            let old = self.refs.read(name)?;
            if old == Some(*id) {
                continue;
            }
            self.refs.write(name, *id, RefExpectation::Force)?;
            refs_updated.push(RefUpdate {
                name: name.clone(),
                old,
                new: *id,
            });
        }

        info!(remote, commits = commits_received, refs = refs_updated.len(), "fetch complete");
        let result = FetchResult {
            commits_received,
            refs_updated,
        };
        Ok((result, selected))
    }

    /// Request missing commits until the history of every selected tip is
    /// complete, then admit them parents first.
    ///
    /// A short batch is followed by another request for what is still
    /// missing. A round that delivers none of the wanted commits ends the
    /// fetch with [`SyncError::IncompleteFetch`].
    async fn download(&self, remote: &str, selected: &[(String, CommitId)]) -> SyncResult<usize> {
        let mut wants = NegotiationEngine::compute_wants(&self.store, selected)?;
        let mut received: HashMap<CommitId, Commit> = HashMap::new();

        while !wants.is_empty() {
            let batch = self.call("fetch_commits", self.transport.fetch_commits(remote, &wants)).await?;
            for commit in batch {
                commit.verify()?;
                received.insert(commit.id, commit);
            }
            let mut missing: Vec<CommitId> =
                wants.iter().filter(|id| !received.contains_key(id)).copied().collect();
            if missing.len() == wants.len() {
                return Err(SyncError::IncompleteFetch { missing });
            }
            missing.extend(NegotiationEngine::missing_parents(&self.store, &received)?);
            missing.sort();
            missing.dedup();
            wants = missing;
            debug!(remote, received = received.len(), next = wants.len(), "fetch round");
        }

        let count = received.len();
        for commit in NegotiationEngine::parent_first(received) {
            self.store.insert(commit)?;
        }
        Ok(count)
    }

    // ---------------------------------------------------------------
    // Push
    // ---------------------------------------------------------------

    /// Short branch names become `refs/heads/<name>`.
    fn qualify(name: &str) -> String {
        if name == HEAD || name.starts_with("refs/") {
            name.to_string()
        } else {
            local_ref(name)
        }
    }

    fn branch_of(spec: &RefSpec, name: &str) -> SyncResult<String> {
        match classify(name)? {
            RefKind::Local { branch } => Ok(branch),
            _ => Err(SyncError::InvalidRefSpec {
                spec: spec.to_string(),
                reason: format!("{name} is not a branch"),
            }),
        }
    }

    fn exact(spec: &RefSpec) -> SyncResult<()> {
        if spec.is_glob() {
            return Err(SyncError::InvalidRefSpec {
                spec: spec.to_string(),
                reason: "patterns are not supported here".into(),
            });
        }
        Ok(())
    }

    /// Send local `spec.src` to the remote's `spec.dst`.
    ///
    /// Refused with [`SyncError::NonFastForward`] unless the remote tip is a
    /// known ancestor of the local tip or the spec is forced.
    pub async fn push(&self, remote: &str, spec: &RefSpec) -> SyncResult<PushResult> {
        validate_remote_name(remote)?;
        Self::exact(spec)?;
        let src = Self::qualify(&spec.src);
        let dst = Self::qualify(&spec.dst);
        let branch = Self::branch_of(spec, &dst)?;

        let local_tip = self.refs.read(&src)?.ok_or(RefError::NotFound { name: src.clone() })?;
        let remote_tip = self.call("remote_tip", self.transport.remote_tip(remote, &dst)).await?;

        let tracking = remote_tracking_ref(remote, &branch);
        let update = RefUpdate {
            name: dst.clone(),
            old: remote_tip,
            new: local_tip,
        };
        if remote_tip == Some(local_tip) {
            self.refs.write(&tracking, local_tip, RefExpectation::Force)?;
            debug!(remote, name = %dst, "remote already up to date");
            return Ok(PushResult {
                commits_sent: 0,
                update,
            });
        }

        if let Some(remote_tip) = remote_tip {
            let fast_forward =
                self.store.exists(&remote_tip)? && self.dag.can_fast_forward(&remote_tip, &local_tip)?;
            if !fast_forward && !spec.force {
                return Err(SyncError::NonFastForward {
                    name: dst,
                    local: local_tip,
                    remote: remote_tip,
                });
            }
        }

        // The remote already holds its advertised tips and everything below them.
        let mut excluded: Vec<CommitId> = remote_tip.into_iter().collect();
        excluded.extend(
            self.refs
                .list(&remote_tracking_ref(remote, ""))?
                .into_iter()
                .map(|(_, id)| id),
        );
        let commits: Vec<Commit> = self
            .dag
            .exclusive_history(&local_tip, &excluded)?
            .iter()
            .map(|c| Commit::clone(c))
            .collect();
        let commits_sent = commits.len();
        self.call("upload", self.transport.upload(remote, &update, spec.force, commits))
            .await?;
        self.refs.write(&tracking, local_tip, RefExpectation::Force)?;

        info!(remote, name = %dst, commits = commits_sent, forced = spec.force, "push complete");
        Ok(PushResult { commits_sent, update })
    }

    // ---------------------------------------------------------------
    // Pull
    // ---------------------------------------------------------------

    /// Fetch the remote's `spec.src` and integrate it into local `spec.dst`.
    pub async fn pull(&self, remote: &str, spec: &RefSpec, strategy: PullStrategy) -> SyncResult<PullResult> {
        validate_remote_name(remote)?;
        Self::exact(spec)?;
        let src = Self::qualify(&spec.src);
        let local = Self::qualify(&spec.dst);
        let branch = Self::branch_of(spec, &src)?;
        if classify(&local)?.is_remote_tracking() {
            return Err(SyncError::InvalidRefSpec {
                spec: spec.to_string(),
                reason: format!("{local} is not a local branch"),
            });
        }

        let (fetch, selected) = self
            .fetch_selected(remote, &[RefSpec::forced(src.clone(), src.clone())])
            .await?;
        let tracking = remote_tracking_ref(remote, &branch);
        let upstream = selected
            .iter()
            .find(|(name, _)| *name == tracking)
            .map(|(_, id)| *id)
            .ok_or(SyncError::RemoteRefNotFound { name: src })?;

        let Some(local_tip) = self.refs.read(&local)? else {
            self.refs.write(&local, upstream, RefExpectation::Absent)?;
            info!(remote, name = %local, tip = %upstream.short_hex(), "pull created branch");
            return Ok(PullResult {
                fetch,
                status: MergeStatus::FastForward,
                tip: upstream,
            });
        };

        let (tip, status) = match strategy {
            PullStrategy::Rebase => {
                let outcome = self.rewriter.rebase(&upstream, &local_tip)?;
                let status = if !outcome.is_noop() {
                    MergeStatus::Rebased {
                        replayed: outcome.replayed.len(),
                    }
                } else if outcome.tip == local_tip {
                    MergeStatus::UpToDate
                } else {
                    MergeStatus::FastForward
                };
                (outcome.tip, status)
            }
            PullStrategy::Merge => {
                let result = self.merger.merge_commits(&local_tip, &upstream)?;
                let status = match &result {
                    MergeResult::UpToDate { .. } => MergeStatus::UpToDate,
                    MergeResult::FastForward { .. } => MergeStatus::FastForward,
                    MergeResult::Merged { commit, .. } => MergeStatus::Merged { commit: *commit },
                };
                (result.tip(), status)
            }
        };

        if tip != local_tip {
            self.refs.write(&local, tip, RefExpectation::Is(local_tip))?;
        }
        info!(remote, name = %local, ?strategy, ?status, tip = %tip.short_hex(), "pull complete");
        Ok(PullResult { fetch, status, tip })
    }
}

impl std::fmt::Debug for RemoteSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSync")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
