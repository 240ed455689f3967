//! In-process [`Transport`] serving other repositories' stores.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use loom_refs::{RefError, RefExpectation, RefStore};
use loom_store::{Commit, CommitStore, StoreError};
use loom_types::CommitId;

use crate::error::{SyncError, SyncResult};
use crate::transport::Transport;
use crate::types::RefUpdate;

/// A repository reachable through a [`LoopbackTransport`].
#[derive(Clone)]
pub struct Peer {
    pub store: Arc<CommitStore>,
    pub refs: Arc<dyn RefStore>,
}

/// Transport whose remotes are repositories in the same process.
///
/// An optional latency is slept before every call.
#[derive(Clone, Default)]
pub struct LoopbackTransport {
    peers: HashMap<String, Peer>,
    latency: Option<Duration>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `store`/`refs` under the remote name `name`.
    pub fn with_remote(mut self, name: impl Into<String>, store: Arc<CommitStore>, refs: Arc<dyn RefStore>) -> Self {
        self.peers.insert(name.into(), Peer { store, refs });
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn peer(&self, remote: &str) -> SyncResult<&Peer> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.peers
            .get(remote)
            .ok_or_else(|| SyncError::TransportError(format!("unknown remote: {remote}")))
    }
}

fn remote_failure(e: impl std::fmt::Display) -> SyncError {
    SyncError::TransportError(format!("remote failure: {e}"))
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn list_refs(&self, remote: &str) -> SyncResult<Vec<(String, CommitId)>> {
        let peer = self.peer(remote).await?;
        peer.refs.branches().map_err(remote_failure)
    }

    async fn fetch_commits(&self, remote: &str, wants: &[CommitId]) -> SyncResult<Vec<Commit>> {
        let peer = self.peer(remote).await?;
        let mut out = Vec::with_capacity(wants.len());
        for id in wants {
            match peer.store.get(id) {
                Ok(commit) => out.push((*commit).clone()),
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(remote_failure(e)),
            }
        }
        debug!(remote, requested = wants.len(), served = out.len(), "loopback served commits");
        Ok(out)
    }

    async fn remote_tip(&self, remote: &str, name: &str) -> SyncResult<Option<CommitId>> {
        let peer = self.peer(remote).await?;
        peer.refs.read(name).map_err(remote_failure)
    }

    async fn upload(&self, remote: &str, update: &RefUpdate, force: bool, commits: Vec<Commit>) -> SyncResult<()> {
        let peer = self.peer(remote).await?;
        for commit in commits {
            peer.store.insert(commit).map_err(remote_failure)?;
        }
        let expected = if force {
            RefExpectation::Force
        } else {
            RefExpectation::from_current(update.old)
        };
        match peer.refs.write(&update.name, update.new, expected) {
            Ok(()) => Ok(()),
            Err(e @ RefError::RefConflict { .. }) => Err(SyncError::RefRejected {
                name: update.name.clone(),
                reason: e.to_string(),
            }),
            Err(e) => Err(remote_failure(e)),
        }
    }
}

impl std::fmt::Debug for LoopbackTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.peers.keys().collect();
        names.sort();
        f.debug_struct("LoopbackTransport")
            .field("remotes", &names)
            .field("latency", &self.latency)
            .finish()
    }
}
