//! The [`RefTable`]: a lock-protected ref map with write-through persistence.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use tracing::{debug, info};

use loom_store::{CommitStore, StorageBackend};
use loom_types::CommitId;

use crate::error::{RefError, RefResult};
use crate::names::classify;
use crate::traits::RefStore;
use crate::types::{Head, RefExpectation, RefKind, HEAD};

#[derive(Debug, Default)]
struct RefState {
    refs: BTreeMap<String, CommitId>,
    head: Head,
}

/// Where a write to a name actually lands after resolving HEAD.
enum Target {
    Ref(String),
    DetachedHead,
}

/// [`RefStore`] over an in-memory map, persisted through the commit
/// store's [`StorageBackend`].
///
/// Refs and HEAD share one `RwLock`, so a write through an attached HEAD is
/// atomic with respect to HEAD being re-pointed. Each CAS holds the write
/// lock only for the comparison, the backend write and the map update.
pub struct RefTable {
    state: RwLock<RefState>,
    commits: Arc<CommitStore>,
    backend: Arc<dyn StorageBackend>,
}

impl RefTable {
    /// Create an empty table with HEAD attached to `refs/heads/main`.
    pub fn new(commits: Arc<CommitStore>) -> Self {
        let backend = Arc::clone(commits.backend());
        Self {
            state: RwLock::new(RefState::default()),
            commits,
            backend,
        }
    }

    /// Restore refs and HEAD from the commit store's backend.
    ///
    /// Every restored ref must resolve to a commit the store can load.
    pub fn open(commits: Arc<CommitStore>) -> RefResult<Self> {
        let table = Self::new(commits);
        let refs = table.backend.load_refs()?;
        for (name, id) in &refs {
            classify(name)?;
            table.ensure_exists(name, id)?;
        }
        let head = match table.backend.load_head()? {
            Some(encoded) => Head::decode(&encoded)?,
            None => Head::default(),
        };
        table.validate_head(&head)?;
        debug!(refs = refs.len(), head = %head.encode(), "restored ref table");
        {
            let mut state = table.lock_write()?;
            state.refs = refs;
            state.head = head;
        }
        Ok(table)
    }

    fn lock_write(&self) -> RefResult<RwLockWriteGuard<'_, RefState>> {
        self.state.write().map_err(|_| RefError::LockPoisoned)
    }

    fn ensure_exists(&self, name: &str, id: &CommitId) -> RefResult<()> {
        if !self.commits.exists(id)? {
            return Err(RefError::DanglingTarget {
                name: name.to_string(),
                id: *id,
            });
        }
        Ok(())
    }

    /// HEAD may only attach to a local branch or detach at a stored commit.
    fn validate_head(&self, head: &Head) -> RefResult<()> {
        match head {
            Head::Attached(name) => match classify(name) {
                Ok(RefKind::Local { .. }) => Ok(()),
                Ok(RefKind::Head) => Err(RefError::InvalidHead {
                    reason: "HEAD cannot point at itself".into(),
                }),
                Ok(RefKind::RemoteTracking { .. }) => Err(RefError::InvalidHead {
                    reason: format!("{name} is a remote-tracking ref"),
                }),
                Err(e) => Err(RefError::InvalidHead {
                    reason: e.to_string(),
                }),
            },
            Head::Detached(id) => self.ensure_exists(HEAD, id),
        }
    }

    fn resolve_target(state: &RefState, name: &str) -> RefResult<Target> {
        match classify(name)? {
            RefKind::Head => match &state.head {
                Head::Attached(branch) => Ok(Target::Ref(branch.clone())),
                Head::Detached(_) => Ok(Target::DetachedHead),
            },
            RefKind::Local { .. } | RefKind::RemoteTracking { .. } => Ok(Target::Ref(name.to_string())),
        }
    }

    fn check(name: &str, expected: RefExpectation, actual: Option<CommitId>) -> RefResult<()> {
        if expected.matches(actual) {
            return Ok(());
        }
        Err(RefError::RefConflict {
            name: name.to_string(),
            expected,
            actual,
        })
    }
}

impl RefStore for RefTable {
    fn read(&self, name: &str) -> RefResult<Option<CommitId>> {
        let state = self.state.read().map_err(|_| RefError::LockPoisoned)?;
        match Self::resolve_target(&state, name)? {
            Target::Ref(resolved) => Ok(state.refs.get(&resolved).copied()),
            Target::DetachedHead => match state.head {
                Head::Detached(id) => Ok(Some(id)),
                Head::Attached(_) => Ok(None),
            },
        }
    }

    fn write(&self, name: &str, id: CommitId, expected: RefExpectation) -> RefResult<()> {
        classify(name)?;
        self.ensure_exists(name, &id)?;

        let mut state = self.lock_write()?;
        match Self::resolve_target(&state, name)? {
            Target::Ref(resolved) => {
                let actual = state.refs.get(&resolved).copied();
                Self::check(&resolved, expected, actual)?;
                self.backend.persist_ref(&resolved, &id)?;
                state.refs.insert(resolved.clone(), id);
                info!(name = %resolved, to = %id.short_hex(), "ref updated");
            }
            Target::DetachedHead => {
                let actual = match state.head {
                    Head::Detached(current) => Some(current),
                    Head::Attached(_) => None,
                };
                Self::check(name, expected, actual)?;
                let head = Head::Detached(id);
                self.backend.persist_head(&head.encode())?;
                state.head = head;
                info!(to = %id.short_hex(), "detached HEAD moved");
            }
        }
        Ok(())
    }

    fn delete(&self, name: &str, expected: RefExpectation) -> RefResult<bool> {
        let mut state = self.lock_write()?;
        let resolved = match Self::resolve_target(&state, name)? {
            Target::Ref(resolved) => resolved,
            Target::DetachedHead => {
                return Err(RefError::InvalidHead {
                    reason: "a detached HEAD cannot be deleted".into(),
                })
            }
        };
        if state.head.branch() == Some(resolved.as_str()) {
            return Err(RefError::DeleteCurrentBranch { name: resolved });
        }
        let actual = state.refs.get(&resolved).copied();
        Self::check(&resolved, expected, actual)?;
        if actual.is_none() {
            return Ok(false);
        }
        self.backend.remove_ref(&resolved)?;
        state.refs.remove(&resolved);
        info!(name = %resolved, "ref deleted");
        Ok(true)
    }

    fn list(&self, prefix: &str) -> RefResult<Vec<(String, CommitId)>> {
        let state = self.state.read().map_err(|_| RefError::LockPoisoned)?;
        Ok(state
            .refs
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(name, id)| (name.clone(), *id))
            .collect())
    }

    fn head(&self) -> RefResult<Head> {
        let state = self.state.read().map_err(|_| RefError::LockPoisoned)?;
        Ok(state.head.clone())
    }

    fn set_head(&self, head: Head) -> RefResult<()> {
        self.validate_head(&head)?;
        let mut state = self.lock_write()?;
        self.backend.persist_head(&head.encode())?;
        debug!(head = %head.encode(), "HEAD set");
        state.head = head;
        Ok(())
    }
}

impl std::fmt::Debug for RefTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let refs = self.state.read().map(|s| s.refs.len()).unwrap_or_default();
        f.debug_struct("RefTable").field("refs", &refs).finish()
    }
}
