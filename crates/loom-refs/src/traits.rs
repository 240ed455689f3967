//! The [`RefStore`] trait defining the reference storage interface.

use loom_types::CommitId;

use crate::error::{RefError, RefResult};
use crate::names::{LOCAL_PREFIX, REMOTE_PREFIX};
use crate::types::{Head, RefExpectation};

/// Storage for named, mutable pointers into the commit graph.
///
/// Implementations must be thread-safe. Compare-and-swap [`write`] and
/// [`delete`] are the only mutation primitives: concurrent writers to the
/// same name race, and exactly one wins per attempt. A ref always resolves
/// to an existing commit or is absent.
///
/// The name `HEAD` is accepted by `read` and `write` and resolves through at
/// most one indirection to the branch HEAD is attached to.
///
/// [`write`]: RefStore::write
/// [`delete`]: RefStore::delete
pub trait RefStore: Send + Sync {
    /// Read a ref by canonical name. `Ok(None)` if it does not exist.
    fn read(&self, name: &str) -> RefResult<Option<CommitId>>;

    /// Point `name` at `id` if its current value satisfies `expected`.
    fn write(&self, name: &str, id: CommitId, expected: RefExpectation) -> RefResult<()>;

    /// Remove `name` if its current value satisfies `expected`.
    ///
    /// Returns `true` if a binding was removed.
    fn delete(&self, name: &str, expected: RefExpectation) -> RefResult<bool>;

    /// Snapshot of every ref whose canonical name starts with `prefix`,
    /// sorted by name.
    fn list(&self, prefix: &str) -> RefResult<Vec<(String, CommitId)>>;

    /// The current HEAD state.
    fn head(&self) -> RefResult<Head>;

    /// Replace the HEAD state.
    fn set_head(&self, head: Head) -> RefResult<()>;

    /// The commit HEAD currently resolves to.
    fn resolve_head(&self) -> RefResult<CommitId> {
        match self.head()? {
            Head::Detached(id) => Ok(id),
            Head::Attached(branch) => self
                .read(&branch)?
                .ok_or(RefError::NotFound { name: branch }),
        }
    }

    /// All local branches.
    fn branches(&self) -> RefResult<Vec<(String, CommitId)>> {
        self.list(LOCAL_PREFIX)
    }

    /// All remote names that own at least one remote-tracking ref.
    fn remotes(&self) -> RefResult<Vec<String>> {
        let mut remotes: Vec<String> = self
            .list(REMOTE_PREFIX)?
            .iter()
            .filter_map(|(name, _)| {
                let rest = name.strip_prefix(REMOTE_PREFIX)?;
                let remote = rest.split('/').next()?;
                Some(remote.to_string())
            })
            .collect();
        remotes.sort();
        remotes.dedup();
        Ok(remotes)
    }
}
