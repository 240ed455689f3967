//! The append-only commit store.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use tracing::debug;

use loom_types::CommitId;

use crate::backend::{MemoryBackend, StorageBackend};
use crate::commit::{Commit, CommitRecord};
use crate::error::{StoreError, StoreResult};

/// Append-only store of immutable commits.
///
/// Commits are cached as `Arc<Commit>` behind a `RwLock` and written through
/// to a [`StorageBackend`] before they become visible. A cache miss faults
/// the commit (and any missing ancestors) in from the backend, verifying each
/// record against its id. There is no mutation or deletion operation.
pub struct CommitStore {
    commits: RwLock<HashMap<CommitId, Arc<Commit>>>,
    backend: Arc<dyn StorageBackend>,
}

impl CommitStore {
    /// Create a store over an existing backend. Nothing is loaded eagerly.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            commits: RwLock::new(HashMap::new()),
            backend,
        }
    }

    /// Create a store backed by a fresh [`MemoryBackend`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// The backend this store writes through to.
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Number of commits currently cached.
    pub fn cached_len(&self) -> usize {
        self.commits.read().expect("lock poisoned").len()
    }

    // ---------------------------------------------------------------
    // Append
    // ---------------------------------------------------------------

    /// Create a commit and return its content-derived id.
    ///
    /// Fails with [`StoreError::InvalidParent`] if any parent is missing.
    /// Creating content that already exists is a successful no-op.
    pub fn create(&self, parents: &[CommitId], payload: impl Into<Vec<u8>>) -> StoreResult<CommitId> {
        let payload = payload.into();
        let generation = self.generation_for(parents)?;
        let id = Commit::compute_id(parents, &payload);

        if self.cached(&id).is_some() {
            debug!(commit = %id.short_hex(), "commit already present");
            return Ok(id);
        }

        let commit = Commit {
            id,
            parents: parents.to_vec(),
            payload,
            generation,
        };
        self.admit(commit)?;
        debug!(commit = %id.short_hex(), parents = parents.len(), generation, "created commit");
        Ok(id)
    }

    /// Admit a commit produced elsewhere (e.g. received from a remote).
    ///
    /// The id is recomputed from content and must match. The generation is
    /// recomputed locally and the supplied value ignored.
    pub fn insert(&self, commit: Commit) -> StoreResult<CommitId> {
        commit.verify()?;
        if self.cached(&commit.id).is_some() {
            return Ok(commit.id);
        }
        let generation = self.generation_for(&commit.parents)?;
        let id = commit.id;
        self.admit(Commit {
            generation,
            ..commit
        })?;
        debug!(commit = %id.short_hex(), generation, "inserted received commit");
        Ok(id)
    }

    /// Write-then-link: persist the record, then publish it in the cache.
    fn admit(&self, commit: Commit) -> StoreResult<()> {
        let record = CommitRecord {
            parents: commit.parents.clone(),
            payload: commit.payload.clone(),
        };
        self.backend.persist(&commit.id, &record.encode()?)?;
        let mut commits = self.commits.write().expect("lock poisoned");
        commits.entry(commit.id).or_insert_with(|| Arc::new(commit));
        Ok(())
    }

    fn generation_for(&self, parents: &[CommitId]) -> StoreResult<u64> {
        let mut max = 0;
        for parent in parents {
            let commit = self.lookup(parent)?.ok_or(StoreError::InvalidParent(*parent))?;
            max = max.max(commit.generation);
        }
        Ok(max + 1)
    }

    // ---------------------------------------------------------------
    // Read
    // ---------------------------------------------------------------

    /// Retrieve a commit. Fails with [`StoreError::NotFound`] if absent.
    pub fn get(&self, id: &CommitId) -> StoreResult<Arc<Commit>> {
        self.lookup(id)?.ok_or(StoreError::NotFound(*id))
    }

    /// Whether a commit with this id exists.
    pub fn exists(&self, id: &CommitId) -> StoreResult<bool> {
        Ok(self.lookup(id)?.is_some())
    }

    /// The payload of a commit.
    pub fn payload(&self, id: &CommitId) -> StoreResult<Vec<u8>> {
        Ok(self.get(id)?.payload.clone())
    }

    /// The payload of a commit's mainline parent, or empty for a root.
    pub fn first_parent_payload(&self, id: &CommitId) -> StoreResult<Vec<u8>> {
        match self.get(id)?.first_parent() {
            Some(parent) => self.payload(&parent),
            None => Ok(Vec::new()),
        }
    }

    fn cached(&self, id: &CommitId) -> Option<Arc<Commit>> {
        self.commits.read().expect("lock poisoned").get(id).cloned()
    }

    fn lookup(&self, id: &CommitId) -> StoreResult<Option<Arc<Commit>>> {
        if let Some(commit) = self.cached(id) {
            return Ok(Some(commit));
        }
        self.fault_in(id)
    }

    /// Load `id` and every uncached ancestor from the backend, then publish
    /// them parent-first so generations can be derived.
    fn fault_in(&self, id: &CommitId) -> StoreResult<Option<Arc<Commit>>> {
        let mut records: HashMap<CommitId, CommitRecord> = HashMap::new();
        let mut stack = vec![*id];

        while let Some(next) = stack.pop() {
            if records.contains_key(&next) || self.cached(&next).is_some() {
                continue;
            }
            let Some(bytes) = self.backend.load(&next)? else {
                if next == *id {
                    return Ok(None);
                }
                return Err(StoreError::Corrupt {
                    id: next,
                    reason: "ancestor missing from backend".into(),
                });
            };
            let record = CommitRecord::decode(&next, &bytes)?;
            stack.extend(record.parents.iter().copied());
            records.insert(next, record);
        }

        // Kahn's algorithm over the loaded subgraph.
        let mut pending: HashMap<CommitId, usize> = HashMap::new();
        let mut children: HashMap<CommitId, Vec<CommitId>> = HashMap::new();
        for (cid, record) in &records {
            let unresolved = record
                .parents
                .iter()
                .filter(|p| records.contains_key(p))
                .count();
            pending.insert(*cid, unresolved);
            for parent in record.parents.iter().filter(|p| records.contains_key(p)) {
                children.entry(*parent).or_default().push(*cid);
            }
        }
        let mut ready: VecDeque<CommitId> = pending
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(cid, _)| *cid)
            .collect();

        let mut loaded = 0usize;
        while let Some(cid) = ready.pop_front() {
            let Some(record) = records.remove(&cid) else {
                continue;
            };
            let generation = self.generation_for(&record.parents)?;
            let commit = Arc::new(Commit {
                id: cid,
                parents: record.parents,
                payload: record.payload,
                generation,
            });
            self.commits
                .write()
                .expect("lock poisoned")
                .entry(cid)
                .or_insert(commit);
            loaded += 1;

            for child in children.remove(&cid).unwrap_or_default() {
                if let Some(n) = pending.get_mut(&child) {
                    *n -= 1;
                    if *n == 0 {
                        ready.push_back(child);
                    }
                }
            }
        }

        if let Some(stuck) = records.keys().next() {
            return Err(StoreError::Corrupt {
                id: *stuck,
                reason: "cyclic parent chain in backend".into(),
            });
        }
        debug!(commit = %id.short_hex(), loaded, "faulted commits in from backend");
        Ok(self.cached(id))
    }
}

impl std::fmt::Debug for CommitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitStore")
            .field("cached", &self.cached_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use crate::fs::FsBackend;

    #[test]
    fn create_and_get_root() {
        let store = CommitStore::in_memory();
        let id = store.create(&[], b"root".to_vec()).unwrap();
        let commit = store.get(&id).unwrap();
        assert!(commit.is_root());
        assert_eq!(commit.generation, 1);
        assert_eq!(commit.payload, b"root");
    }

    #[test]
    fn generation_follows_longest_parent_chain() {
        let store = CommitStore::in_memory();
        let a = store.create(&[], b"a".to_vec()).unwrap();
        let b = store.create(&[a], b"b".to_vec()).unwrap();
        let c = store.create(&[b], b"c".to_vec()).unwrap();
        let side = store.create(&[a], b"side".to_vec()).unwrap();
        let merge = store.create(&[side, c], b"m".to_vec()).unwrap();
        assert_eq!(store.get(&merge).unwrap().generation, 4);
    }

    #[test]
    fn missing_parent_is_invalid() {
        let store = CommitStore::in_memory();
        let ghost = CommitId::from_hash([9; 32]);
        let err = store.create(&[ghost], b"x".to_vec()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidParent(p) if p == ghost));
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = CommitStore::in_memory();
        let ghost = CommitId::from_hash([1; 32]);
        assert!(matches!(store.get(&ghost), Err(StoreError::NotFound(_))));
        assert!(!store.exists(&ghost).unwrap());
    }

    #[test]
    fn duplicate_create_is_noop_success() {
        let store = CommitStore::in_memory();
        let a = store.create(&[], b"same".to_vec()).unwrap();
        let b = store.create(&[], b"same".to_vec()).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.cached_len(), 1);
    }

    #[test]
    fn concurrent_identical_creates_agree() {
        let store = Arc::new(CommitStore::in_memory());
        let root = store.create(&[], b"root".to_vec()).unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.create(&[root], b"child".to_vec()).unwrap())
            })
            .collect();
        let ids: Vec<CommitId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.cached_len(), 2);
    }

    #[test]
    fn insert_rejects_forged_commit() {
        let store = CommitStore::in_memory();
        let forged = Commit {
            id: CommitId::from_hash([3; 32]),
            parents: vec![],
            payload: b"evil".to_vec(),
            generation: 1,
        };
        assert!(matches!(
            store.insert(forged),
            Err(StoreError::HashMismatch { .. })
        ));
    }

    #[test]
    fn insert_recomputes_generation() {
        let store = CommitStore::in_memory();
        let root = store.create(&[], b"r".to_vec()).unwrap();
        let payload = b"remote".to_vec();
        let incoming = Commit {
            id: Commit::compute_id(&[root], &payload),
            parents: vec![root],
            payload,
            generation: 99,
        };
        let id = store.insert(incoming).unwrap();
        assert_eq!(store.get(&id).unwrap().generation, 2);
    }

    #[test]
    fn first_parent_payload_of_root_is_empty() {
        let store = CommitStore::in_memory();
        let root = store.create(&[], b"r".to_vec()).unwrap();
        let child = store.create(&[root], b"c".to_vec()).unwrap();
        assert!(store.first_parent_payload(&root).unwrap().is_empty());
        assert_eq!(store.first_parent_payload(&child).unwrap(), b"r");
    }

    #[test]
    fn history_faults_in_from_backend() {
        let dir = tempfile::tempdir().unwrap();
        let tip = {
            let backend = Arc::new(FsBackend::open(dir.path()).unwrap());
            let store = CommitStore::new(backend);
            let a = store.create(&[], b"a".to_vec()).unwrap();
            let b = store.create(&[a], b"b".to_vec()).unwrap();
            store.create(&[b], b"c".to_vec()).unwrap()
        };

        let backend = Arc::new(FsBackend::open(dir.path()).unwrap());
        let store = CommitStore::new(backend);
        assert_eq!(store.cached_len(), 0);
        let commit = store.get(&tip).unwrap();
        assert_eq!(commit.generation, 3);
        assert_eq!(store.cached_len(), 3);
    }
}
