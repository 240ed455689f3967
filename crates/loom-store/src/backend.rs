//! Storage backend interface and the in-memory implementation.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use loom_types::CommitId;

use crate::error::StoreResult;

/// Persistence for commit bytes and ref bindings across process restarts.
///
/// Implementations must be thread-safe. `persist` must be idempotent: the
/// same id is always written with the same bytes, so a second write may be
/// skipped. The backend never interprets commit bytes or ref semantics;
/// HEAD is stored as an opaque string chosen by the ref layer.
pub trait StorageBackend: Send + Sync {
    /// Store the encoded bytes of a commit.
    fn persist(&self, id: &CommitId, bytes: &[u8]) -> StoreResult<()>;

    /// Load the encoded bytes of a commit. `Ok(None)` if absent.
    fn load(&self, id: &CommitId) -> StoreResult<Option<Vec<u8>>>;

    /// Record that `name` points at `id`.
    fn persist_ref(&self, name: &str, id: &CommitId) -> StoreResult<()>;

    /// Forget a ref binding. Removing an absent ref is not an error.
    fn remove_ref(&self, name: &str) -> StoreResult<()>;

    /// All persisted ref bindings.
    fn load_refs(&self) -> StoreResult<BTreeMap<String, CommitId>>;

    /// Record the encoded HEAD state.
    fn persist_head(&self, head: &str) -> StoreResult<()>;

    /// The encoded HEAD state, if one was ever persisted.
    fn load_head(&self) -> StoreResult<Option<String>>;
}

/// Backend that keeps everything in memory. Data is lost on drop.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: RwLock<HashMap<CommitId, Vec<u8>>>,
    refs: RwLock<BTreeMap<String, CommitId>>,
    head: RwLock<Option<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted commit records.
    pub fn object_count(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }
}

impl StorageBackend for MemoryBackend {
    fn persist(&self, id: &CommitId, bytes: &[u8]) -> StoreResult<()> {
        let mut objects = self.objects.write().expect("lock poisoned");
        objects.entry(*id).or_insert_with(|| bytes.to_vec());
        Ok(())
    }

    fn load(&self, id: &CommitId) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.objects.read().expect("lock poisoned").get(id).cloned())
    }

    fn persist_ref(&self, name: &str, id: &CommitId) -> StoreResult<()> {
        self.refs
            .write()
            .expect("lock poisoned")
            .insert(name.to_string(), *id);
        Ok(())
    }

    fn remove_ref(&self, name: &str) -> StoreResult<()> {
        self.refs.write().expect("lock poisoned").remove(name);
        Ok(())
    }

    fn load_refs(&self) -> StoreResult<BTreeMap<String, CommitId>> {
        Ok(self.refs.read().expect("lock poisoned").clone())
    }

    fn persist_head(&self, head: &str) -> StoreResult<()> {
        *self.head.write().expect("lock poisoned") = Some(head.to_string());
        Ok(())
    }

    fn load_head(&self) -> StoreResult<Option<String>> {
        Ok(self.head.read().expect("lock poisoned").clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(b: u8) -> CommitId {
        CommitId::from_hash([b; 32])
    }

    #[test]
    fn persist_is_idempotent() {
        let backend = MemoryBackend::new();
        backend.persist(&id(1), b"first").unwrap();
        backend.persist(&id(1), b"second").unwrap();
        assert_eq!(backend.object_count(), 1);
        assert_eq!(backend.load(&id(1)).unwrap().unwrap(), b"first");
    }

    #[test]
    fn load_missing_is_none() {
        let backend = MemoryBackend::new();
        assert!(backend.load(&id(7)).unwrap().is_none());
    }

    #[test]
    fn refs_roundtrip() {
        let backend = MemoryBackend::new();
        backend.persist_ref("refs/heads/main", &id(1)).unwrap();
        backend.persist_ref("refs/heads/dev", &id(2)).unwrap();
        backend.remove_ref("refs/heads/dev").unwrap();
        backend.remove_ref("refs/heads/never").unwrap();

        let refs = backend.load_refs().unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs["refs/heads/main"], id(1));
    }

    #[test]
    fn head_roundtrip() {
        let backend = MemoryBackend::new();
        assert!(backend.load_head().unwrap().is_none());
        backend.persist_head("ref: refs/heads/main").unwrap();
        assert_eq!(
            backend.load_head().unwrap().as_deref(),
            Some("ref: refs/heads/main")
        );
    }
}
