//! Filesystem storage backend.
//!
//! Layout under the root directory:
//!
//! ```text
//! objects/ab/cdef...   bincode commit records, named by hex id
//! refs.json            {"refs/heads/main": "<hex id>", ...}
//! HEAD                 encoded HEAD state
//! ```
//!
//! Every file is written to a temporary file in the same directory and then
//! renamed into place, so readers observe either the old or the new content.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use tracing::debug;

use loom_types::CommitId;

use crate::backend::StorageBackend;
use crate::error::{StoreError, StoreResult};

const REFS_FILE: &str = "refs.json";
const HEAD_FILE: &str = "HEAD";

/// Backend that stores commits and refs as files under a root directory.
#[derive(Debug)]
pub struct FsBackend {
    root: PathBuf,
    /// Serializes read-modify-write cycles on `refs.json`.
    refs_lock: Mutex<()>,
}

impl FsBackend {
    /// Open (or create) a backend rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("objects"))?;
        debug!(root = %root.display(), "opened filesystem backend");
        Ok(Self {
            root,
            refs_lock: Mutex::new(()),
        })
    }

    /// The root directory of this backend.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, id: &CommitId) -> PathBuf {
        let hex = id.to_hex();
        self.root.join("objects").join(&hex[..2]).join(&hex[2..])
    }

    fn read_refs_file(&self) -> StoreResult<BTreeMap<String, String>> {
        match fs::read(self.root.join(REFS_FILE)) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Serialization(format!("refs.json: {e}"))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_refs_file(&self, refs: &BTreeMap<String, String>) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(refs)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        write_atomic(&self.root.join(REFS_FILE), &bytes)
    }
}

/// Write `bytes` to `path` through a sibling temporary file and a rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

impl StorageBackend for FsBackend {
    fn persist(&self, id: &CommitId, bytes: &[u8]) -> StoreResult<()> {
        let path = self.object_path(id);
        if path.exists() {
            return Ok(());
        }
        write_atomic(&path, bytes)?;
        debug!(commit = %id.short_hex(), len = bytes.len(), "persisted commit");
        Ok(())
    }

    fn load(&self, id: &CommitId) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(self.object_path(id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn persist_ref(&self, name: &str, id: &CommitId) -> StoreResult<()> {
        let _guard = self.refs_lock.lock().expect("refs lock poisoned");
        let mut refs = self.read_refs_file()?;
        refs.insert(name.to_string(), id.to_hex());
        self.write_refs_file(&refs)
    }

    fn remove_ref(&self, name: &str) -> StoreResult<()> {
        let _guard = self.refs_lock.lock().expect("refs lock poisoned");
        let mut refs = self.read_refs_file()?;
        if refs.remove(name).is_some() {
            self.write_refs_file(&refs)?;
        }
        Ok(())
    }

    fn load_refs(&self) -> StoreResult<BTreeMap<String, CommitId>> {
        let _guard = self.refs_lock.lock().expect("refs lock poisoned");
        self.read_refs_file()?
            .into_iter()
            .map(|(name, hex)| {
                let id = CommitId::from_hex(&hex)
                    .map_err(|e| StoreError::Serialization(format!("ref {name}: {e}")))?;
                Ok((name, id))
            })
            .collect()
    }

    fn persist_head(&self, head: &str) -> StoreResult<()> {
        write_atomic(&self.root.join(HEAD_FILE), head.as_bytes())
    }

    fn load_head(&self) -> StoreResult<Option<String>> {
        match fs::read_to_string(self.root.join(HEAD_FILE)) {
            Ok(s) => Ok(Some(s.trim_end().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(b: u8) -> CommitId {
        CommitId::from_hash([b; 32])
    }

    #[test]
    fn objects_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let backend = FsBackend::open(dir.path()).unwrap();
            backend.persist(&id(0xab), b"record").unwrap();
        }
        let backend = FsBackend::open(dir.path()).unwrap();
        assert_eq!(backend.load(&id(0xab)).unwrap().unwrap(), b"record");
        assert!(dir.path().join("objects").join("ab").is_dir());
    }

    #[test]
    fn missing_object_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::open(dir.path()).unwrap();
        assert!(backend.load(&id(1)).unwrap().is_none());
    }

    #[test]
    fn refs_and_head_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let backend = FsBackend::open(dir.path()).unwrap();
            backend.persist_ref("refs/heads/main", &id(1)).unwrap();
            backend.persist_ref("refs/remotes/origin/main", &id(2)).unwrap();
            backend.remove_ref("refs/remotes/origin/main").unwrap();
            backend.persist_head("ref: refs/heads/main").unwrap();
        }
        let backend = FsBackend::open(dir.path()).unwrap();
        let refs = backend.load_refs().unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs["refs/heads/main"], id(1));
        assert_eq!(
            backend.load_head().unwrap().as_deref(),
            Some("ref: refs/heads/main")
        );
    }

    #[test]
    fn corrupt_refs_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::open(dir.path()).unwrap();
        fs::write(dir.path().join(REFS_FILE), b"not json").unwrap();
        assert!(matches!(
            backend.load_refs(),
            Err(StoreError::Serialization(_))
        ));
    }
}
