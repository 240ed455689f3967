use thiserror::Error;

use loom_types::ErrorKind;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("telemetry error: {0}")]
    Telemetry(String),

    #[error("no remote transport configured")]
    SyncUnavailable,

    #[error("store error: {0}")]
    Store(#[from] loom_store::StoreError),

    #[error("ref error: {0}")]
    Ref(#[from] loom_refs::RefError),

    #[error("ancestry error: {0}")]
    Dag(#[from] loom_dag::DagError),

    #[error("rewrite error: {0}")]
    Rewrite(#[from] loom_rewrite::RewriteError),

    #[error("merge error: {0}")]
    Merge(#[from] loom_merge::MergeError),

    #[error("sync error: {0}")]
    Sync(#[from] loom_sync::SyncError),
}

impl SdkError {
    /// The engine error kind, or `None` for setup failures that happen
    /// before any engine is involved.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Config(_) | Self::Telemetry(_) | Self::SyncUnavailable => None,
            Self::Store(e) => Some(e.kind()),
            Self::Ref(e) => Some(e.kind()),
            Self::Dag(e) => Some(e.kind()),
            Self::Rewrite(e) => Some(e.kind()),
            Self::Merge(e) => Some(e.kind()),
            Self::Sync(e) => Some(e.kind()),
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
