//! High-level SDK for Loom.
//!
//! [`Repository`] wires the commit store, ref table, ancestry engine,
//! history rewriter, merger and (optionally) remote sync into one handle.
//! [`LoomConfig`] is read from TOML and [`telemetry::init`] installs the
//! `tracing` subscriber an embedding process should use.

pub mod config;
pub mod error;
pub mod repository;
pub mod telemetry;

pub use config::{LogConfig, LoomConfig, StorageConfig, SyncConfig};
pub use error::{SdkError, SdkResult};
pub use repository::Repository;

// Re-export key types
pub use loom_merge::MergeResult;
pub use loom_refs::{Head, RefExpectation};
pub use loom_rewrite::{RebaseOutcome, ResetMode};
pub use loom_store::Commit;
pub use loom_sync::{LoopbackTransport, PullStrategy, RefSpec, Transport};
pub use loom_types::{CommitId, ErrorKind};
