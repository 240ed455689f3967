//! Content-addressed commit storage for Loom.
//!
//! The [`CommitStore`] is an append-only arena of immutable [`Commit`]
//! nodes keyed by their content-derived [`CommitId`](loom_types::CommitId).
//! It writes through to a [`StorageBackend`], which also persists ref
//! bindings for the ref layer.
//!
//! # Storage Backends
//!
//! - [`MemoryBackend`] -- `HashMap`-based, for tests and ephemeral use
//! - [`FsBackend`] -- one file per commit plus atomically replaced ref files
//!
//! # Design Rules
//!
//! 1. Commits are immutable once written; there is no delete.
//! 2. Write-then-link: persist the record, then publish it to readers.
//! 3. Duplicate creates are no-op successes.
//! 4. Records loaded from a backend are verified against their id.

pub mod backend;
pub mod commit;
pub mod error;
pub mod fs;
pub mod store;

pub use backend::{MemoryBackend, StorageBackend};
pub use commit::Commit;
pub use error::{StoreError, StoreResult};
pub use fs::FsBackend;
pub use store::CommitStore;
