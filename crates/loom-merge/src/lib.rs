//! Merge engine for Loom.
//!
//! [`Merger`] decides between up-to-date, fast-forward and true merges using
//! the ancestry engine, reconciles content through a
//! [`loom_diff::ContentMerger`] seeded with the deterministic merge base, and
//! records two-parent merge commits.

pub mod error;
pub mod merger;

pub use error::{MergeError, MergeOpResult};
pub use merger::{MergeResult, Merger};
