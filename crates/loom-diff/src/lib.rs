//! Content merging for Loom.
//!
//! Commit payloads are opaque to the history engine; every rewrite expresses
//! its change as a three-way merge through the [`ContentMerger`] trait.
//!
//! # Key Types
//!
//! - [`ContentMerger`] -- The merge seam used by rebase, cherry-pick, revert and merge
//! - [`LineMerger`] -- Default diff3-style line merger built on `similar`
//! - [`MergeConflicts`] -- Conflicting regions reported by a failed merge
//! - [`PayloadDelta`] -- Removed/added lines of a single change

pub mod delta;
pub mod error;
pub mod three_way;
pub mod traits;

pub use delta::PayloadDelta;
pub use error::{MergeConflicts, MergeOutcome};
pub use three_way::LineMerger;
pub use traits::ContentMerger;
