//! Ancestry queries over the Loom commit graph.
//!
//! [`AncestryEngine`] answers reachability (`is_ancestor`,
//! `can_fast_forward`), lowest-common-ancestor and merge-base queries, and
//! produces the ordered commit ranges that rebase and push operate on.

pub mod engine;
pub mod error;

pub use engine::{AncestryEngine, MergeBase};
pub use error::{DagError, DagResult};
