//! Reference management for Loom.
//!
//! Refs are the mutable, named entry points into the immutable commit
//! graph.
//!
//! # Architecture
//!
//! - **Local branches** (`refs/heads/*`) move through local operations.
//! - **Remote-tracking refs** (`refs/remotes/<remote>/*`) mirror the last
//!   known state of a remote and are only moved by sync.
//! - **HEAD** is attached to a local branch or detached at a commit. It is
//!   never attached to another symbolic ref.
//!
//! Every mutation is a compare-and-swap against a [`RefExpectation`].
//!
//! # Modules
//!
//! - [`error`] -- Error types for ref operations
//! - [`types`] -- [`Head`], [`RefExpectation`], [`RefKind`]
//! - [`traits`] -- The [`RefStore`] trait
//! - [`names`] -- Name validation and classification
//! - [`table`] -- [`RefTable`], the persisted implementation

pub mod error;
pub mod names;
pub mod table;
pub mod traits;
pub mod types;

pub use error::{RefError, RefResult};
pub use names::{classify, local_ref, remote_tracking_ref, validate_branch_name, validate_remote_name};
pub use table::RefTable;
pub use traits::RefStore;
pub use types::{Head, RefExpectation, RefKind, HEAD};
