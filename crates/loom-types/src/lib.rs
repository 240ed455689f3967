//! Foundation types for Loom.
//!
//! Every other Loom crate depends on `loom-types` for the content-addressed
//! [`CommitId`], the domain-separated [`ContentHasher`] that derives it, and
//! the [`ErrorKind`] taxonomy that all crate errors map onto.

pub mod error;
pub mod hasher;
pub mod id;

pub use error::{ErrorKind, TypeError};
pub use hasher::ContentHasher;
pub use id::CommitId;
