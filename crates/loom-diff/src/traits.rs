//! The [`ContentMerger`] seam.

use crate::error::MergeOutcome;

/// Three-way merge of opaque commit payloads.
///
/// Rewriting operations express every change as a merge: applying commit
/// `c` onto `tip` is `merge(parent(c), tip, c)`, and reverting it is
/// `merge(c, tip, parent(c))`. Implementations must be deterministic and
/// must return `ours` unchanged when `base == theirs`.
pub trait ContentMerger: Send + Sync {
    fn merge(&self, base: &[u8], ours: &[u8], theirs: &[u8]) -> MergeOutcome;
}
