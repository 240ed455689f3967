//! Position-free summary of the change between two payloads.

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

/// The lines a change removes and adds, in order, without positions.
///
/// Two commits carry "the same change" when their deltas against their
/// first parents are equal, even if they sit on different histories.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadDelta {
    pub removed: Vec<String>,
    pub added: Vec<String>,
}

impl PayloadDelta {
    /// Compute the delta from `old` to `new`.
    ///
    /// Non-UTF-8 input is decoded lossily.
    pub fn between(old: &[u8], new: &[u8]) -> Self {
        let old = String::from_utf8_lossy(old);
        let new = String::from_utf8_lossy(new);
        let mut delta = Self::default();
        if old == new {
            return delta;
        }
        let diff = TextDiff::from_lines(&*old, &*new);
        for change in diff.iter_all_changes() {
            let text = change.value().to_string();
            match change.tag() {
                ChangeTag::Delete => delta.removed.push(text),
                ChangeTag::Insert => delta.added.push(text),
                ChangeTag::Equal => {}
            }
        }
        delta
    }

    /// Returns `true` if the two payloads were identical.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }

    /// The inverse change.
    pub fn inverted(&self) -> Self {
        Self {
            removed: self.added.clone(),
            added: self.removed.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_payloads_have_empty_delta() {
        assert!(PayloadDelta::between(b"a\nb\n", b"a\nb\n").is_empty());
    }

    #[test]
    fn modification_lists_removed_and_added() {
        let delta = PayloadDelta::between(b"a\nb\nc\n", b"a\nB\nc\nd\n");
        assert_eq!(delta.removed, vec!["b\n"]);
        assert_eq!(delta.added, vec!["B\n", "d\n"]);
    }

    #[test]
    fn delta_ignores_surrounding_context() {
        let here = PayloadDelta::between(b"x\nold\n", b"x\nnew\n");
        let there = PayloadDelta::between(b"y\nz\nold\n", b"y\nz\nnew\n");
        assert_eq!(here, there);
    }

    #[test]
    fn inversion_swaps_sides() {
        let delta = PayloadDelta::between(b"", b"line\n");
        assert_eq!(delta.inverted(), PayloadDelta::between(b"line\n", b""));
    }

    #[test]
    fn serializes_as_json() {
        let delta = PayloadDelta::between(b"a\n", b"b\n");
        let json = serde_json::to_string(&delta).unwrap();
        let back: PayloadDelta = serde_json::from_str(&json).unwrap();
        assert_eq!(back, delta);
    }
}
