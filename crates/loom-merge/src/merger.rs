//! The [`Merger`]: fast-forward detection and two-parent merge commits.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use loom_dag::AncestryEngine;
use loom_diff::ContentMerger;
use loom_refs::{classify, RefError, RefExpectation, RefStore};
use loom_store::CommitStore;
use loom_types::CommitId;

use crate::error::{MergeError, MergeOpResult};

/// What a merge did (or, for the pure form, would do).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergeResult {
    /// Nothing to do: the other side is already contained.
    UpToDate { tip: CommitId },
    /// The behind side moves forward; no commit is created.
    FastForward { from: CommitId, to: CommitId },
    /// A new merge commit with parents `[ours, theirs]`.
    Merged {
        commit: CommitId,
        /// `None` when the histories share no ancestor.
        base: Option<CommitId>,
        /// More than one lowest common ancestor existed.
        ambiguous_base: bool,
    },
}

impl MergeResult {
    /// The commit the merged-into side ends up at.
    pub fn tip(&self) -> CommitId {
        match self {
            MergeResult::UpToDate { tip } => *tip,
            MergeResult::FastForward { to, .. } => *to,
            MergeResult::Merged { commit, .. } => *commit,
        }
    }

    pub fn is_fast_forward(&self) -> bool {
        matches!(self, MergeResult::FastForward { .. })
    }
}

/// Merges histories over a [`CommitStore`] and a [`RefStore`].
pub struct Merger {
    store: Arc<CommitStore>,
    refs: Arc<dyn RefStore>,
    dag: AncestryEngine,
    content: Arc<dyn ContentMerger>,
}

impl Merger {
    pub fn new(store: Arc<CommitStore>, refs: Arc<dyn RefStore>, content: Arc<dyn ContentMerger>) -> Self {
        Self {
            dag: AncestryEngine::new(Arc::clone(&store)),
            store,
            refs,
            content,
        }
    }

    fn tip_of(&self, name: &str) -> MergeOpResult<CommitId> {
        self.refs.read(name)?.ok_or_else(|| {
            MergeError::Ref(RefError::NotFound {
                name: name.to_string(),
            })
        })
    }

    fn is_local(name: &str) -> MergeOpResult<bool> {
        Ok(!classify(name)?.is_remote_tracking())
    }

    /// Merge `theirs` into `ours` without touching refs.
    ///
    /// A true merge appends a commit with parents `[ours, theirs]`; its
    /// content is reconciled from the deterministic merge base (an empty
    /// base for unrelated histories).
    pub fn merge_commits(&self, ours: &CommitId, theirs: &CommitId) -> MergeOpResult<MergeResult> {
        if ours == theirs || self.dag.is_ancestor(theirs, ours)? {
            return Ok(MergeResult::UpToDate { tip: *ours });
        }
        if self.dag.is_ancestor(ours, theirs)? {
            return Ok(MergeResult::FastForward {
                from: *ours,
                to: *theirs,
            });
        }

        let base = self.dag.merge_base(ours, theirs)?;
        let base_payload = match &base {
            Some(base) => self.store.payload(&base.id)?,
            None => Vec::new(),
        };
        let base_id = base.as_ref().map(|b| b.id);
        let merged = self
            .content
            .merge(
                &base_payload,
                &self.store.payload(ours)?,
                &self.store.payload(theirs)?,
            )
            .map_err(|conflict| MergeError::MergeConflict {
                base: base_id,
                ours: *ours,
                theirs: *theirs,
                paths: conflict.paths,
            })?;

        let commit = self.store.create(&[*ours, *theirs], merged)?;
        debug!(
            ours = %ours.short_hex(),
            theirs = %theirs.short_hex(),
            base = ?base_id.map(|id| id.short_hex()),
            commit = %commit.short_hex(),
            "created merge commit"
        );
        Ok(MergeResult::Merged {
            commit,
            base: base_id,
            ambiguous_base: base.is_some_and(|b| b.is_ambiguous()),
        })
    }

    /// Merge the refs `ref1` and `ref2`.
    ///
    /// When one contains the other, the behind ref is fast-forwarded if it
    /// is a local branch; a behind remote-tracking ref is left alone and the
    /// result is [`MergeResult::UpToDate`]. Otherwise a merge commit is
    /// recorded on `ref1`.
    pub fn three_way_merge(&self, ref1: &str, ref2: &str) -> MergeOpResult<MergeResult> {
        let tip1 = self.tip_of(ref1)?;
        let tip2 = self.tip_of(ref2)?;

        if tip1 == tip2 {
            return Ok(MergeResult::UpToDate { tip: tip1 });
        }
        if self.dag.is_ancestor(&tip1, &tip2)? {
            return self.advance(ref1, tip1, tip2);
        }
        if self.dag.is_ancestor(&tip2, &tip1)? {
            return self.advance(ref2, tip2, tip1);
        }

        if !Self::is_local(ref1)? {
            return Err(MergeError::ReadOnlyRef {
                name: ref1.to_string(),
            });
        }
        let result = self.merge_commits(&tip1, &tip2)?;
        self.refs.write(ref1, result.tip(), RefExpectation::Is(tip1))?;
        info!(ours = ref1, theirs = ref2, tip = %result.tip().short_hex(), "merged refs");
        Ok(result)
    }

    /// Merge the commit `theirs` into the ref `name` and move it.
    pub fn merge_into(&self, name: &str, theirs: &CommitId) -> MergeOpResult<MergeResult> {
        if !Self::is_local(name)? {
            return Err(MergeError::ReadOnlyRef {
                name: name.to_string(),
            });
        }
        let ours = self.tip_of(name)?;
        let result = self.merge_commits(&ours, theirs)?;
        if result.tip() != ours {
            self.refs.write(name, result.tip(), RefExpectation::Is(ours))?;
            info!(name, tip = %result.tip().short_hex(), "merged into ref");
        }
        Ok(result)
    }

    fn advance(&self, name: &str, from: CommitId, to: CommitId) -> MergeOpResult<MergeResult> {
        if !Self::is_local(name)? {
            debug!(name, "behind ref is remote-tracking, not moved");
            return Ok(MergeResult::UpToDate { tip: to });
        }
        self.refs.write(name, to, RefExpectation::Is(from))?;
        info!(name, from = %from.short_hex(), to = %to.short_hex(), "fast-forward");
        Ok(MergeResult::FastForward { from, to })
    }
}

impl std::fmt::Debug for Merger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Merger").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use loom_diff::LineMerger;
    use loom_refs::RefTable;

    struct Fixture {
        store: Arc<CommitStore>,
        refs: Arc<RefTable>,
        merger: Merger,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(CommitStore::in_memory());
            let refs = Arc::new(RefTable::new(Arc::clone(&store)));
            let merger = Merger::new(Arc::clone(&store), refs.clone(), Arc::new(LineMerger));
            Self { store, refs, merger }
        }

        fn commit(&self, parents: &[CommitId], payload: &str) -> CommitId {
            self.store.create(parents, payload.as_bytes().to_vec()).unwrap()
        }

        fn set(&self, name: &str, id: CommitId) {
            self.refs.write(name, id, RefExpectation::Force).unwrap();
        }

        fn tip(&self, name: &str) -> CommitId {
            self.refs.read(name).unwrap().unwrap()
        }
    }

    #[test]
    fn same_or_contained_is_up_to_date() {
        let fx = Fixture::new();
        let a = fx.commit(&[], "a\n");
        let b = fx.commit(&[a], "b\n");
        assert_eq!(fx.merger.merge_commits(&b, &b).unwrap(), MergeResult::UpToDate { tip: b });
        assert_eq!(fx.merger.merge_commits(&b, &a).unwrap(), MergeResult::UpToDate { tip: b });
    }

    #[test]
    fn behind_side_fast_forwards() {
        let fx = Fixture::new();
        let a = fx.commit(&[], "a\n");
        let b = fx.commit(&[a], "b\n");
        let before = fx.store.cached_len();
        assert_eq!(
            fx.merger.merge_commits(&a, &b).unwrap(),
            MergeResult::FastForward { from: a, to: b }
        );
        assert_eq!(fx.store.cached_len(), before);
    }

    #[test]
    fn divergent_histories_get_merge_commit() {
        let fx = Fixture::new();
        let base = fx.commit(&[], "one\n-\ntwo\n");
        let ours = fx.commit(&[base], "ONE\n-\ntwo\n");
        let theirs = fx.commit(&[base], "one\n-\nTWO\n");

        let result = fx.merger.merge_commits(&ours, &theirs).unwrap();
        let MergeResult::Merged {
            commit,
            base: chosen,
            ambiguous_base,
        } = result
        else {
            panic!("expected a merge commit, got {result:?}");
        };
        assert_eq!(chosen, Some(base));
        assert!(!ambiguous_base);
        let merged = fx.store.get(&commit).unwrap();
        assert_eq!(merged.parents, vec![ours, theirs]);
        assert_eq!(merged.payload, b"ONE\n-\nTWO\n");
    }

    #[test]
    fn conflict_reports_sides_and_paths() {
        let fx = Fixture::new();
        let base = fx.commit(&[], "x\n");
        let ours = fx.commit(&[base], "ours\n");
        let theirs = fx.commit(&[base], "theirs\n");
        fx.set("refs/heads/main", ours);
        fx.set("refs/heads/topic", theirs);

        let err = fx
            .merger
            .three_way_merge("refs/heads/main", "refs/heads/topic")
            .unwrap_err();
        match &err {
            MergeError::MergeConflict {
                base: b,
                ours: o,
                theirs: t,
                paths,
            } => {
                assert_eq!((*b, *o, *t), (Some(base), ours, theirs));
                assert_eq!(paths, &vec!["lines 1-1".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.kind(), loom_types::ErrorKind::MergeConflict);
        assert_eq!(fx.tip("refs/heads/main"), ours);
        assert_eq!(fx.tip("refs/heads/topic"), theirs);
    }

    #[test]
    fn unrelated_histories_merge_from_empty_base() {
        let fx = Fixture::new();
        let left = fx.commit(&[], "");
        let right = fx.commit(&[], "content\n");
        let result = fx.merger.merge_commits(&left, &right).unwrap();
        assert!(matches!(result, MergeResult::Merged { base: None, .. }));
        assert_eq!(fx.store.payload(&result.tip()).unwrap(), b"content\n");

        let other = fx.commit(&[], "different\n");
        assert!(matches!(
            fx.merger.merge_commits(&right, &other),
            Err(MergeError::MergeConflict { base: None, .. })
        ));
    }

    #[test]
    fn three_way_merge_fast_forwards_behind_local_ref() {
        let fx = Fixture::new();
        let a = fx.commit(&[], "a\n");
        let b = fx.commit(&[a], "b\n");
        fx.set("refs/heads/main", a);
        fx.set("refs/heads/topic", b);

        let result = fx
            .merger
            .three_way_merge("refs/heads/main", "refs/heads/topic")
            .unwrap();
        assert_eq!(result, MergeResult::FastForward { from: a, to: b });
        assert_eq!(fx.tip("refs/heads/main"), b);

        // Reverse direction: the second ref is the one behind.
        fx.set("refs/heads/old", a);
        let result = fx
            .merger
            .three_way_merge("refs/heads/main", "refs/heads/old")
            .unwrap();
        assert_eq!(result, MergeResult::FastForward { from: a, to: b });
        assert_eq!(fx.tip("refs/heads/old"), b);
    }

    #[test]
    fn three_way_merge_never_moves_remote_tracking_ref() {
        let fx = Fixture::new();
        let a = fx.commit(&[], "a\n");
        let b = fx.commit(&[a], "b\n");
        fx.set("refs/heads/main", b);
        fx.set("refs/remotes/origin/main", a);

        let result = fx
            .merger
            .three_way_merge("refs/heads/main", "refs/remotes/origin/main")
            .unwrap();
        assert_eq!(result, MergeResult::UpToDate { tip: b });
        assert_eq!(fx.tip("refs/remotes/origin/main"), a);
    }

    #[test]
    fn three_way_merge_records_commit_on_first_ref() {
        let fx = Fixture::new();
        let base = fx.commit(&[], "a\n-\nb\n");
        let ours = fx.commit(&[base], "A\n-\nb\n");
        let theirs = fx.commit(&[base], "a\n-\nB\n");
        fx.set("refs/heads/main", ours);
        fx.set("refs/remotes/origin/main", theirs);

        let result = fx
            .merger
            .three_way_merge("refs/heads/main", "refs/remotes/origin/main")
            .unwrap();
        assert_eq!(fx.tip("refs/heads/main"), result.tip());
        assert_eq!(fx.tip("refs/remotes/origin/main"), theirs);

        // main now contains origin/main, so the tracking ref is simply behind.
        let behind = fx
            .merger
            .three_way_merge("refs/remotes/origin/main", "refs/heads/main")
            .unwrap();
        assert_eq!(behind, MergeResult::UpToDate { tip: result.tip() });
    }

    #[test]
    fn merge_into_moves_ref_by_cas() {
        let fx = Fixture::new();
        let base = fx.commit(&[], "a\n-\nb\n");
        let ours = fx.commit(&[base], "A\n-\nb\n");
        let theirs = fx.commit(&[base], "a\n-\nB\n");
        fx.set("refs/heads/main", ours);

        let result = fx.merger.merge_into("refs/heads/main", &theirs).unwrap();
        assert_eq!(fx.tip("refs/heads/main"), result.tip());
        assert!(matches!(
            fx.merger.merge_into("refs/remotes/origin/main", &theirs),
            Err(MergeError::ReadOnlyRef { .. })
        ));
    }

    /// ```text
    ///   r - x - m1 - xs
    ///    \    X
    ///     y - m2 - ys
    /// ```
    #[test]
    fn criss_cross_merge_is_deterministic() {
        let fx = Fixture::new();
        let r = fx.commit(&[], "a\n-\nb\n-\nc\n-\nd\n");
        let x = fx.commit(&[r], "A\n-\nb\n-\nc\n-\nd\n");
        let y = fx.commit(&[r], "a\n-\nb\n-\nC\n-\nd\n");
        let m1 = fx.commit(&[x, y], "A\n-\nb\n-\nC\n-\nd\n");
        let m2 = fx.commit(&[y, x], "A\n-\nb\n-\nC\n-\nd\n");
        let xs = fx.commit(&[m1], "A\n-\nB\n-\nC\n-\nd\n");
        let ys = fx.commit(&[m2], "A\n-\nb\n-\nC\n-\nD\n");

        let first = fx.merger.merge_commits(&xs, &ys).unwrap();
        let second = fx.merger.merge_commits(&xs, &ys).unwrap();
        assert_eq!(first, second);
        let MergeResult::Merged {
            commit,
            base,
            ambiguous_base,
        } = first
        else {
            panic!("expected a merge commit");
        };
        assert!(ambiguous_base);
        assert_eq!(base, Some(x.min(y)));
        assert_eq!(fx.store.payload(&commit).unwrap(), b"A\n-\nB\n-\nC\n-\nD\n");

        fx.set("refs/heads/xs", xs);
        fx.set("refs/heads/ys", ys);
        let via_refs = fx.merger.three_way_merge("refs/heads/xs", "refs/heads/ys").unwrap();
        assert_eq!(via_refs.tip(), commit);
    }

    #[test]
    fn result_serializes_with_kind_tag() {
        let id = CommitId::from_hash([1; 32]);
        let json = serde_json::to_value(MergeResult::UpToDate { tip: id }).unwrap();
        assert_eq!(json["kind"], "up_to_date");
    }
}
