//! The [`HistoryRewriter`]: reset, revert, rebase and cherry-pick.
//!
//! Every operation appends the commits it needs first and only then moves a
//! ref, with a single compare-and-swap against the tip it started from. A
//! failure before that write leaves refs untouched (orphaned commits may
//! remain in the store).

use std::sync::Arc;

use tracing::{debug, info};

use loom_dag::AncestryEngine;
use loom_diff::{ContentMerger, MergeOutcome};
use loom_refs::{classify, RefError, RefExpectation, RefStore};
use loom_store::{Commit, CommitStore};
use loom_types::CommitId;

use crate::error::{RewriteError, RewriteResult};
use crate::worktree::{NoOpWorktree, ResetMode, WorktreeHook};

/// Result of replaying one history onto another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RebaseOutcome {
    /// The new tip.
    pub tip: CommitId,
    /// `(original, replayed)` pairs, in replay order.
    pub replayed: Vec<(CommitId, CommitId)>,
    /// Merge commits in the range, which are not replayed.
    pub skipped: Vec<CommitId>,
}

impl RebaseOutcome {
    fn unchanged(tip: CommitId) -> Self {
        Self {
            tip,
            replayed: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Returns `true` if no commit was created.
    pub fn is_noop(&self) -> bool {
        self.replayed.is_empty()
    }
}

/// Rewrites branch history over a [`CommitStore`] and a [`RefStore`].
pub struct HistoryRewriter {
    store: Arc<CommitStore>,
    refs: Arc<dyn RefStore>,
    dag: AncestryEngine,
    merger: Arc<dyn ContentMerger>,
    worktree: Arc<dyn WorktreeHook>,
}

impl HistoryRewriter {
    pub fn new(store: Arc<CommitStore>, refs: Arc<dyn RefStore>, merger: Arc<dyn ContentMerger>) -> Self {
        Self {
            dag: AncestryEngine::new(Arc::clone(&store)),
            store,
            refs,
            merger,
            worktree: Arc::new(NoOpWorktree),
        }
    }

    /// Replace the hook notified after resets.
    pub fn with_worktree(mut self, worktree: Arc<dyn WorktreeHook>) -> Self {
        self.worktree = worktree;
        self
    }

    // ---------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------

    fn ensure_movable(&self, name: &str) -> RewriteResult<()> {
        if classify(name)?.is_remote_tracking() {
            return Err(RewriteError::ReadOnlyRef {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn tip_of(&self, name: &str) -> RewriteResult<CommitId> {
        self.refs.read(name)?.ok_or_else(|| {
            RewriteError::Ref(RefError::NotFound {
                name: name.to_string(),
            })
        })
    }

    /// `commit`'s change relative to its mainline parent, applied onto `tip`.
    fn apply_change(&self, commit: &Commit, tip: &CommitId) -> RewriteResult<MergeOutcome> {
        let base = self.store.first_parent_payload(&commit.id)?;
        let ours = self.store.payload(tip)?;
        Ok(self.merger.merge(&base, &ours, &commit.payload))
    }

    /// The inverse of `commit`'s change, applied onto `tip`.
    fn apply_inverse(&self, commit: &Commit, tip: &CommitId) -> RewriteResult<MergeOutcome> {
        let restored = self.store.first_parent_payload(&commit.id)?;
        let ours = self.store.payload(tip)?;
        Ok(self.merger.merge(&commit.payload, &ours, &restored))
    }

    // ---------------------------------------------------------------
    // Operations
    // ---------------------------------------------------------------

    /// Force-move `name` to `target`. Creates no commits.
    ///
    /// Returns the previous value of the ref. The worktree hook is told
    /// about the move after it has happened.
    pub fn reset(&self, name: &str, target: &CommitId, mode: ResetMode) -> RewriteResult<Option<CommitId>> {
        self.ensure_movable(name)?;
        self.store.get(target)?;
        let previous = self.refs.read(name)?;
        self.refs.write(name, *target, RefExpectation::Force)?;
        info!(
            name,
            from = ?previous.map(|id| id.short_hex()),
            to = %target.short_hex(),
            ?mode,
            "reset ref"
        );
        self.worktree.on_reset(name, target, mode)?;
        Ok(previous)
    }

    /// Record a new commit on `name` that undoes `target`'s change.
    ///
    /// For a merge commit the first parent is the mainline.
    pub fn revert(&self, name: &str, target: &CommitId) -> RewriteResult<CommitId> {
        self.ensure_movable(name)?;
        let tip = self.tip_of(name)?;
        let commit = self.store.get(target)?;

        let payload = self
            .apply_inverse(&commit, &tip)?
            .map_err(|conflict| RewriteError::RevertConflict {
                commit: *target,
                paths: conflict.paths,
            })?;
        let reverted = self.store.create(&[tip], payload)?;
        self.refs.write(name, reverted, RefExpectation::Is(tip))?;
        info!(name, reverted = %target.short_hex(), tip = %reverted.short_hex(), "revert recorded");
        Ok(reverted)
    }

    /// Replay `upto`'s exclusive history onto `onto`.
    ///
    /// Moves no refs. If `upto` is already contained in `onto` the result is
    /// `onto`; if `onto` is already contained in `upto` the result is `upto`.
    /// Either way nothing is created. Merge commits in the range are skipped.
    /// The first change that does not apply aborts the whole replay.
    ///
    /// The replayed range is every commit reachable from `upto` but not from
    /// `onto`. With a single merge base this is exactly the history above
    /// it; in a criss-cross it also leaves out commits `onto` already
    /// contains through its other bases.
    ///
    /// Conflicts report the new commits created so far and the originals
    /// not yet attempted.
    pub fn rebase(&self, onto: &CommitId, upto: &CommitId) -> RewriteResult<RebaseOutcome> {
        if self.dag.is_ancestor(upto, onto)? {
            debug!(onto = %onto.short_hex(), upto = %upto.short_hex(), "nothing to replay");
            return Ok(RebaseOutcome::unchanged(*onto));
        }
        if self.dag.is_ancestor(onto, upto)? {
            debug!(onto = %onto.short_hex(), upto = %upto.short_hex(), "already based");
            return Ok(RebaseOutcome::unchanged(*upto));
        }

        let range = self.dag.exclusive_history(upto, &[*onto])?;

        let mut outcome = RebaseOutcome::unchanged(*onto);
        for (i, commit) in range.iter().enumerate() {
            if commit.is_merge() {
                debug!(commit = %commit.id.short_hex(), "skipping merge commit");
                outcome.skipped.push(commit.id);
                continue;
            }
            let payload = match self.apply_change(commit, &outcome.tip)? {
                Ok(payload) => payload,
                Err(conflict) => {
                    return Err(RewriteError::RebaseConflict {
                        commit: commit.id,
                        replayed: outcome.replayed.iter().map(|(_, new)| *new).collect(),
                        remaining: range[i + 1..].iter().map(|c| c.id).collect(),
                        paths: conflict.paths,
                    })
                }
            };
            let replayed = self.store.create(&[outcome.tip], payload)?;
            debug!(from = %commit.id.short_hex(), to = %replayed.short_hex(), "replayed commit");
            outcome.replayed.push((commit.id, replayed));
            outcome.tip = replayed;
        }

        info!(
            onto = %onto.short_hex(),
            tip = %outcome.tip.short_hex(),
            replayed = outcome.replayed.len(),
            skipped = outcome.skipped.len(),
            "rebase complete"
        );
        Ok(outcome)
    }

    /// Rebase the history of `name` onto `onto` and move `name` to the result.
    pub fn rebase_ref(&self, name: &str, onto: &CommitId) -> RewriteResult<RebaseOutcome> {
        self.ensure_movable(name)?;
        let tip = self.tip_of(name)?;
        let outcome = self.rebase(onto, &tip)?;
        if outcome.tip != tip {
            self.refs.write(name, outcome.tip, RefExpectation::Is(tip))?;
            info!(name, tip = %outcome.tip.short_hex(), "ref rebased");
        }
        Ok(outcome)
    }

    /// Apply each commit's change onto `name`, one at a time.
    ///
    /// The ref advances after every pick, so a conflict leaves the earlier
    /// picks in place and reports them.
    pub fn cherry_pick(&self, name: &str, commits: &[CommitId]) -> RewriteResult<Vec<CommitId>> {
        self.ensure_movable(name)?;
        let picks = commits
            .iter()
            .map(|id| self.store.get(id))
            .collect::<Result<Vec<_>, _>>()?;
        let mut tip = self.tip_of(name)?;

        let mut applied = Vec::with_capacity(picks.len());
        for (i, commit) in picks.iter().enumerate() {
            let payload = match self.apply_change(commit, &tip)? {
                Ok(payload) => payload,
                Err(conflict) => {
                    return Err(RewriteError::CherryPickConflict {
                        commit: commit.id,
                        applied,
                        remaining: commits[i + 1..].to_vec(),
                        paths: conflict.paths,
                    })
                }
            };
            let picked = self.store.create(&[tip], payload)?;
            if let Err(source) = self.refs.write(name, picked, RefExpectation::Is(tip)) {
                return Err(match source {
                    RefError::RefConflict { .. } => RewriteError::CherryPickInterrupted {
                        applied,
                        remaining: commits[i..].to_vec(),
                        source,
                    },
                    other => other.into(),
                });
            }
            debug!(name, from = %commit.id.short_hex(), to = %picked.short_hex(), "picked commit");
            applied.push(picked);
            tip = picked;
        }
        info!(name, picks = applied.len(), "cherry-pick complete");
        Ok(applied)
    }
}

impl std::fmt::Debug for HistoryRewriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryRewriter").finish_non_exhaustive()
    }
}
