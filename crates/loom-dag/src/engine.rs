//! Reachability and common-ancestor queries over the commit graph.
//!
//! [`AncestryEngine`] is stateless apart from a handle to the
//! [`CommitStore`]. Every walk is bounded by generation numbers: a commit's
//! generation strictly exceeds each of its parents', so a commit can only
//! reach commits of lower generation. No timestamps are ever consulted.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, warn};

use loom_store::{Commit, CommitStore, StoreError};
use loom_types::CommitId;

use crate::error::{DagError, DagResult};

const PARENT1: u8 = 1 << 0;
const PARENT2: u8 = 1 << 1;
const STALE: u8 = 1 << 2;
const RESULT: u8 = 1 << 3;
const BOTH: u8 = PARENT1 | PARENT2;

/// Queue entry ordered by generation, then id, so the walk always pops the
/// newest outstanding commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Pending {
    generation: u64,
    id: CommitId,
}

impl Pending {
    fn of(commit: &Commit) -> Self {
        Self {
            generation: commit.generation,
            id: commit.id,
        }
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.generation
            .cmp(&other.generation)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The merge base chosen for two commits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeBase {
    /// The chosen base: the smallest id among the candidates.
    pub id: CommitId,
    /// Every lowest common ancestor. More than one means a criss-cross.
    pub candidates: BTreeSet<CommitId>,
}

impl MergeBase {
    /// Returns `true` if more than one lowest common ancestor existed.
    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }
}

/// Ancestry queries answered against a [`CommitStore`].
#[derive(Clone, Debug)]
pub struct AncestryEngine {
    store: Arc<CommitStore>,
}

impl AncestryEngine {
    pub fn new(store: Arc<CommitStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<CommitStore> {
        &self.store
    }

    fn endpoint(&self, id: &CommitId) -> DagResult<Arc<Commit>> {
        self.store.get(id).map_err(|e| match e {
            StoreError::NotFound(missing) => DagError::NotFound(missing),
            other => DagError::Store(other),
        })
    }

    // ---------------------------------------------------------------
    // Reachability
    // ---------------------------------------------------------------

    /// Whether `a` is reachable from `b` via parent edges. Reflexive.
    pub fn is_ancestor(&self, a: &CommitId, b: &CommitId) -> DagResult<bool> {
        let target = self.endpoint(a)?;
        let start = self.endpoint(b)?;
        if a == b {
            return Ok(true);
        }
        if start.generation <= target.generation {
            return Ok(false);
        }

        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(commit) = queue.pop_front() {
            for parent in &commit.parents {
                if parent == a {
                    return Ok(true);
                }
                if !visited.insert(*parent) {
                    continue;
                }
                let parent = self.store.get(parent)?;
                if parent.generation > target.generation {
                    queue.push_back(parent);
                }
            }
        }
        Ok(false)
    }

    /// Whether a ref at `from` can move to `to` without losing history.
    pub fn can_fast_forward(&self, from: &CommitId, to: &CommitId) -> DagResult<bool> {
        self.is_ancestor(from, to)
    }

    // ---------------------------------------------------------------
    // Common ancestors
    // ---------------------------------------------------------------

    /// All maximal common ancestors of `a` and `b`.
    ///
    /// Empty for unrelated histories; more than one element for criss-cross
    /// merges.
    pub fn lowest_common_ancestors(&self, a: &CommitId, b: &CommitId) -> DagResult<BTreeSet<CommitId>> {
        let left = self.endpoint(a)?;
        let right = self.endpoint(b)?;
        if a == b {
            return Ok(BTreeSet::from([*a]));
        }

        let candidates = self.paint(&left, &right)?;
        let lcas = self.remove_redundant(candidates)?;
        debug!(
            a = %a.short_hex(),
            b = %b.short_hex(),
            count = lcas.len(),
            "computed lowest common ancestors"
        );
        Ok(lcas)
    }

    /// Walk down from both tips at once, newest first, painting each commit
    /// with the side(s) it is reachable from. A commit painted from both
    /// sides is a candidate; everything below it is marked stale.
    fn paint(&self, left: &Commit, right: &Commit) -> DagResult<Vec<CommitId>> {
        let mut flags: HashMap<CommitId, u8> = HashMap::new();
        let mut queue = BinaryHeap::new();
        flags.insert(left.id, PARENT1);
        flags.insert(right.id, PARENT2);
        queue.push(Pending::of(left));
        queue.push(Pending::of(right));

        let mut candidates = Vec::new();
        while queue_has_nonstale(&queue, &flags) {
            let Some(next) = queue.pop() else { break };
            let mut paint = flags.get(&next.id).copied().unwrap_or_default() & (BOTH | STALE);

            if paint & BOTH == BOTH && paint & STALE == 0 {
                let entry = flags.entry(next.id).or_default();
                if *entry & RESULT == 0 {
                    *entry |= RESULT;
                    candidates.push(next.id);
                }
                paint |= STALE;
            }

            let commit = self.store.get(&next.id)?;
            for parent in &commit.parents {
                let entry = flags.entry(*parent).or_default();
                if *entry & paint == paint {
                    continue;
                }
                *entry |= paint;
                let parent = self.store.get(parent)?;
                queue.push(Pending::of(&parent));
            }
        }
        Ok(candidates)
    }

    /// Drop every candidate that is an ancestor of another candidate.
    fn remove_redundant(&self, candidates: Vec<CommitId>) -> DagResult<BTreeSet<CommitId>> {
        let mut kept = BTreeSet::new();
        for (i, candidate) in candidates.iter().enumerate() {
            let mut redundant = false;
            for (j, other) in candidates.iter().enumerate() {
                if i != j && self.is_ancestor(candidate, other)? {
                    redundant = true;
                    break;
                }
            }
            if !redundant {
                kept.insert(*candidate);
            }
        }
        Ok(kept)
    }

    /// Choose a single merge base for `a` and `b`.
    ///
    /// Ties between several lowest common ancestors resolve to the smallest
    /// id and are logged at `warn`. `None` for unrelated histories.
    pub fn merge_base(&self, a: &CommitId, b: &CommitId) -> DagResult<Option<MergeBase>> {
        let candidates = self.lowest_common_ancestors(a, b)?;
        let Some(id) = candidates.first().copied() else {
            return Ok(None);
        };
        let base = MergeBase { id, candidates };
        if base.is_ambiguous() {
            warn!(
                a = %a.short_hex(),
                b = %b.short_hex(),
                chosen = %id.short_hex(),
                candidates = base.candidates.len(),
                "ambiguous merge base, picking smallest id"
            );
        }
        Ok(Some(base))
    }

    // ---------------------------------------------------------------
    // Listings
    // ---------------------------------------------------------------

    /// Commits reachable from `tip` but from none of `excluded`, parents
    /// before children.
    ///
    /// Excluded ids unknown to the store exclude nothing. Ties are broken by
    /// generation, then id.
    pub fn exclusive_history(&self, tip: &CommitId, excluded: &[CommitId]) -> DagResult<Vec<Arc<Commit>>> {
        let start = self.endpoint(tip)?;

        let mut hidden: HashSet<CommitId> = HashSet::new();
        let mut queue = VecDeque::new();
        for id in excluded {
            if self.store.exists(id)? && hidden.insert(*id) {
                queue.push_back(*id);
            }
        }
        while let Some(id) = queue.pop_front() {
            for parent in &self.store.get(&id)?.parents {
                if hidden.insert(*parent) {
                    queue.push_back(*parent);
                }
            }
        }

        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        let mut queue = VecDeque::new();
        if !hidden.contains(tip) {
            seen.insert(*tip);
            queue.push_back(start);
        }
        while let Some(commit) = queue.pop_front() {
            for parent in &commit.parents {
                if !hidden.contains(parent) && seen.insert(*parent) {
                    queue.push_back(self.store.get(parent)?);
                }
            }
            selected.push(commit);
        }

        // A generation always exceeds every parent's, so this is topological.
        selected.sort_by_key(|c| Pending::of(c));
        Ok(selected)
    }

    /// Up to `limit` commits reachable from `tip`, newest generation first.
    pub fn ancestors(&self, tip: &CommitId, limit: usize) -> DagResult<Vec<Arc<Commit>>> {
        let start = self.endpoint(tip)?;
        let mut seen = HashSet::from([*tip]);
        let mut queue = BinaryHeap::from([Pending::of(&start)]);
        let mut out = Vec::new();
        while out.len() < limit {
            let Some(next) = queue.pop() else { break };
            let commit = self.store.get(&next.id)?;
            for parent in &commit.parents {
                if seen.insert(*parent) {
                    let parent = self.store.get(parent)?;
                    queue.push(Pending::of(&parent));
                }
            }
            out.push(commit);
        }
        Ok(out)
    }
}

fn queue_has_nonstale(queue: &BinaryHeap<Pending>, flags: &HashMap<CommitId, u8>) -> bool {
    queue
        .iter()
        .any(|p| flags.get(&p.id).copied().unwrap_or_default() & STALE == 0)
}
