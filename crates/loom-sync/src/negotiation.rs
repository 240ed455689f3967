use std::collections::{HashMap, HashSet};

use loom_store::{Commit, CommitStore};
use loom_types::CommitId;

use crate::error::SyncResult;

/// Decides which commits to request and in which order to admit them.
pub struct NegotiationEngine;

impl NegotiationEngine {
    /// Advertised tips the local store does not have, deduplicated.
    pub fn compute_wants(store: &CommitStore, advertised: &[(String, CommitId)]) -> SyncResult<Vec<CommitId>> {
        let mut seen = HashSet::new();
        let mut wants = Vec::new();
        for (_, id) in advertised {
            if seen.insert(*id) && !store.exists(id)? {
                wants.push(*id);
            }
        }
        Ok(wants)
    }

    /// Parents of received commits that are neither local nor received yet.
    pub fn missing_parents(store: &CommitStore, received: &HashMap<CommitId, Commit>) -> SyncResult<Vec<CommitId>> {
        let mut seen = HashSet::new();
        let mut wants = Vec::new();
        for commit in received.values() {
            for parent in &commit.parents {
                if received.contains_key(parent) || !seen.insert(*parent) {
                    continue;
                }
                if !store.exists(parent)? {
                    wants.push(*parent);
                }
            }
        }
        wants.sort();
        Ok(wants)
    }

    /// Order a batch so that every commit follows its in-batch parents.
    pub fn parent_first(received: HashMap<CommitId, Commit>) -> Vec<Commit> {
        let mut pending: Vec<Commit> = received.into_values().collect();
        pending.sort_by_key(|c| c.id);
        let mut placed: HashSet<CommitId> = HashSet::new();
        let batch: HashSet<CommitId> = pending.iter().map(|c| c.id).collect();
        let mut ordered = Vec::with_capacity(pending.len());

        while !pending.is_empty() {
            let (ready, blocked): (Vec<Commit>, Vec<Commit>) = pending.into_iter().partition(|c| {
                c.parents
                    .iter()
                    .all(|p| !batch.contains(p) || placed.contains(p))
            });
            if ready.is_empty() {
                // Only reachable with a cyclic batch, which content addressing rules out.
                ordered.extend(blocked);
                break;
            }
            placed.extend(ready.iter().map(|c| c.id));
            ordered.extend(ready);
            pending = blocked;
        }
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(store: &CommitStore, len: usize) -> Vec<CommitId> {
        let mut ids: Vec<CommitId> = Vec::new();
        for i in 0..len {
            let parents: Vec<CommitId> = ids.last().copied().into_iter().collect();
            ids.push(store.create(&parents, vec![i as u8]).unwrap());
        }
        ids
    }

    #[test]
    fn compute_wants_finds_missing() {
        let local = CommitStore::in_memory();
        let ids = chain(&local, 1);
        let ghost = CommitId::from_hash([2; 32]);
        let advertised = vec![
            ("refs/heads/main".into(), ids[0]),
            ("refs/heads/dev".into(), ghost),
            ("refs/heads/copy".into(), ghost),
        ];
        assert_eq!(NegotiationEngine::compute_wants(&local, &advertised).unwrap(), vec![ghost]);
    }

    #[test]
    fn missing_parents_skips_known_and_received() {
        let remote = CommitStore::in_memory();
        let ids = chain(&remote, 4);
        let local = CommitStore::in_memory();

        let received: HashMap<CommitId, Commit> = [ids[3], ids[2]]
            .iter()
            .map(|id| (*id, (*remote.get(id).unwrap()).clone()))
            .collect();
        assert_eq!(NegotiationEngine::missing_parents(&local, &received).unwrap(), vec![ids[1]]);
    }

    #[test]
    fn parent_first_orders_batch() {
        let remote = CommitStore::in_memory();
        let ids = chain(&remote, 5);
        let received: HashMap<CommitId, Commit> = ids
            .iter()
            .map(|id| (*id, (*remote.get(id).unwrap()).clone()))
            .collect();
        let ordered: Vec<CommitId> = NegotiationEngine::parent_first(received)
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ordered, ids);
    }
}
