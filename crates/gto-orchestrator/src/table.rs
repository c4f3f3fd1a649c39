use gto_cfr::Discipline;
use gto_cfr::Outcome;
use gto_cfr::TableView;
use gto_core::*;
use gto_kernel::InfoSetKey;
use gto_kernel::InfoSetNode;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Mutex;

use crate::OrchestratorError;

/// One simulation's cumulative regret and strategy sums, sharded by key
/// hash so concurrent folds rarely contend.
///
/// Delta application walks the keys in sorted order and takes shard locks
/// as it goes, so two folders always acquire locks in a consistent order.
pub struct NodeTable {
    shards: Vec<Mutex<HashMap<InfoSetKey, InfoSetNode>>>,
}

impl Default for NodeTable {
    fn default() -> Self {
        Self::new(TABLE_SHARDS)
    }
}

impl NodeTable {
    pub fn new(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1)).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard_of(&self, key: &InfoSetKey) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    /// Folds a completed task's deltas in, applying the variant's
    /// post-update regret adjustment.
    ///
    /// Keys are visited in sorted order; a shard lock is held only for the
    /// keys inside it. Arity drift between a delta and its node is an
    /// integrity failure.
    pub fn fold(&self, outcome: &Outcome, discipline: &Discipline) -> Result<(), OrchestratorError> {
        for (key, regrets) in outcome.regret_delta.iter() {
            let zeroes = vec![0.0; regrets.len()];
            let strategies = outcome.strategy_delta.get(key).unwrap_or(&zeroes);
            let mut shard = self
                .shards[self.shard_of(key)]
                .lock()
                .expect("shard lock never poisoned");
            let node = shard
                .entry(key.clone())
                .or_insert_with(|| InfoSetNode::new(regrets.len()));
            node.accumulate(regrets, strategies)
                .map_err(OrchestratorError::Aggregation)?;
            for r in node.regret_sum.iter_mut() {
                *r = discipline.adjust_regret(*r);
            }
        }
        // strategy-only keys (none today, but the delta maps are independent)
        for (key, strategies) in outcome.strategy_delta.iter() {
            if outcome.regret_delta.contains_key(key) {
                continue;
            }
            let mut shard = self
                .shards[self.shard_of(key)]
                .lock()
                .expect("shard lock never poisoned");
            let node = shard
                .entry(key.clone())
                .or_insert_with(|| InfoSetNode::new(strategies.len()));
            let zeroes = vec![0.0; strategies.len()];
            node.accumulate(&zeroes, strategies)
                .map_err(OrchestratorError::Aggregation)?;
        }
        Ok(())
    }

    /// A point-in-time copy of every node, for snapshots, checkpoints, and
    /// exploitability estimation.
    pub fn snapshot(&self) -> TableView {
        let mut out = BTreeMap::new();
        for shard in self.shards.iter() {
            let held = shard.lock().expect("shard lock never poisoned");
            for (key, node) in held.iter() {
                out.insert(key.clone(), node.clone());
            }
        }
        TableView(out)
    }

    /// Replaces the whole table, for checkpoint restore. Atomic per shard,
    /// with the table quiesced by the caller (no folds run during restore).
    pub fn replace(&self, nodes: BTreeMap<InfoSetKey, InfoSetNode>) {
        for shard in self.shards.iter() {
            shard.lock().expect("shard lock never poisoned").clear();
        }
        for (key, node) in nodes {
            self.shards[self.shard_of(&key)]
                .lock()
                .expect("shard lock never poisoned")
                .insert(key, node);
        }
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().expect("shard lock never poisoned").len())
            .sum()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
