use gto_core::*;
use gto_kernel::InfoSetKey;
use std::collections::BTreeMap;

use crate::Task;

/// Per-key, per-action delta vectors produced by one traversal.
pub type Delta = BTreeMap<InfoSetKey, Vec<Utility>>;

/// What a successful traversal hands back: the two delta maps plus the
/// root value estimate per player.
#[derive(Debug, Clone, Default, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Outcome {
    pub regret_delta: Delta,
    pub strategy_delta: Delta,
    pub value_estimates: Vec<Utility>,
    /// Tree nodes visited, for throughput accounting.
    #[serde(default)]
    pub nodes_visited: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Completed,
    Failed,
}

/// A worker's report for one task: success with deltas, or failure with the
/// error it hit. Either way the report is terminal for that attempt.
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct TaskResult {
    pub task_id: ID<Task>,
    pub simulation_id: ID<Sim>,
    pub node_id: ID<Node>,
    pub iteration: Epoch,
    pub status: ResultStatus,
    pub execution_ms: u64,
    #[serde(default)]
    pub memory_mb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Outcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    /// A successful report.
    pub fn completed(task: &Task, node_id: ID<Node>, execution_ms: u64, outcome: Outcome) -> Self {
        Self {
            task_id: task.task_id,
            simulation_id: task.simulation_id,
            node_id,
            iteration: task.iteration,
            status: ResultStatus::Completed,
            execution_ms,
            memory_mb: 0.0,
            results: Some(outcome),
            error: None,
        }
    }
    /// A failure report carrying the error text upward unchanged.
    pub fn failed(task: &Task, node_id: ID<Node>, execution_ms: u64, error: String) -> Self {
        Self {
            task_id: task.task_id,
            simulation_id: task.simulation_id,
            node_id,
            iteration: task.iteration,
            status: ResultStatus::Failed,
            execution_ms,
            memory_mb: 0.0,
            results: None,
            error: Some(error),
        }
    }
    pub fn is_completed(&self) -> bool {
        matches!(self.status, ResultStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gto_cards::Street;

    #[test]
    fn serde_round_trip_is_identity() {
        let key = InfoSetKey::new(0, Street::Pref, 0, String::from("C500"), 100);
        let outcome = Outcome {
            regret_delta: Delta::from([(key.clone(), vec![0.5, -0.5])]),
            strategy_delta: Delta::from([(key, vec![0.25, 0.75])]),
            value_estimates: vec![0.1, -0.1],
            nodes_visited: 42,
        };
        let result = TaskResult {
            task_id: ID::default(),
            simulation_id: ID::default(),
            node_id: ID::default(),
            iteration: 3,
            status: ResultStatus::Completed,
            execution_ms: 17,
            memory_mb: 0.0,
            results: Some(outcome),
            error: None,
        };
        let json = serde_json::to_string(&result).unwrap();
        let back: TaskResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result, back);
    }
}
