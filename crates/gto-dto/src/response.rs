use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;

/// `201` body of `POST /simulations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationCreated {
    pub simulation_id: uuid::Uuid,
    pub status: String,
}

/// Body of `GET /simulations/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationStatus {
    pub simulation_id: uuid::Uuid,
    pub status: String,
    pub progress_percentage: f64,
    pub iterations_completed: u32,
    pub total_iterations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_exploitability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining: Option<u64>,
    /// Set while the broker is unreachable and dispatch is stalled.
    #[serde(default)]
    pub stalled: bool,
}

/// Body of `GET /simulations/{id}/results`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResults {
    pub simulation_id: uuid::Uuid,
    pub final_exploitability: f64,
    pub iterations_completed: u32,
    pub convergence_time_seconds: f64,
    /// Average strategy per information set, action symbol to probability.
    pub final_strategy: BTreeMap<String, BTreeMap<String, f64>>,
}

/// Body of `GET /simulations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationList {
    pub simulations: Vec<SimulationSummary>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub simulation_id: uuid::Uuid,
    pub simulation_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: String,
    pub created_at: u64,
    pub updated_at: u64,
    pub iterations_completed: u32,
}

/// One record of `GET /compute-nodes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeView {
    pub node_id: uuid::Uuid,
    pub platform: String,
    pub cpu_count: u32,
    pub memory_total: u64,
    pub max_concurrent_tasks: usize,
    pub current_tasks: usize,
    pub status: String,
    pub last_heartbeat: u64,
    pub total_tasks_completed: u64,
    pub total_tasks_failed: u64,
    pub cpu_usage: f64,
    pub memory_usage: f64,
}
