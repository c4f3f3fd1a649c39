use serde::Deserialize;
use serde::Serialize;

/// Body of `POST /simulations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSimulation {
    pub simulation_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub game_config: GameConfigDto,
    pub solver_config: SolverConfigDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfigDto {
    pub num_players: usize,
    pub stack_size: f64,
    pub small_blind: f64,
    pub big_blind: f64,
    #[serde(default)]
    pub allowed_bet_fractions: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfigDto {
    pub max_iterations: u32,
    pub target_exploitability: f64,
    #[serde(default)]
    pub batch_size: Option<u32>,
    #[serde(default)]
    pub use_chance_sampling: bool,
    #[serde(default)]
    pub use_regret_matching_plus: bool,
    #[serde(default)]
    pub use_discounting: bool,
    #[serde(default)]
    pub alpha: Option<f64>,
    #[serde(default)]
    pub beta: Option<f64>,
    #[serde(default)]
    pub checkpoint_frequency: Option<u32>,
    #[serde(default)]
    pub exploitability_frequency: Option<u32>,
    #[serde(default)]
    pub exploitability_samples: Option<u32>,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Body of `POST /compute-nodes/register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterNode {
    #[serde(default)]
    pub node_id: Option<uuid::Uuid>,
    pub platform: String,
    pub cpu_count: u32,
    pub memory_total: u64,
    pub max_concurrent_tasks: usize,
}

/// Body of `POST /compute-nodes/{id}/heartbeat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeHeartbeat {
    pub current_tasks: usize,
    #[serde(default)]
    pub cpu_usage: f64,
    #[serde(default)]
    pub memory_usage: f64,
}

/// Query string of `GET /simulations`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListFilter {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_parses_the_documented_shape() {
        let body = serde_json::json!({
            "simulation_type": "preflop",
            "game_config": {
                "num_players": 2,
                "stack_size": 100.0,
                "small_blind": 0.5,
                "big_blind": 1.0
            },
            "solver_config": {
                "max_iterations": 1000,
                "target_exploitability": 0.005,
                "use_chance_sampling": true
            }
        });
        let request: CreateSimulation = serde_json::from_value(body).unwrap();
        assert_eq!(request.simulation_type, "preflop");
        assert_eq!(request.game_config.num_players, 2);
        assert!(request.solver_config.use_chance_sampling);
        assert_eq!(request.solver_config.batch_size, None);
    }
}
