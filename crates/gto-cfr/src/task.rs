use gto_cards::Hole;
use gto_core::*;
use gto_kernel::AbstractionParams;
use gto_kernel::GameState;

use crate::Discount;

/// Which work queue a task rides and which root shape it solves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Preflop,
    Postflop,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Preflop => write!(f, "preflop"),
            Self::Postflop => write!(f, "postflop"),
        }
    }
}

/// Solver variant selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Vanilla,
    ChanceSampling,
    Plus,
}

impl Variant {
    /// True when iterations draw a Monte Carlo hand sample rather than
    /// enumerating deterministically.
    pub fn sampled(&self) -> bool {
        matches!(self, Self::ChanceSampling)
    }
    /// Stable byte tag for the checkpoint header.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Vanilla => 0,
            Self::ChanceSampling => 1,
            Self::Plus => 2,
        }
    }
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Vanilla),
            1 => Some(Self::ChanceSampling),
            2 => Some(Self::Plus),
            _ => None,
        }
    }
}

/// Everything a worker needs to run one unit of CFR work.
///
/// Self-contained: the subtree root state, the player whose regrets this
/// traversal updates, the abstraction knobs (which must match the
/// orchestrator's exactly, or keys diverge), and the RNG seed that makes the
/// traversal reproducible.
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct TaskPayload {
    pub variant: Variant,
    pub root_state: GameState,
    pub player_to_update: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampled_hand: Option<Hole>,
    pub abstraction_params: AbstractionParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<Discount>,
    pub seed: u64,
}

/// One unit of dispatchable work.
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Task {
    pub task_id: ID<Task>,
    pub simulation_id: ID<Sim>,
    pub iteration: Epoch,
    pub kind: TaskKind,
    #[serde(default)]
    pub retry_count: u32,
    pub payload: TaskPayload,
}

/// Cache key under which the orchestrator publishes a simulation's strategy
/// snapshot for workers to regret-match against.
pub fn strategy_key(id: ID<Sim>) -> String {
    format!("strategy:{}", id)
}

/// Cache key flagging a cancelled simulation for cooperating workers.
pub fn cancel_key(id: ID<Sim>) -> String {
    format!("cancelled:{}", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gto_kernel::GameConfig;

    #[test]
    fn serde_round_trip_is_identity() {
        let task = Task {
            task_id: ID::default(),
            simulation_id: ID::default(),
            iteration: 7,
            kind: TaskKind::Preflop,
            retry_count: 1,
            payload: TaskPayload {
                variant: Variant::ChanceSampling,
                root_state: GameState::root(GameConfig::default()).unwrap(),
                player_to_update: 1,
                sampled_hand: Some(Hole::try_from("Ah Kd").unwrap()),
                abstraction_params: AbstractionParams::default(),
                discount: None,
                seed: 42,
            },
        };
        let json = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(task, back);
    }

    #[test]
    fn variant_tags_round_trip() {
        for v in [Variant::Vanilla, Variant::ChanceSampling, Variant::Plus] {
            assert_eq!(Variant::from_tag(v.tag()), Some(v));
        }
        assert_eq!(Variant::from_tag(9), None);
    }
}
