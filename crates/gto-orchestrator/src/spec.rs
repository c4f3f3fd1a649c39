use gto_cards::Board;
use gto_cfr::Discount;
use gto_cfr::TaskKind;
use gto_cfr::Variant;
use gto_core::*;
use gto_kernel::AbstractionParams;
use gto_kernel::GameConfig;
use gto_kernel::GameState;
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::OrchestratorError;

/// Solver-side knobs for one simulation.
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct SolverConfig {
    pub max_iterations: Epoch,
    pub target_exploitability: f64,
    /// Sampled-hand tasks per wave for the Monte Carlo variant.
    pub batch_size: u32,
    pub variant: Variant,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<Discount>,
    /// Recompute exploitability every this many closed waves.
    pub exploit_cadence: Epoch,
    /// Sampled hand pairs per exploitability estimate.
    pub exploit_samples: u32,
    /// Checkpoint every this many closed waves; zero disables.
    pub checkpoint_cadence: Epoch,
    /// Tolerated per-wave task loss for sampled variants.
    pub loss_fraction: f64,
    pub abstraction: AbstractionParams,
    /// Master seed; every task and estimate seed derives from it.
    pub seed: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1_000,
            target_exploitability: 0.0,
            batch_size: 64,
            variant: Variant::Vanilla,
            discount: None,
            exploit_cadence: EXPLOIT_CADENCE,
            exploit_samples: EXPLOIT_SAMPLES,
            checkpoint_cadence: CHECKPOINT_CADENCE,
            loss_fraction: LOSS_FRACTION,
            abstraction: AbstractionParams::default(),
            seed: 0,
        }
    }
}

/// Everything needed to run one simulation end to end.
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct SimulationSpec {
    pub kind: TaskKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub game: GameConfig,
    pub solver: SolverConfig,
}

impl SimulationSpec {
    /// Rejects specs the solver cannot honor. Nothing is mutated on
    /// rejection.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        let invalid = |m: String| Err(OrchestratorError::SpecInvalid(m));
        if !(2..=9).contains(&self.game.players) {
            return invalid(format!("num_players {} outside [2, 9]", self.game.players));
        }
        if self.game.small_blind <= 0 || self.game.big_blind <= 0 || self.game.stack <= 0 {
            return invalid(String::from("blinds and stacks must be positive"));
        }
        if self.game.big_blind < self.game.small_blind {
            return invalid(String::from("big blind below small blind"));
        }
        if self.solver.max_iterations == 0 {
            return invalid(String::from("iteration budget must be positive"));
        }
        if self.solver.target_exploitability < 0.0 {
            return invalid(String::from("exploitability target must be non-negative"));
        }
        if self.solver.variant.sampled() && self.solver.batch_size == 0 {
            return invalid(String::from("batch size must be positive when sampling"));
        }
        if !(0.0..1.0).contains(&self.solver.loss_fraction) {
            return invalid(String::from("loss fraction outside [0, 1)"));
        }
        Ok(())
    }

    /// The subtree root every task of this simulation solves from.
    ///
    /// Preflop simulations root at the blinds-posted start of the hand.
    /// Postflop simulations fast-forward through a limped preflop and fix
    /// the flop from the simulation seed, so every wave solves the same
    /// board.
    pub fn root_state(&self) -> Result<GameState, OrchestratorError> {
        let root = GameState::root(self.game.clone())
            .map_err(|e| OrchestratorError::SpecInvalid(e.to_string()))?;
        match self.kind {
            TaskKind::Preflop => Ok(root),
            TaskKind::Postflop => {
                let mut state = root;
                while let gto_kernel::Turn::Choice(_) = state.turn() {
                    let call = state
                        .legal()
                        .into_iter()
                        .find(|a| !a.is_aggro() && !matches!(a, gto_kernel::Action::Fold))
                        .expect("a passive action is always legal");
                    state = state.apply(call)?;
                }
                let mut rng = SmallRng::seed_from_u64(self.solver.seed ^ 0xB0A4D);
                Ok(state.reveal_random(&mut rng)?)
            }
        }
    }

    /// Fixed board of a postflop simulation, empty for preflop.
    pub fn board(&self) -> Result<Board, OrchestratorError> {
        Ok(self.root_state()?.board())
    }
}

/// Maps the ingress DTO onto a validated spec.
impl TryFrom<&gto_dto::CreateSimulation> for SimulationSpec {
    type Error = OrchestratorError;
    fn try_from(dto: &gto_dto::CreateSimulation) -> Result<Self, Self::Error> {
        let kind = match dto.simulation_type.as_str() {
            "preflop" => TaskKind::Preflop,
            "postflop" => TaskKind::Postflop,
            other => {
                return Err(OrchestratorError::SpecInvalid(format!(
                    "unknown simulation_type {:?}",
                    other
                )));
            }
        };
        let variant = if dto.solver_config.use_chance_sampling {
            Variant::ChanceSampling
        } else if dto.solver_config.use_regret_matching_plus {
            Variant::Plus
        } else {
            Variant::Vanilla
        };
        let discount = dto.solver_config.use_discounting.then(|| Discount {
            alpha: dto.solver_config.alpha.unwrap_or(Discount::default().alpha),
            beta: dto.solver_config.beta.unwrap_or(Discount::default().beta),
        });
        let defaults = SolverConfig::default();
        let spec = Self {
            kind,
            name: dto.name.clone(),
            description: dto.description.clone(),
            game: GameConfig {
                players: dto.game_config.num_players,
                stack: chips(dto.game_config.stack_size),
                small_blind: chips(dto.game_config.small_blind),
                big_blind: chips(dto.game_config.big_blind),
                bet_fractions: dto
                    .game_config
                    .allowed_bet_fractions
                    .as_ref()
                    .map(|fs| fs.iter().map(|f| (f * 1_000.0).round() as u32).collect())
                    .unwrap_or_else(|| gto_kernel::DEFAULT_FRACTIONS.to_vec()),
            },
            solver: SolverConfig {
                max_iterations: dto.solver_config.max_iterations,
                target_exploitability: dto.solver_config.target_exploitability,
                batch_size: dto.solver_config.batch_size.unwrap_or(defaults.batch_size),
                variant,
                discount,
                exploit_cadence: dto
                    .solver_config
                    .exploitability_frequency
                    .unwrap_or(defaults.exploit_cadence),
                exploit_samples: dto
                    .solver_config
                    .exploitability_samples
                    .unwrap_or(defaults.exploit_samples),
                checkpoint_cadence: dto
                    .solver_config
                    .checkpoint_frequency
                    .unwrap_or(defaults.checkpoint_cadence),
                loss_fraction: defaults.loss_fraction,
                abstraction: AbstractionParams::default(),
                seed: dto.solver_config.seed.unwrap_or(0),
            },
        };
        spec.validate()?;
        Ok(spec)
    }
}

/// Deterministic per-task seed derivation from the master seed.
pub fn task_seed(master: u64, iteration: Epoch, index: u32) -> u64 {
    let mut x = master
        ^ (iteration as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (index as u64 + 1).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    x ^= x >> 33;
    x = x.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
    x ^= x >> 33;
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> SimulationSpec {
        SimulationSpec {
            kind: TaskKind::Preflop,
            name: None,
            description: None,
            game: GameConfig::default(),
            solver: SolverConfig::default(),
        }
    }

    #[test]
    fn default_spec_validates() {
        assert!(spec().validate().is_ok());
    }

    #[test]
    fn player_count_is_bounded() {
        let mut s = spec();
        s.game.players = 1;
        assert!(s.validate().is_err());
        s.game.players = 10;
        assert!(s.validate().is_err());
        s.game.players = 9;
        assert!(s.validate().is_ok());
    }

    #[test]
    fn rejects_zero_iteration_budget_and_negative_target() {
        let mut s = spec();
        s.solver.max_iterations = 0;
        assert!(s.validate().is_err());
        let mut s = spec();
        s.solver.target_exploitability = -1.0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn postflop_root_is_a_fixed_flop() {
        let mut s = spec();
        s.kind = TaskKind::Postflop;
        let a = s.root_state().unwrap();
        let b = s.root_state().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.board().size(), 3);
    }

    #[test]
    fn task_seeds_spread() {
        let a = task_seed(1, 1, 0);
        let b = task_seed(1, 1, 1);
        let c = task_seed(1, 2, 0);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, task_seed(1, 1, 0));
    }

    #[test]
    fn dto_mapping_honors_variant_flags() {
        let dto: gto_dto::CreateSimulation = serde_json::from_value(serde_json::json!({
            "simulation_type": "preflop",
            "game_config": {
                "num_players": 2,
                "stack_size": 100.0,
                "small_blind": 0.5,
                "big_blind": 1.0
            },
            "solver_config": {
                "max_iterations": 100,
                "target_exploitability": 5.0,
                "use_chance_sampling": true,
                "batch_size": 64
            }
        }))
        .unwrap();
        let spec = SimulationSpec::try_from(&dto).unwrap();
        assert_eq!(spec.solver.variant, Variant::ChanceSampling);
        assert_eq!(spec.solver.batch_size, 64);
        assert_eq!(spec.game.small_blind, chips(0.5));
    }
}
