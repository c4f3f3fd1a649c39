use gto_cards::*;
use gto_core::*;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::hash::Hash;
use std::hash::Hasher;

/// Knobs for the hand abstraction, carried inside every task payload so
/// workers bucket exactly the way the orchestrator expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct AbstractionParams {
    /// Postflop equity bucket count (K).
    pub equity_buckets: u16,
    /// Monte Carlo rollouts per equity estimate.
    pub equity_samples: u32,
    /// Raises offered per street before the ladder closes.
    pub max_raises: usize,
}

impl Default for AbstractionParams {
    fn default() -> Self {
        Self {
            equity_buckets: EQUITY_BUCKETS,
            equity_samples: EQUITY_SAMPLES,
            max_raises: MAX_RAISE_REPEATS,
        }
    }
}

/// Assigns a hand its abstraction bucket on the given board.
///
/// Preflop uses the 169-class canonical partition; postflop buckets are
/// `169 + floor(equity * K)` where equity is estimated against a uniform
/// opponent range. Deterministic: the rollout RNG is seeded from the
/// (hole, board) pair itself.
pub fn bucket(
    hole: Hole,
    board: &Board,
    params: &AbstractionParams,
    evaluator: &dyn Evaluate,
) -> Result<u16, EvaluatorError> {
    match board.street() {
        Street::Pref => Ok(preflop_bucket(hole)),
        _ => {
            let eq = equity(hole, board, params.equity_samples, evaluator)?;
            Ok(PREFLOP_BUCKETS + (eq * params.equity_buckets as f64).floor() as u16)
        }
    }
}

/// The canonical 169-class preflop partition: pairs on the diagonal, suited
/// combos in the upper triangle, offsuit in the lower.
pub fn preflop_bucket(hole: Hole) -> u16 {
    let hi = u8::from(hole.hi().rank()) as u16;
    let lo = u8::from(hole.lo().rank()) as u16;
    if hole.suited() {
        hi * 13 + lo
    } else {
        lo * 13 + hi
    }
}

/// Monte Carlo equity of `hole` on `board` against one uniform opponent
/// hand, with uniform runouts to the river.
pub fn equity(
    hole: Hole,
    board: &Board,
    samples: u32,
    evaluator: &dyn Evaluate,
) -> Result<Probability, EvaluatorError> {
    let dead = Hand::from(hole).union(board.cards());
    let mut rng = SmallRng::seed_from_u64(rollout_seed(hole, board));
    let mut score = 0.0;
    for _ in 0..samples {
        let mut deck = Deck::without(dead);
        let villain = deck.hole(&mut rng);
        let mut runout = board.cards();
        while runout.size() < 5 {
            runout = runout.add(deck.draw(&mut rng));
        }
        let hero = evaluator.strength(Hand::from(hole).union(runout))?;
        let them = evaluator.strength(Hand::from(villain).union(runout))?;
        score += match hero.cmp(&them) {
            std::cmp::Ordering::Greater => 1.0,
            std::cmp::Ordering::Equal => 0.5,
            std::cmp::Ordering::Less => 0.0,
        };
    }
    Ok(score / samples.max(1) as f64)
}

fn rollout_seed(hole: Hole, board: &Board) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    hole.hash(&mut hasher);
    board.hash(&mut hasher);
    hasher.finish()
}
