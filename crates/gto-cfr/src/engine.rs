use gto_cards::*;
use gto_core::*;
use gto_kernel::*;
use rand::SeedableRng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::rngs::SmallRng;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Instant;

use crate::*;

/// One CFR traversal over a task's subtree.
///
/// The engine walks the abstracted game tree depth-first, regret-matching
/// against the read-only [`StrategyView`] snapshot, and accumulates deltas
/// for the updating player's information sets. Chance events (hole cards
/// and board runouts) are drawn from the task's seeded RNG, so the same
/// task always produces the same deltas.
///
/// The walk checks its walltime deadline and the cancellation flag at every
/// state transition; breaching either aborts the whole task with no partial
/// output.
pub struct Engine<'a> {
    view: &'a dyn StrategyView,
    evaluator: &'a dyn Evaluate,
    discipline: Discipline,
    params: AbstractionParams,
    epoch: Epoch,
    updater: Position,
    deadline: Option<Instant>,
    cancelled: Option<&'a AtomicBool>,
    rng: SmallRng,
    regret_delta: Delta,
    strategy_delta: Delta,
    buckets: HashMap<(Hole, Board), u16>,
    nodes: u64,
}

impl<'a> Engine<'a> {
    /// Runs a task to completion and returns its deltas.
    pub fn execute(
        task: &Task,
        view: &'a dyn StrategyView,
        evaluator: &'a dyn Evaluate,
        deadline: Option<Instant>,
        cancelled: Option<&'a AtomicBool>,
    ) -> Result<Outcome, EngineError> {
        let payload = &task.payload;
        let n = payload.root_state.n();
        if payload.player_to_update >= n {
            return Err(EngineError::InvalidTask(format!(
                "player {} out of range for {} seats",
                payload.player_to_update, n
            )));
        }
        if let Some(hole) = payload.sampled_hand {
            if Hand::from(hole).collides(&payload.root_state.board().cards()) {
                return Err(EngineError::InvalidTask(String::from(
                    "sampled hand collides with the board",
                )));
            }
        }
        let mut rng = SmallRng::seed_from_u64(payload.seed);
        let state = payload
            .root_state
            .clone()
            .deal_holes(&mut rng, payload.sampled_hand.map(|h| (payload.player_to_update, h)));
        let mut engine = Self {
            view,
            evaluator,
            discipline: Discipline::new(payload.variant, payload.discount),
            params: payload.abstraction_params,
            epoch: task.iteration,
            updater: payload.player_to_update,
            deadline,
            cancelled,
            rng,
            regret_delta: Delta::new(),
            strategy_delta: Delta::new(),
            buckets: HashMap::new(),
            nodes: 0,
        };
        let mut reach = vec![1.0; n];
        let mut history = String::new();
        let values = engine.walk(&state, &mut reach, &mut history, 0)?;
        Ok(Outcome {
            regret_delta: engine.regret_delta,
            strategy_delta: engine.strategy_delta,
            value_estimates: values,
            nodes_visited: engine.nodes,
        })
    }

    fn walk(
        &mut self,
        state: &GameState,
        reach: &mut Vec<Probability>,
        history: &mut String,
        aggression: usize,
    ) -> Result<Vec<Utility>, EngineError> {
        self.nodes += 1;
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(EngineError::BudgetExceeded);
            }
        }
        if let Some(flag) = self.cancelled {
            if flag.load(Ordering::Relaxed) {
                return Err(EngineError::Cancelled);
            }
        }
        match state.turn() {
            Turn::Terminal => Ok(state.payoffs(self.evaluator)?),
            Turn::Chance => {
                let next = state.reveal_random(&mut self.rng)?;
                let mark = history.len();
                history.push('/');
                let values = self.walk(&next, reach, history, 0);
                history.truncate(mark);
                values
            }
            Turn::Choice(p) => {
                let actions = abstract_actions(state, aggression, self.params.max_raises);
                let arity = actions.len();
                let key = self.key(state, p, history)?;
                let sigma = self.sigma(&key, arity)?;
                if self.discipline.samples_opponents() && p != self.updater {
                    let i = self.sample(&sigma);
                    return self.descend(state, reach, history, aggression, p, actions[i], sigma[i]);
                }
                let mut action_values = Vec::with_capacity(arity);
                let mut node_values = vec![0.0; state.n()];
                for (i, action) in actions.iter().enumerate() {
                    let values =
                        self.descend(state, reach, history, aggression, p, *action, sigma[i])?;
                    for (acc, v) in node_values.iter_mut().zip(values.iter()) {
                        *acc += sigma[i] * v;
                    }
                    action_values.push(values);
                }
                if p == self.updater {
                    self.update(&key, p, reach, &sigma, &action_values, &node_values)?;
                }
                Ok(node_values)
            }
        }
    }

    /// Applies one action and recurses, restoring reach and history on the
    /// way back up.
    fn descend(
        &mut self,
        state: &GameState,
        reach: &mut Vec<Probability>,
        history: &mut String,
        aggression: usize,
        p: Position,
        action: Action,
        weight: Probability,
    ) -> Result<Vec<Utility>, EngineError> {
        let next = state.apply(action)?;
        let saved = reach[p];
        reach[p] *= weight;
        let mark = history.len();
        if !(history.is_empty() || history.ends_with('/')) {
            history.push('.');
        }
        history.push_str(&action.symbol());
        let deeper = if action.is_aggro() {
            aggression + 1
        } else {
            aggression
        };
        let values = self.walk(&next, reach, history, deeper);
        history.truncate(mark);
        reach[p] = saved;
        values
    }

    /// Folds this node's regret and strategy deltas into the accumulators.
    fn update(
        &mut self,
        key: &InfoSetKey,
        p: Position,
        reach: &[Probability],
        sigma: &[Probability],
        action_values: &[Vec<Utility>],
        node_values: &[Utility],
    ) -> Result<(), EngineError> {
        let arity = sigma.len();
        let aw = self.discipline.action_weighting(self.epoch);
        let sw = self.discipline.strategy_weighting(self.epoch);
        let cfreach = reach
            .iter()
            .enumerate()
            .filter(|(q, _)| *q != p)
            .map(|(_, r)| r)
            .product::<Probability>();
        let regrets = self
            .regret_delta
            .entry(key.clone())
            .or_insert_with(|| vec![0.0; arity]);
        if regrets.len() != arity {
            return Err(EngineError::Integrity(KernelError::ArityMismatch {
                expected: regrets.len(),
                got: arity,
            }));
        }
        for i in 0..arity {
            regrets[i] += aw * (action_values[i][p] - node_values[p]);
        }
        let strategies = self
            .strategy_delta
            .entry(key.clone())
            .or_insert_with(|| vec![0.0; arity]);
        for i in 0..arity {
            strategies[i] += sw * cfreach * sigma[i];
        }
        Ok(())
    }

    /// The acting player's information-set identity at this node.
    fn key(
        &mut self,
        state: &GameState,
        p: Position,
        history: &str,
    ) -> Result<InfoSetKey, EngineError> {
        let hole = state.seats()[p]
            .cards()
            .ok_or_else(|| EngineError::InvalidTask(format!("seat {} has no hole cards", p)))?;
        let board = state.board();
        let bucket = match self.buckets.get(&(hole, board)) {
            Some(b) => *b,
            None => {
                let b = bucket(hole, &board, &self.params, self.evaluator)?;
                self.buckets.insert((hole, board), b);
                b
            }
        };
        Ok(InfoSetKey::new(
            p,
            state.street(),
            board_class(&board),
            history.to_string(),
            bucket,
        ))
    }

    /// Immediate strategy for this set, checked against the action arity.
    fn sigma(&self, key: &InfoSetKey, arity: usize) -> Result<Vec<Probability>, EngineError> {
        match self.view.regrets(key) {
            Some(regrets) if regrets.len() == arity => Ok(regret_match(&regrets)),
            Some(regrets) => Err(EngineError::Integrity(KernelError::ArityMismatch {
                expected: regrets.len(),
                got: arity,
            })),
            None => Ok(uniform(arity)),
        }
    }

    /// Samples an action index from a strategy distribution.
    fn sample(&mut self, sigma: &[Probability]) -> usize {
        WeightedIndex::new(sigma)
            .expect("regret matching yields a proper distribution")
            .sample(&mut self.rng)
    }
}
