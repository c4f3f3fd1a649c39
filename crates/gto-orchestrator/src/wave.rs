use gto_cards::Deck;
use gto_cfr::Task;
use gto_cfr::TaskPayload;
use gto_core::*;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::collections::HashMap;
use std::time::Duration;
use std::time::Instant;

use crate::OrchestratorError;
use crate::SimulationSpec;
use crate::task_seed;

/// Task dispatch lifecycle within a wave:
/// `Pending → Dispatched → (Done | Failed)`, with timeouts and worker
/// failures looping back through `Dispatched` until the retry budget is
/// spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Dispatched,
    Done,
    Failed,
}

/// What the wave decides about a failure or timeout report.
#[derive(Debug, Clone)]
pub enum Disposition {
    /// Unknown or already-terminal task: drop the report (idempotency
    /// against redelivery and duplicates).
    Ignore,
    /// Retry budget remains: republish this re-stamped task.
    Retry(Task),
    /// Budget exhausted: the task is terminally failed.
    Exhausted,
}

#[derive(Debug)]
struct Slot {
    task: Task,
    state: TaskState,
    node: Option<ID<Node>>,
    deadline: Instant,
}

/// All tasks emitted for one iteration of one simulation.
///
/// The wave closes when every slot is terminal; the caller then judges the
/// loss fraction. No partial-wave state leaks out: iteration counters only
/// advance after closure.
pub struct Wave {
    iteration: Epoch,
    window: Duration,
    slots: HashMap<ID<Task>, Slot>,
}

impl Wave {
    pub fn new(tasks: Vec<Task>, window: Duration) -> Self {
        let iteration = tasks.first().map(|t| t.iteration).unwrap_or(0);
        Self {
            iteration,
            window,
            slots: tasks
                .into_iter()
                .map(|task| {
                    (
                        task.task_id,
                        Slot {
                            task,
                            state: TaskState::Pending,
                            node: None,
                            deadline: Instant::now() + window,
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn iteration(&self) -> Epoch {
        self.iteration
    }
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Tasks not yet pushed onto the queue, in creation order so dispatch
    /// is deterministic.
    pub fn unpublished(&self) -> Vec<Task> {
        let mut tasks = self
            .slots
            .values()
            .filter(|s| s.state == TaskState::Pending)
            .map(|s| s.task.clone())
            .collect::<Vec<_>>();
        tasks.sort_by_key(|t| t.task_id);
        tasks
    }

    pub fn mark_dispatched(&mut self, id: ID<Task>) {
        if let Some(slot) = self.slots.get_mut(&id) {
            if slot.state == TaskState::Pending {
                slot.state = TaskState::Dispatched;
                slot.deadline = Instant::now() + self.window;
            }
        }
    }

    /// Records which node claimed a task.
    pub fn attribute(&mut self, id: ID<Task>, node: ID<Node>) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.node = Some(node);
        }
    }

    /// Marks a task done. Returns false for unknown or already-terminal
    /// ids, in which case the caller must not fold the result again.
    pub fn complete(&mut self, id: ID<Task>) -> bool {
        match self.slots.get_mut(&id) {
            Some(slot) if matches!(slot.state, TaskState::Pending | TaskState::Dispatched) => {
                slot.state = TaskState::Done;
                true
            }
            _ => false,
        }
    }

    /// Handles a worker-reported failure.
    pub fn fail(&mut self, id: ID<Task>) -> Disposition {
        self.retry_or_exhaust(id)
    }

    /// Dispatched tasks whose deadline passed are treated as lost and
    /// retried; each disposition is returned for the caller to act on.
    pub fn timeouts(&mut self) -> Vec<Disposition> {
        let now = Instant::now();
        let expired = self
            .slots
            .values()
            .filter(|s| s.state == TaskState::Dispatched && now >= s.deadline)
            .map(|s| s.task.task_id)
            .collect::<Vec<_>>();
        expired
            .into_iter()
            .map(|id| self.retry_or_exhaust(id))
            .collect()
    }

    /// Immediately reissues tasks attributed to a node that went offline.
    pub fn orphaned(&mut self, node: ID<Node>) -> Vec<Disposition> {
        let held = self
            .slots
            .values()
            .filter(|s| s.state == TaskState::Dispatched && s.node == Some(node))
            .map(|s| s.task.task_id)
            .collect::<Vec<_>>();
        held.into_iter()
            .map(|id| self.retry_or_exhaust(id))
            .collect()
    }

    fn retry_or_exhaust(&mut self, id: ID<Task>) -> Disposition {
        match self.slots.get_mut(&id) {
            Some(slot) if matches!(slot.state, TaskState::Pending | TaskState::Dispatched) => {
                if slot.task.retry_count < MAX_TASK_RETRIES {
                    slot.task.retry_count += 1;
                    slot.node = None;
                    slot.state = TaskState::Dispatched;
                    slot.deadline = Instant::now() + self.window;
                    Disposition::Retry(slot.task.clone())
                } else {
                    slot.state = TaskState::Failed;
                    Disposition::Exhausted
                }
            }
            _ => Disposition::Ignore,
        }
    }

    /// True once every slot is terminal.
    pub fn is_closed(&self) -> bool {
        self.slots
            .values()
            .all(|s| matches!(s.state, TaskState::Done | TaskState::Failed))
    }

    /// Fraction of the wave that terminally failed.
    pub fn lost_fraction(&self) -> f64 {
        let failed = self
            .slots
            .values()
            .filter(|s| s.state == TaskState::Failed)
            .count();
        failed as f64 / self.slots.len().max(1) as f64
    }
}

/// Splits one iteration of a simulation into its wave of tasks.
///
/// Deterministic variants emit one task per updating player over the whole
/// abstract tree; the sampled variant emits `batch_size` tasks, each pinned
/// to a hand drawn from the deck minus the board, rotating the updating
/// player.
pub fn decompose(
    simulation_id: ID<Sim>,
    spec: &SimulationSpec,
    iteration: Epoch,
) -> Result<Vec<Task>, OrchestratorError> {
    let root = spec.root_state()?;
    let solver = &spec.solver;
    let payload = |player: Position, sampled, index: u32| TaskPayload {
        variant: solver.variant,
        root_state: root.clone(),
        player_to_update: player,
        sampled_hand: sampled,
        abstraction_params: solver.abstraction,
        discount: solver.discount,
        seed: task_seed(solver.seed, iteration, index),
    };
    let task = |payload| Task {
        task_id: ID::default(),
        simulation_id,
        iteration,
        kind: spec.kind,
        retry_count: 0,
        payload,
    };
    if solver.variant.sampled() {
        let mut rng = SmallRng::seed_from_u64(task_seed(solver.seed, iteration, u32::MAX));
        let board = root.board().cards();
        Ok((0..solver.batch_size)
            .map(|i| {
                let hole = Deck::without(board).hole(&mut rng);
                task(payload(i as usize % spec.game.players, Some(hole), i))
            })
            .collect())
    } else {
        Ok((0..spec.game.players)
            .map(|p| task(payload(p, None, p as u32)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SolverConfig;
    use gto_cfr::TaskKind;
    use gto_cfr::Variant;
    use gto_kernel::GameConfig;

    fn spec(variant: Variant) -> SimulationSpec {
        SimulationSpec {
            kind: TaskKind::Preflop,
            name: None,
            description: None,
            game: GameConfig::default(),
            solver: SolverConfig {
                variant,
                batch_size: 8,
                seed: 3,
                ..SolverConfig::default()
            },
        }
    }

    fn wave(n: usize) -> Wave {
        let tasks = decompose(
            ID::default(),
            &spec(Variant::ChanceSampling),
            1,
        )
        .unwrap()
        .into_iter()
        .take(n)
        .collect();
        Wave::new(tasks, Duration::from_secs(60))
    }

    #[test]
    fn vanilla_emits_one_task_per_player() {
        let tasks = decompose(ID::default(), &spec(Variant::Vanilla), 0).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].payload.player_to_update, 0);
        assert_eq!(tasks[1].payload.player_to_update, 1);
        assert!(tasks.iter().all(|t| t.payload.sampled_hand.is_none()));
    }

    #[test]
    fn sampling_emits_the_batch_with_hands() {
        let tasks = decompose(ID::default(), &spec(Variant::ChanceSampling), 2).unwrap();
        assert_eq!(tasks.len(), 8);
        assert!(tasks.iter().all(|t| t.payload.sampled_hand.is_some()));
    }

    #[test]
    fn decomposition_is_deterministic_but_per_iteration() {
        let id = ID::default();
        let a = decompose(id, &spec(Variant::ChanceSampling), 5).unwrap();
        let b = decompose(id, &spec(Variant::ChanceSampling), 5).unwrap();
        let c = decompose(id, &spec(Variant::ChanceSampling), 6).unwrap();
        let hands = |ts: &[Task]| {
            ts.iter()
                .map(|t| t.payload.sampled_hand)
                .collect::<Vec<_>>()
        };
        assert_eq!(hands(&a), hands(&b));
        assert_ne!(hands(&a), hands(&c));
    }

    #[test]
    fn duplicate_completion_is_ignored() {
        let mut wave = wave(2);
        let id = wave.unpublished()[0].task_id;
        wave.mark_dispatched(id);
        assert!(wave.complete(id));
        assert!(!wave.complete(id));
        assert!(matches!(wave.fail(id), Disposition::Ignore));
    }

    #[test]
    fn failures_retry_then_exhaust() {
        let mut wave = wave(1);
        let id = wave.unpublished()[0].task_id;
        wave.mark_dispatched(id);
        for attempt in 1..=MAX_TASK_RETRIES {
            match wave.fail(id) {
                Disposition::Retry(task) => assert_eq!(task.retry_count, attempt),
                other => panic!("expected retry, got {:?}", other),
            }
        }
        assert!(matches!(wave.fail(id), Disposition::Exhausted));
        assert!(wave.is_closed());
        assert_eq!(wave.lost_fraction(), 1.0);
    }

    #[test]
    fn orphaned_tasks_are_reissued() {
        let mut wave = wave(2);
        let ids = wave
            .unpublished()
            .iter()
            .map(|t| t.task_id)
            .collect::<Vec<_>>();
        let node = ID::default();
        for id in ids.iter() {
            wave.mark_dispatched(*id);
        }
        wave.attribute(ids[0], node);
        let reissued = wave.orphaned(node);
        assert_eq!(reissued.len(), 1);
        assert!(matches!(reissued[0], Disposition::Retry(_)));
    }

    #[test]
    fn closes_only_when_all_terminal() {
        let mut wave = wave(2);
        let ids = wave
            .unpublished()
            .iter()
            .map(|t| t.task_id)
            .collect::<Vec<_>>();
        assert!(!wave.is_closed());
        wave.complete(ids[0]);
        assert!(!wave.is_closed());
        wave.complete(ids[1]);
        assert!(wave.is_closed());
        assert_eq!(wave.lost_fraction(), 0.0);
    }
}
