//! End-to-end scenarios over an in-process grid: a real orchestrator, the
//! in-memory bus and cache, and real worker agents, exercising the full
//! dispatch → solve → aggregate → converge cycle.

use gto_bus::*;
use gto_cards::Showdown;
use gto_cfr::*;
use gto_core::*;
use gto_kernel::AbstractionParams;
use gto_kernel::GameConfig;
use gto_orchestrator::*;
use gto_registry::NodeSpec;
use gto_registry::NodeStatus;
use gto_registry::Registry;
use gto_worker::Agent;
use gto_worker::AgentConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

struct Grid {
    orchestrator: Arc<Orchestrator>,
    bus: Arc<MemoryBus>,
    cache: Arc<MemoryCache>,
    registry: Arc<Registry>,
    queues: Queues,
}

fn grid_with(offline_after: Duration, task_deadline: Duration) -> Grid {
    let settings = Settings {
        task_deadline,
        ..Settings::default()
    };
    let queues = Queues::from(&settings);
    let bus = Arc::new(MemoryBus::default());
    let cache = Arc::new(MemoryCache::default());
    let registry = Arc::new(Registry::new(offline_after));
    let orchestrator = Orchestrator::new(
        settings,
        bus.clone(),
        cache.clone(),
        Arc::new(MemoryArtifacts::default()),
        registry.clone(),
        Arc::new(Showdown),
    );
    orchestrator.spawn_pumps(Duration::from_millis(100));
    Grid {
        orchestrator,
        bus,
        cache,
        registry,
        queues,
    }
}

fn grid() -> Grid {
    grid_with(Duration::from_secs(60), Duration::from_secs(60))
}

/// Spawns a real worker agent against the grid's bus and cache.
fn spawn_agent(grid: &Grid, max_concurrent: usize) -> NodeSpec {
    let node = NodeSpec {
        platform: String::from("test"),
        max_concurrent,
        ..NodeSpec::local(max_concurrent)
    };
    let config = AgentConfig {
        node: node.clone(),
        heartbeat_every: Duration::from_millis(100),
        task_deadline: Duration::from_secs(60),
    };
    let agent = Agent::new(
        grid.bus.clone(),
        grid.cache.clone(),
        Arc::new(Showdown),
        grid.queues.clone(),
        config,
    );
    tokio::spawn(agent.run());
    node
}

/// The S1 heads-up spec: 2 players, 100bb, 0.5/1.0 blinds, a single
/// pot-size raise ladder, and one raise per street to keep trees tight.
fn heads_up_spec(variant: Variant, max_iterations: Epoch) -> SimulationSpec {
    SimulationSpec {
        kind: TaskKind::Preflop,
        name: Some(String::from("heads-up")),
        description: None,
        game: GameConfig {
            players: 2,
            stack: chips(100.0),
            small_blind: chips(0.5),
            big_blind: chips(1.0),
            bet_fractions: vec![1_000],
        },
        solver: SolverConfig {
            max_iterations,
            target_exploitability: 5.0,
            batch_size: 16,
            variant,
            discount: None,
            exploit_cadence: 0,
            exploit_samples: 8,
            checkpoint_cadence: 0,
            loss_fraction: 0.1,
            abstraction: AbstractionParams {
                equity_buckets: 10,
                equity_samples: 30,
                max_raises: 1,
            },
            seed: 42,
        },
    }
}

async fn wait_terminal(grid: &Grid, id: ID<Sim>, budget: Duration) -> String {
    let deadline = tokio::time::Instant::now() + budget;
    loop {
        let status = grid.orchestrator.status(id).await.unwrap();
        if ["completed", "failed", "cancelled"].contains(&status.status.as_str()) {
            return status.status;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "simulation stuck in {}",
            status.status
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

// ---------------------------------------------------------------------
// S1: minimal heads-up preflop run to completion
// ---------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn s1_minimal_heads_up_vanilla_run() {
    let grid = grid();
    spawn_agent(&grid, 2);
    let id = grid
        .orchestrator
        .create(heads_up_spec(Variant::Vanilla, 100))
        .await
        .unwrap();
    assert_eq!(grid.orchestrator.status(id).await.unwrap().status, "pending");
    grid.orchestrator.start(id).await.unwrap();
    let final_status = wait_terminal(&grid, id, Duration::from_secs(300)).await;
    assert_eq!(final_status, "completed");

    let results = grid.orchestrator.results(id).await.unwrap();
    assert_eq!(results.iterations_completed, 100);
    assert!(results.final_exploitability.is_finite());
    assert!(results.final_exploitability >= 0.0);
    assert!(results.convergence_time_seconds >= 0.0);

    // the dealer's root information sets carry one entry per abstracted
    // action, summing to one
    let view = grid.orchestrator.strategy_view(id).await.unwrap();
    let root_arity = {
        let root = heads_up_spec(Variant::Vanilla, 100).root_state().unwrap();
        gto_kernel::abstract_actions(&root, 0, 1).len()
    };
    let roots = view
        .0
        .iter()
        .filter(|(k, _)| k.player() == 0 && k.history().is_empty())
        .collect::<Vec<_>>();
    assert!(!roots.is_empty());
    for (_, node) in roots {
        let average = node.average();
        assert_eq!(average.len(), root_arity);
        assert!((average.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn exploitability_target_completes_early() {
    let grid = grid();
    spawn_agent(&grid, 2);
    let mut spec = heads_up_spec(Variant::Vanilla, 1_000);
    spec.solver.exploit_cadence = 1;
    spec.solver.target_exploitability = 1_000.0;
    let id = grid.orchestrator.create(spec).await.unwrap();
    grid.orchestrator.start(id).await.unwrap();
    assert_eq!(
        wait_terminal(&grid, id, Duration::from_secs(60)).await,
        "completed"
    );
    let results = grid.orchestrator.results(id).await.unwrap();
    assert_eq!(results.iterations_completed, 1);
    assert!(results.final_exploitability <= 1_000.0);
}

// ---------------------------------------------------------------------
// S2: a worker failure is retried without duplicate accumulation
// ---------------------------------------------------------------------

/// A scripted worker: solves every task deterministically, optionally
/// failing the first task it sees for one iteration.
fn spawn_scripted_worker(grid: &Grid, fail_at: Option<Epoch>) {
    let bus = grid.bus.clone();
    let cache = grid.cache.clone();
    let queues = grid.queues.clone();
    let node = ID::<Node>::default();
    tokio::spawn(async move {
        let mut injected = false;
        loop {
            for queue in [&queues.preflop, &queues.postflop] {
                let Ok(Some(delivery)) = bus.consume(queue, Duration::from_millis(20)).await
                else {
                    continue;
                };
                let task: Task = delivery.envelope.parse().unwrap();
                let fail = fail_at == Some(task.iteration) && !injected;
                let result = if fail {
                    injected = true;
                    TaskResult::failed(&task, node, 1, String::from("injected fault"))
                } else {
                    let view = match cache.get(&strategy_key(task.simulation_id)).await {
                        Ok(Some(bytes)) => TableView(Checkpoint::decode(&bytes).unwrap().nodes),
                        _ => TableView::default(),
                    };
                    let outcome =
                        Engine::execute(&task, &view, &Showdown, None, None).unwrap();
                    TaskResult::completed(&task, node, 1, outcome)
                };
                bus.publish(&queues.results, Envelope::new(kind::RESULT, &result))
                    .await
                    .unwrap();
                bus.ack(queue, &delivery.tag).await.unwrap();
            }
        }
    });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn s2_retry_on_worker_failure_accumulates_once() {
    let run = |fail_at: Option<Epoch>| async move {
        let grid = grid();
        spawn_scripted_worker(&grid, fail_at);
        let id = grid
            .orchestrator
            .create(heads_up_spec(Variant::Vanilla, 100))
            .await
            .unwrap();
        grid.orchestrator.start(id).await.unwrap();
        assert_eq!(
            wait_terminal(&grid, id, Duration::from_secs(300)).await,
            "completed"
        );
        assert_eq!(
            grid.orchestrator.status(id).await.unwrap().iterations_completed,
            100
        );
        grid.orchestrator.strategy_view(id).await.unwrap()
    };
    let flaky = run(Some(3)).await;
    let clean = run(None).await;
    assert_eq!(
        flaky.0.keys().collect::<Vec<_>>(),
        clean.0.keys().collect::<Vec<_>>()
    );
    for (key, node) in flaky.0.iter() {
        let other = clean.0.get(key).unwrap();
        for (a, b) in node.regret_sum.iter().zip(other.regret_sum.iter()) {
            assert!((a - b).abs() < 1e-9, "regret diverged at {}", key);
        }
        for (a, b) in node.strategy_sum.iter().zip(other.strategy_sum.iter()) {
            assert!((a - b).abs() < 1e-9, "strategy diverged at {}", key);
        }
    }
}

// ---------------------------------------------------------------------
// S3: node liveness eviction reissues the orphaned task
// ---------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn s3_offline_node_eviction_reissues_tasks() {
    let grid = grid_with(Duration::from_millis(500), Duration::from_secs(10));

    // n1 registers, claims one task, then goes silent without reporting
    let n1 = NodeSpec {
        platform: String::from("test"),
        ..NodeSpec::local(1)
    };
    let zombie = {
        let bus = grid.bus.clone();
        let queues = grid.queues.clone();
        let n1 = n1.clone();
        tokio::spawn(async move {
            bus.publish(&queues.heartbeats, Envelope::new(kind::REGISTER, &n1))
                .await
                .unwrap();
            let delivery = loop {
                if let Ok(Some(d)) = bus.consume(&queues.preflop, Duration::from_millis(20)).await
                {
                    break d;
                }
            };
            let task: Task = delivery.envelope.parse().unwrap();
            let claim = gto_registry::Claim {
                node_id: n1.node_id,
                task_id: task.task_id.inner(),
                simulation_id: task.simulation_id.inner(),
            };
            bus.publish(&queues.control, Envelope::new(kind::CLAIM, &claim))
                .await
                .unwrap();
            // hold the task forever
        })
    };

    let id = grid
        .orchestrator
        .create(heads_up_spec(Variant::Vanilla, 2))
        .await
        .unwrap();
    grid.orchestrator.start(id).await.unwrap();

    // give the zombie time to grab its task before the healthy node joins
    tokio::time::sleep(Duration::from_millis(300)).await;
    let n2 = spawn_agent(&grid, 2);

    assert_eq!(
        wait_terminal(&grid, id, Duration::from_secs(120)).await,
        "completed"
    );
    zombie.abort();

    let n1_record = grid.registry.get(n1.node_id).await.unwrap();
    assert_eq!(n1_record.status, NodeStatus::Offline);
    assert_eq!(n1_record.current_tasks, 0);
    let n2_record = grid.registry.get(n2.node_id).await.unwrap();
    assert!(n2_record.status != NodeStatus::Offline);
    assert!(n2_record.total_completed >= 1);
}

// ---------------------------------------------------------------------
// S4: cancellation mid-run
// ---------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn s4_cancellation_mid_run() {
    let grid = grid();
    spawn_agent(&grid, 2);
    let mut events = grid.orchestrator.subscribe();
    let id = grid
        .orchestrator
        .create(heads_up_spec(Variant::Vanilla, 10_000))
        .await
        .unwrap();
    grid.orchestrator.start(id).await.unwrap();

    // run for a while, then pull the plug
    loop {
        let event = timeout(Duration::from_secs(120), events.recv())
            .await
            .expect("progress keeps flowing")
            .unwrap();
        if event.iterations >= 200 {
            break;
        }
    }
    grid.orchestrator.cancel(id).await.unwrap();
    assert_eq!(grid.orchestrator.status(id).await.unwrap().status, "cancelled");

    // the cancellation event is the last one; nothing follows it
    let mut saw_cancelled = false;
    loop {
        match timeout(Duration::from_millis(700), events.recv()).await {
            Ok(Ok(event)) => {
                assert!(!saw_cancelled, "event after cancellation: {:?}", event);
                saw_cancelled = event.phase == Phase::Cancelled;
            }
            _ => break,
        }
    }
    assert!(saw_cancelled);

    // late results for the cancelled simulation are dropped and acked
    let drained = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if grid.bus.depth(&grid.queues.results).await.unwrap() == 0 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < drained,
            "stale results were not drained"
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(matches!(
        grid.orchestrator.results(id).await,
        Err(OrchestratorError::NotCompleted(_))
    ));
}

// ---------------------------------------------------------------------
// S5: checkpoint, restart, resume: same answer as an unbroken run
// ---------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn s5_checkpoint_resume_matches_unbroken_run() {
    // single-slot agents keep result arrival order deterministic, so the
    // two runs are comparable to within float addition noise
    let reference = {
        let grid = grid();
        spawn_agent(&grid, 1);
        let id = grid
            .orchestrator
            .create(heads_up_spec(Variant::Vanilla, 100))
            .await
            .unwrap();
        grid.orchestrator.start(id).await.unwrap();
        assert_eq!(
            wait_terminal(&grid, id, Duration::from_secs(300)).await,
            "completed"
        );
        grid.orchestrator.strategy_view(id).await.unwrap()
    };

    // interrupted run: 50 iterations, checkpoint, "restart", resume to 100
    let grid = grid();
    spawn_agent(&grid, 1);
    let half = grid
        .orchestrator
        .create(heads_up_spec(Variant::Vanilla, 50))
        .await
        .unwrap();
    grid.orchestrator.start(half).await.unwrap();
    assert_eq!(
        wait_terminal(&grid, half, Duration::from_secs(300)).await,
        "completed"
    );
    let checkpoint = {
        let status = grid.orchestrator.status(half).await.unwrap();
        assert_eq!(status.iterations_completed, 50);
        let handle = grid.orchestrator.strategy_view(half).await.unwrap();
        assert!(!handle.0.is_empty());
        Checkpoint {
            iteration: 50,
            variant: Variant::Vanilla,
            nodes: handle.0,
            rng_seed: None,
        }
        .encode()
    };

    let resumed = grid
        .orchestrator
        .restore(heads_up_spec(Variant::Vanilla, 100), &checkpoint)
        .await
        .unwrap();
    grid.orchestrator.start(resumed).await.unwrap();
    assert_eq!(
        wait_terminal(&grid, resumed, Duration::from_secs(300)).await,
        "completed"
    );
    let resumed_view = grid.orchestrator.strategy_view(resumed).await.unwrap();

    assert_eq!(
        reference.0.keys().collect::<Vec<_>>(),
        resumed_view.0.keys().collect::<Vec<_>>()
    );
    for (key, node) in reference.0.iter() {
        let other = resumed_view.0.get(key).unwrap();
        for (a, b) in node
            .strategy_sum
            .iter()
            .chain(node.regret_sum.iter())
            .zip(other.strategy_sum.iter().chain(other.regret_sum.iter()))
        {
            assert!((a - b).abs() < 1e-9, "diverged at {}", key);
        }
    }
}

// ---------------------------------------------------------------------
// S6: chance-sampling batches tolerate bounded loss
// ---------------------------------------------------------------------

/// Fails tasks whose id hashes into roughly one-sixteenth of the space,
/// persistently, so they exhaust retries and count as wave loss.
fn spawn_lossy_worker(
    grid: &Grid,
    seen: Arc<tokio::sync::Mutex<std::collections::HashMap<Epoch, std::collections::HashSet<uuid::Uuid>>>>,
) {
    let bus = grid.bus.clone();
    let cache = grid.cache.clone();
    let queues = grid.queues.clone();
    let node = ID::<Node>::default();
    tokio::spawn(async move {
        loop {
            for queue in [&queues.preflop, &queues.postflop] {
                let Ok(Some(delivery)) = bus.consume(queue, Duration::from_millis(20)).await
                else {
                    continue;
                };
                let task: Task = delivery.envelope.parse().unwrap();
                seen.lock()
                    .await
                    .entry(task.iteration)
                    .or_default()
                    .insert(task.task_id.inner());
                let doomed = task.task_id.inner().as_bytes()[15] % 64 == 0;
                let result = if doomed {
                    TaskResult::failed(&task, node, 1, String::from("injected loss"))
                } else {
                    let view = match cache.get(&strategy_key(task.simulation_id)).await {
                        Ok(Some(bytes)) => TableView(Checkpoint::decode(&bytes).unwrap().nodes),
                        _ => TableView::default(),
                    };
                    let outcome =
                        Engine::execute(&task, &view, &Showdown, None, None).unwrap();
                    TaskResult::completed(&task, node, 1, outcome)
                };
                bus.publish(&queues.results, Envelope::new(kind::RESULT, &result))
                    .await
                    .unwrap();
                bus.ack(queue, &delivery.tag).await.unwrap();
            }
        }
    });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn s6_chance_sampling_batches_advance_under_loss() {
    let grid = grid();
    let seen = Arc::new(tokio::sync::Mutex::new(std::collections::HashMap::new()));
    spawn_lossy_worker(&grid, seen.clone());
    let mut spec = heads_up_spec(Variant::ChanceSampling, 3);
    spec.solver.batch_size = 64;
    let id = grid.orchestrator.create(spec).await.unwrap();
    grid.orchestrator.start(id).await.unwrap();
    assert_eq!(
        wait_terminal(&grid, id, Duration::from_secs(300)).await,
        "completed"
    );
    assert_eq!(
        grid.orchestrator.status(id).await.unwrap().iterations_completed,
        3
    );
    // each wave dispatched its full batch of 64 distinct tasks
    let seen = seen.lock().await;
    for iteration in 0..3 {
        assert_eq!(
            seen.get(&iteration).map(|s| s.len()),
            Some(64),
            "wave {} batch size",
            iteration
        );
    }
}

// ---------------------------------------------------------------------
// validation and lifecycle edges
// ---------------------------------------------------------------------

#[tokio::test]
async fn create_rejects_invalid_specs_without_mutation() {
    let grid = grid();
    let mut spec = heads_up_spec(Variant::Vanilla, 100);
    spec.game.players = 1;
    assert!(matches!(
        grid.orchestrator.create(spec).await,
        Err(OrchestratorError::SpecInvalid(_))
    ));
    let list = grid.orchestrator.list(&gto_dto::ListFilter::default()).await;
    assert_eq!(list.total, 0);
}

#[tokio::test]
async fn start_is_single_shot_and_ids_are_checked() {
    let grid = grid();
    let unknown = ID::default();
    assert!(matches!(
        grid.orchestrator.status(unknown).await,
        Err(OrchestratorError::NotFound(_))
    ));
    let id = grid
        .orchestrator
        .create(heads_up_spec(Variant::Vanilla, 100))
        .await
        .unwrap();
    grid.orchestrator.start(id).await.unwrap();
    assert!(matches!(
        grid.orchestrator.start(id).await,
        Err(OrchestratorError::AlreadyStarted(_))
    ));
    grid.orchestrator.cancel(id).await.unwrap();
}

#[tokio::test]
async fn queue_status_reflects_the_grid() {
    let grid = grid();
    let status = grid.orchestrator.queue_status().await;
    assert!(status.connected);
    assert_eq!(status.preflop_tasks, 0);
    grid.bus
        .publish(&grid.queues.preflop, Envelope::new(kind::TASK, &1u32))
        .await
        .unwrap();
    let status = grid.orchestrator.queue_status().await;
    assert_eq!(status.preflop_tasks, 1);
}
