use gto_bus::*;
use gto_cards::Evaluate;
use gto_cfr::*;
use gto_core::*;
use gto_registry::Claim;
use gto_registry::NodeSpec;
use gto_registry::Telemetry;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Agent tuning knobs. The node spec's `kinds` decide which work queues
/// this agent pulls.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub node: NodeSpec,
    pub heartbeat_every: Duration,
    pub task_deadline: Duration,
}

impl AgentConfig {
    pub fn new(node: NodeSpec, settings: &Settings) -> Self {
        Self {
            node,
            heartbeat_every: Duration::from_secs(10),
            task_deadline: settings.task_deadline,
        }
    }
}

/// One worker process: a task pool plus a heartbeat loop.
pub struct Agent {
    bus: Arc<dyn Bus>,
    cache: Arc<dyn ByteCache>,
    evaluator: Arc<dyn Evaluate>,
    queues: Queues,
    config: AgentConfig,
    active: AtomicUsize,
}

impl Agent {
    pub fn new(
        bus: Arc<dyn Bus>,
        cache: Arc<dyn ByteCache>,
        evaluator: Arc<dyn Evaluate>,
        queues: Queues,
        config: AgentConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            bus,
            cache,
            evaluator,
            queues,
            config,
            active: AtomicUsize::new(0),
        })
    }

    /// Announces the node, then pulls and executes tasks until aborted.
    pub async fn run(self: Arc<Self>) {
        self.announce().await;
        let beats = self.clone();
        tokio::spawn(async move { beats.heartbeats().await });
        let pool = Arc::new(Semaphore::new(self.config.node.max_concurrent.max(1)));
        loop {
            let permit = pool
                .clone()
                .acquire_owned()
                .await
                .expect("the pool semaphore is never closed");
            match self.pull().await {
                Some((queue, delivery)) => {
                    let agent = self.clone();
                    tokio::spawn(async move {
                        agent.execute(&queue, delivery).await;
                        drop(permit);
                    });
                }
                None => drop(permit),
            }
        }
    }

    /// Registration is a publish; re-registration is idempotent upstream.
    async fn announce(&self) {
        let envelope = Envelope::new(kind::REGISTER, &self.config.node);
        loop {
            match self.bus.publish(&self.queues.heartbeats, envelope.clone()).await {
                Ok(()) => {
                    log::info!("[agent {}] registered", self.config.node.node_id);
                    return;
                }
                Err(e) => {
                    log::warn!("[agent] registration deferred: {}", e);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }
    }

    async fn heartbeats(self: Arc<Self>) {
        let mut tick = tokio::time::interval(self.config.heartbeat_every);
        loop {
            tick.tick().await;
            let telemetry = Telemetry {
                node_id: self.config.node.node_id,
                current_tasks: self.active.load(Ordering::Relaxed),
                cpu_usage: 0.0,
                memory_usage: 0.0,
            };
            let envelope = Envelope::new(kind::HEARTBEAT, &telemetry);
            if let Err(e) = self.bus.publish(&self.queues.heartbeats, envelope).await {
                log::warn!("[agent] heartbeat dropped: {}", e);
            }
        }
    }

    /// Tries each subscribed work queue once, prefetch-limited by the pool.
    async fn pull(&self) -> Option<(String, Delivery)> {
        for kind in self.config.node.kinds.iter() {
            let queue = match kind {
                TaskKind::Preflop => self.queues.preflop.clone(),
                TaskKind::Postflop => self.queues.postflop.clone(),
            };
            match self.bus.consume(&queue, Duration::from_millis(200)).await {
                Ok(Some(delivery)) => return Some((queue, delivery)),
                Ok(None) => {}
                Err(e) => {
                    log::warn!("[agent] consume failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }
        None
    }

    /// Runs one task end to end. The task is acknowledged only after its
    /// result is durably on the results queue (or the task proved
    /// undecodable, or its simulation was cancelled).
    async fn execute(&self, queue: &str, delivery: Delivery) {
        self.active.fetch_add(1, Ordering::Relaxed);
        let trace = delivery.envelope.trace_id;
        let task: Task = match delivery.envelope.parse() {
            Ok(task) => task,
            Err(e) => {
                log::error!("[agent] discarding undecodable task: {}", e);
                self.ack(queue, &delivery.tag).await;
                self.active.fetch_sub(1, Ordering::Relaxed);
                return;
            }
        };
        log::debug!(
            "[agent {}] task {} it {} [{}]",
            self.config.node.node_id,
            task.task_id,
            task.iteration,
            trace
        );
        self.claim(&task).await;
        if self.is_cancelled(task.simulation_id).await {
            log::debug!("[agent] skipping task of cancelled simulation");
            self.ack(queue, &delivery.tag).await;
            self.active.fetch_sub(1, Ordering::Relaxed);
            return;
        }
        let result = self.solve(task).await;
        self.report(&result).await;
        self.ack(queue, &delivery.tag).await;
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Runs the engine on a blocking thread with a deadline and a
    /// cancellation watcher polling the cancel flag.
    async fn solve(&self, task: Task) -> TaskResult {
        let node_id = self.config.node.node_id;
        let view = match self.view_for(task.simulation_id).await {
            Ok(view) => view,
            Err(detail) => {
                return TaskResult::failed(&task, node_id, 0, detail);
            }
        };
        let flag = Arc::new(AtomicBool::new(false));
        let watcher = {
            let cache = self.cache.clone();
            let flag = flag.clone();
            let sim = task.simulation_id;
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(Duration::from_millis(500));
                loop {
                    tick.tick().await;
                    if matches!(cache.get(&cancel_key(sim)).await, Ok(Some(_))) {
                        flag.store(true, Ordering::Relaxed);
                        return;
                    }
                }
            })
        };
        let deadline = Instant::now() + self.config.task_deadline;
        let evaluator = self.evaluator.clone();
        let started = Instant::now();
        let solved = tokio::task::spawn_blocking(move || {
            let outcome = Engine::execute(
                &task,
                &view,
                evaluator.as_ref(),
                Some(deadline),
                Some(flag.as_ref()),
            );
            (task, outcome)
        })
        .await
        .expect("engine thread does not panic");
        watcher.abort();
        let (task, outcome) = solved;
        let elapsed = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(outcome) => TaskResult::completed(&task, node_id, elapsed, outcome),
            Err(e) => TaskResult::failed(&task, node_id, elapsed, e.to_string()),
        }
    }

    /// Hydrates the strategy snapshot the orchestrator last published.
    async fn view_for(&self, simulation: ID<Sim>) -> Result<TableView, String> {
        match self.cache.get(&strategy_key(simulation)).await {
            Ok(Some(bytes)) => Checkpoint::decode(&bytes)
                .map(|checkpoint| TableView(checkpoint.nodes))
                .map_err(|e| format!("strategy snapshot integrity: {}", e)),
            Ok(None) => Ok(TableView::default()),
            Err(e) => Err(format!("strategy snapshot unavailable: {}", e)),
        }
    }

    async fn is_cancelled(&self, simulation: ID<Sim>) -> bool {
        matches!(self.cache.get(&cancel_key(simulation)).await, Ok(Some(_)))
    }

    async fn claim(&self, task: &Task) {
        let claim = Claim {
            node_id: self.config.node.node_id,
            task_id: task.task_id.inner(),
            simulation_id: task.simulation_id.inner(),
        };
        if let Err(e) = self
            .bus
            .publish(&self.queues.control, Envelope::new(kind::CLAIM, &claim))
            .await
        {
            log::debug!("[agent] claim not published: {}", e);
        }
    }

    /// Publishes a result, retrying transient failures: the result must be
    /// durable before the task message can be acked.
    async fn report(&self, result: &TaskResult) {
        let envelope = Envelope::new(kind::RESULT, result);
        loop {
            match self.bus.publish(&self.queues.results, envelope.clone()).await {
                Ok(()) => return,
                Err(e) if e.is_transient() => {
                    log::warn!("[agent] result publish deferred: {}", e);
                    tokio::time::sleep(Duration::from_millis(250)).await;
                }
                Err(e) => {
                    log::error!("[agent] result publish failed: {}", e);
                    return;
                }
            }
        }
    }

    async fn ack(&self, queue: &str, tag: &str) {
        if let Err(e) = self.bus.ack(queue, tag).await {
            log::debug!("[agent] ack failed: {}", e);
        }
    }
}
