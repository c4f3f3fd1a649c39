use gto_bus::*;
use gto_cards::Evaluate;
use gto_cfr::*;
use gto_core::*;
use gto_registry::Claim;
use gto_registry::Registry;
use gto_registry::RegistryError;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::sync::RwLock;
use tokio::sync::broadcast;
use tokio::sync::mpsc;

use crate::*;

/// A task result routed to its simulation loop, acked only after folding.
struct Routed {
    result: TaskResult,
    tag: Option<String>,
}

/// Per-simulation live state: the record, the sharded table, the cancel
/// flag, and the channels its run loop drains.
pub struct SimHandle {
    pub record: RwLock<Simulation>,
    pub table: NodeTable,
    pub cancelled: AtomicBool,
    results_tx: mpsc::UnboundedSender<Routed>,
    results_rx: Mutex<Option<mpsc::UnboundedReceiver<Routed>>>,
    claims_tx: mpsc::UnboundedSender<(ID<Task>, ID<Node>)>,
    claims_rx: Mutex<Option<mpsc::UnboundedReceiver<(ID<Task>, ID<Node>)>>>,
    orphans_tx: mpsc::UnboundedSender<ID<Node>>,
    orphans_rx: Mutex<Option<mpsc::UnboundedReceiver<ID<Node>>>>,
}

impl SimHandle {
    fn new(record: Simulation) -> Arc<Self> {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let (claims_tx, claims_rx) = mpsc::unbounded_channel();
        let (orphans_tx, orphans_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            record: RwLock::new(record),
            table: NodeTable::default(),
            cancelled: AtomicBool::new(false),
            results_tx,
            results_rx: Mutex::new(Some(results_rx)),
            claims_tx,
            claims_rx: Mutex::new(Some(claims_rx)),
            orphans_tx,
            orphans_rx: Mutex::new(Some(orphans_rx)),
        })
    }
}

/// How one wave ended.
enum WaveEnd {
    Closed,
    Cancelled,
    Failed(String),
}

/// The simulation orchestrator.
///
/// Owns every [`Simulation`] record and its node table. The bus, cache,
/// artifact store, registry, and evaluator all arrive as explicit handles
/// at construction. No process-wide state.
pub struct Orchestrator {
    settings: Settings,
    queues: Queues,
    bus: Arc<dyn Bus>,
    cache: Arc<dyn ByteCache>,
    artifacts: Arc<dyn Artifacts>,
    registry: Arc<Registry>,
    evaluator: Arc<dyn Evaluate>,
    sims: RwLock<HashMap<ID<Sim>, Arc<SimHandle>>>,
    progress: broadcast::Sender<ProgressEvent>,
    system: broadcast::Sender<gto_dto::RealtimeFrame>,
}

impl Orchestrator {
    pub fn new(
        settings: Settings,
        bus: Arc<dyn Bus>,
        cache: Arc<dyn ByteCache>,
        artifacts: Arc<dyn Artifacts>,
        registry: Arc<Registry>,
        evaluator: Arc<dyn Evaluate>,
    ) -> Arc<Self> {
        let queues = Queues::from(&settings);
        let (progress, _) = broadcast::channel(256);
        let (system, _) = broadcast::channel(64);
        Arc::new(Self {
            settings,
            queues,
            bus,
            cache,
            artifacts,
            registry,
            evaluator,
            sims: RwLock::new(HashMap::new()),
            progress,
            system,
        })
    }

    /// Subscribes to per-simulation progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress.subscribe()
    }
    /// Subscribes to system-wide snapshot frames.
    pub fn subscribe_system(&self) -> broadcast::Receiver<gto_dto::RealtimeFrame> {
        self.system.subscribe()
    }

    // ------------------------------------------------------------------
    // public lifecycle operations
    // ------------------------------------------------------------------

    /// Validates and records a simulation. Nothing is dispatched yet.
    pub async fn create(&self, spec: SimulationSpec) -> Result<ID<Sim>, OrchestratorError> {
        spec.validate()?;
        let id = ID::default();
        let handle = SimHandle::new(Simulation::new(id, spec));
        self.sims.write().await.insert(id, handle);
        log::info!("[orchestrator] simulation {} created", id);
        Ok(id)
    }

    /// Rebuilds a simulation from a checkpoint blob: the node table and
    /// iteration counter are restored atomically before anything runs, and
    /// results from pre-checkpoint tasks are discarded by task-id
    /// idempotency.
    pub async fn restore(
        &self,
        mut spec: SimulationSpec,
        checkpoint: &[u8],
    ) -> Result<ID<Sim>, OrchestratorError> {
        let checkpoint = Checkpoint::decode(checkpoint)?;
        if checkpoint.variant != spec.solver.variant {
            return Err(OrchestratorError::SpecInvalid(format!(
                "checkpoint variant {:?} does not match spec variant {:?}",
                checkpoint.variant, spec.solver.variant
            )));
        }
        if let Some(seed) = checkpoint.rng_seed {
            spec.solver.seed = seed;
        }
        spec.validate()?;
        let id = ID::default();
        let handle = SimHandle::new(Simulation::new(id, spec));
        handle.record.write().await.iterations_completed = checkpoint.iteration;
        handle.table.replace(checkpoint.nodes);
        self.sims.write().await.insert(id, handle);
        log::info!(
            "[orchestrator] simulation {} restored at iteration {}",
            id,
            checkpoint.iteration
        );
        Ok(id)
    }

    /// Begins the iteration loop: `Pending → Running`.
    pub async fn start(self: &Arc<Self>, id: ID<Sim>) -> Result<(), OrchestratorError> {
        let handle = self.handle(id).await?;
        {
            let mut record = handle.record.write().await;
            if !record.transition(SimulationStatus::Running) {
                return Err(OrchestratorError::AlreadyStarted(id));
            }
        }
        let orchestrator = self.clone();
        tokio::spawn(orchestrator.run(handle));
        log::info!("[orchestrator] simulation {} started", id);
        Ok(())
    }

    /// Flags the simulation cancelled. In-flight tasks may still complete;
    /// their results are dropped and acknowledged.
    pub async fn cancel(&self, id: ID<Sim>) -> Result<(), OrchestratorError> {
        let handle = self.handle(id).await?;
        let transitioned = handle
            .record
            .write()
            .await
            .transition(SimulationStatus::Cancelled);
        if transitioned {
            handle.cancelled.store(true, Ordering::Relaxed);
            let _ = self.cache.put(&cancel_key(id), vec![1]).await;
            log::info!("[orchestrator] simulation {} cancelled", id);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // read models
    // ------------------------------------------------------------------

    pub async fn status(&self, id: ID<Sim>) -> Result<gto_dto::SimulationStatus, OrchestratorError> {
        let handle = self.handle(id).await?;
        let record = handle.record.read().await;
        Ok(gto_dto::SimulationStatus {
            simulation_id: id.inner(),
            status: record.status.label().to_string(),
            progress_percentage: record.progress_percentage(),
            iterations_completed: record.iterations_completed,
            total_iterations: record.spec.solver.max_iterations,
            current_exploitability: record.current_exploitability,
            estimated_time_remaining: record.estimated_time_remaining(),
            stalled: record.stalled,
        })
    }

    /// Final read model; only meaningful once the run completed.
    pub async fn results(
        &self,
        id: ID<Sim>,
    ) -> Result<gto_dto::SimulationResults, OrchestratorError> {
        let handle = self.handle(id).await?;
        let record = handle.record.read().await;
        if record.status != SimulationStatus::Completed {
            return Err(OrchestratorError::NotCompleted(id));
        }
        let view = handle.table.snapshot();
        let final_strategy = view
            .0
            .iter()
            .map(|(key, node)| {
                let average = node
                    .average()
                    .into_iter()
                    .enumerate()
                    .map(|(i, p)| (i.to_string(), p))
                    .collect::<BTreeMap<_, _>>();
                (key.to_string(), average)
            })
            .collect();
        Ok(gto_dto::SimulationResults {
            simulation_id: id.inner(),
            final_exploitability: record.current_exploitability.unwrap_or(f64::NAN),
            iterations_completed: record.iterations_completed,
            convergence_time_seconds: record.convergence_time_seconds(),
            final_strategy,
        })
    }

    pub async fn list(&self, filter: &gto_dto::ListFilter) -> gto_dto::SimulationList {
        let mut summaries = Vec::new();
        for handle in self.sims.read().await.values() {
            let record = handle.record.read().await;
            if let Some(status) = filter.status.as_deref() {
                if record.status.label() != status {
                    continue;
                }
            }
            summaries.push(gto_dto::SimulationSummary {
                simulation_id: record.id.inner(),
                simulation_type: record.spec.kind.to_string(),
                name: record.spec.name.clone(),
                status: record.status.label().to_string(),
                created_at: record.created_at,
                updated_at: record.updated_at,
                iterations_completed: record.iterations_completed,
            });
        }
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = summaries.len();
        let offset = filter.offset.unwrap_or(0).min(total);
        let limit = filter.limit.unwrap_or(50);
        let simulations = summaries.into_iter().skip(offset).take(limit).collect();
        gto_dto::SimulationList { simulations, total }
    }

    pub async fn queue_status(&self) -> QueueStatus {
        queue_status(self.bus.as_ref(), &self.queues).await
    }

    pub async fn nodes(&self) -> Vec<gto_dto::NodeView> {
        self.registry
            .list_all()
            .await
            .into_iter()
            .map(|n| gto_dto::NodeView {
                node_id: n.node_id.inner(),
                platform: n.platform,
                cpu_count: n.cpu_count,
                memory_total: n.memory_total,
                max_concurrent_tasks: n.max_concurrent,
                current_tasks: n.current_tasks,
                status: match n.status {
                    gto_registry::NodeStatus::Available => "available",
                    gto_registry::NodeStatus::Busy => "busy",
                    gto_registry::NodeStatus::Offline => "offline",
                }
                .to_string(),
                last_heartbeat: n.last_heartbeat,
                total_tasks_completed: n.total_completed,
                total_tasks_failed: n.total_failed,
                cpu_usage: n.cpu_usage,
                memory_usage: n.memory_usage,
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // pull-dispatch surface (`GET /tasks/next`, `POST /tasks/results`)
    // ------------------------------------------------------------------

    /// Hands the next queued task to a specific node, attributing it on the
    /// way out.
    pub async fn next_task(&self, node: ID<Node>) -> Result<Option<Task>, OrchestratorError> {
        if self.registry.get(node).await?.headroom() == 0 {
            return Ok(None);
        }
        for queue in [&self.queues.preflop, &self.queues.postflop] {
            if let Some(delivery) = self.bus.consume(queue, Duration::ZERO).await? {
                let task: Task = delivery.envelope.parse()?;
                self.registry.attribute(node, task.task_id.inner()).await?;
                if let Some(handle) = self.sims.read().await.get(&task.simulation_id) {
                    let _ = handle.claims_tx.send((task.task_id, node));
                }
                self.bus.ack(queue, &delivery.tag).await?;
                return Ok(Some(task));
            }
        }
        Ok(None)
    }

    /// Accepts a directly-submitted result and feeds it through the same
    /// aggregation path as bus results.
    pub async fn submit_result(&self, result: TaskResult) -> Result<(), OrchestratorError> {
        self.bus
            .publish(&self.queues.results, Envelope::new(kind::RESULT, &result))
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // background pumps
    // ------------------------------------------------------------------

    /// Spawns the results pump, the signal pump, and the liveness sweep.
    pub fn spawn_pumps(self: &Arc<Self>, evict_every: Duration) {
        let results = self.clone();
        tokio::spawn(async move { results.pump_results().await });
        let signals = self.clone();
        tokio::spawn(async move { signals.pump_signals().await });
        let sweeper = self.clone();
        tokio::spawn(async move { sweeper.sweep_liveness(evict_every).await });
    }

    /// Consumes `task_results`, releases registry attribution, and routes
    /// each result to its simulation loop. Results for unknown or terminal
    /// simulations are dropped and acknowledged here.
    async fn pump_results(self: Arc<Self>) {
        loop {
            match self
                .bus
                .consume(&self.queues.results, Duration::from_millis(500))
                .await
            {
                Ok(Some(delivery)) => {
                    let result: TaskResult = match delivery.envelope.parse() {
                        Ok(result) => result,
                        Err(e) => {
                            log::error!("[orchestrator] dropping malformed result: {}", e);
                            let _ = self.bus.ack(&self.queues.results, &delivery.tag).await;
                            continue;
                        }
                    };
                    match self
                        .registry
                        .release(result.node_id, result.task_id.inner(), result.is_completed())
                        .await
                    {
                        Ok(()) | Err(RegistryError::NotAttributed { .. }) => {}
                        Err(e) => log::debug!("[orchestrator] release skipped: {}", e),
                    }
                    let routed = {
                        let sims = self.sims.read().await;
                        match sims.get(&result.simulation_id) {
                            Some(handle) => {
                                let terminal = handle.record.read().await.status.is_terminal();
                                !terminal
                                    && handle
                                        .results_tx
                                        .send(Routed {
                                            result,
                                            tag: Some(delivery.tag.clone()),
                                        })
                                        .is_ok()
                            }
                            None => false,
                        }
                    };
                    if !routed {
                        let _ = self.bus.ack(&self.queues.results, &delivery.tag).await;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!("[orchestrator] results pump: {}", e);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }
    }

    /// Consumes `heartbeats` and `control`: registrations, liveness
    /// beacons, and task claims.
    async fn pump_signals(self: Arc<Self>) {
        loop {
            let mut idle = true;
            for queue in [&self.queues.heartbeats, &self.queues.control] {
                match self.bus.consume(queue, Duration::from_millis(100)).await {
                    Ok(Some(delivery)) => {
                        idle = false;
                        self.handle_signal(&delivery.envelope).await;
                        let _ = self.bus.ack(queue, &delivery.tag).await;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        log::warn!("[orchestrator] signal pump: {}", e);
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                }
            }
            if idle {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }

    async fn handle_signal(&self, envelope: &Envelope) {
        match envelope.kind.as_str() {
            kind::REGISTER => match envelope.parse::<gto_registry::NodeSpec>() {
                Ok(spec) => {
                    self.registry.register(spec).await;
                }
                Err(e) => log::error!("[orchestrator] bad registration: {}", e),
            },
            kind::HEARTBEAT => match envelope.parse::<gto_registry::Telemetry>() {
                Ok(telemetry) => {
                    if let Err(e) = self.registry.heartbeat(telemetry).await {
                        log::debug!("[orchestrator] heartbeat from unknown node: {}", e);
                    }
                }
                Err(e) => log::error!("[orchestrator] bad heartbeat: {}", e),
            },
            kind::CLAIM => match envelope.parse::<Claim>() {
                Ok(claim) => {
                    if let Err(e) = self.registry.attribute(claim.node_id, claim.task_id).await {
                        log::debug!("[orchestrator] claim not recorded: {}", e);
                    }
                    let sims = self.sims.read().await;
                    if let Some(handle) = sims.get(&ID::from(claim.simulation_id)) {
                        let _ = handle
                            .claims_tx
                            .send((ID::from(claim.task_id), claim.node_id));
                    }
                }
                Err(e) => log::error!("[orchestrator] bad claim: {}", e),
            },
            other => log::debug!("[orchestrator] ignoring signal kind {:?}", other),
        }
    }

    /// Periodic liveness sweep: offline nodes surrender their tasks, which
    /// are reissued by the owning simulation loops. Also emits the
    /// system-wide snapshot frame.
    async fn sweep_liveness(self: Arc<Self>, every: Duration) {
        let mut tick = tokio::time::interval(every);
        loop {
            tick.tick().await;
            for queue in [
                &self.queues.preflop,
                &self.queues.postflop,
                &self.queues.results,
            ] {
                if let Err(e) = self.bus.recover(queue).await {
                    log::debug!("[orchestrator] recovery sweep: {}", e);
                }
            }
            let evicted = self.registry.evict_offline().await;
            if !evicted.is_empty() {
                let sims = self.sims.read().await;
                for (node, _) in evicted.iter() {
                    for handle in sims.values() {
                        let _ = handle.orphans_tx.send(*node);
                    }
                }
            }
            let frame = gto_dto::RealtimeFrame::system(serde_json::json!({
                "queues": self.queue_status().await,
                "cluster": self.registry.stats().await,
            }));
            let _ = self.system.send(frame);
        }
    }

    // ------------------------------------------------------------------
    // the iteration loop
    // ------------------------------------------------------------------

    async fn run(self: Arc<Self>, handle: Arc<SimHandle>) {
        let id = handle.record.read().await.id;
        let mut results_rx = handle
            .results_rx
            .lock()
            .await
            .take()
            .expect("a simulation runs once");
        let mut claims_rx = handle
            .claims_rx
            .lock()
            .await
            .take()
            .expect("a simulation runs once");
        let mut orphans_rx = handle
            .orphans_rx
            .lock()
            .await
            .take()
            .expect("a simulation runs once");

        loop {
            let (spec, iterations) = {
                let record = handle.record.read().await;
                (record.spec.clone(), record.iterations_completed)
            };
            if handle.cancelled.load(Ordering::Relaxed) {
                // the loop is the only event emitter, so this terminal
                // event is guaranteed to be the last one
                self.emit(id, iterations, None, Phase::Cancelled);
                return;
            }

            // convergence check before the next wave
            let exploitability = handle.record.read().await.current_exploitability;
            let target_hit =
                exploitability.is_some_and(|e| e <= spec.solver.target_exploitability);
            if iterations >= spec.solver.max_iterations || target_hit {
                self.finish(&handle, id, &spec, iterations).await;
                return;
            }

            // make the latest cumulative strategy visible to workers
            self.publish_snapshot(&handle, id, &spec, iterations).await;

            let end = self
                .run_wave(
                    &handle,
                    id,
                    &spec,
                    iterations,
                    &mut results_rx,
                    &mut claims_rx,
                    &mut orphans_rx,
                )
                .await;
            match end {
                WaveEnd::Cancelled => {
                    self.emit(id, iterations, None, Phase::Cancelled);
                    return;
                }
                WaveEnd::Failed(reason) => {
                    self.fail(&handle, id, reason).await;
                    return;
                }
                WaveEnd::Closed => {}
            }

            // the wave is closed: the counter may advance
            let iterations = {
                let mut record = handle.record.write().await;
                record.iterations_completed += 1;
                record.updated_at = now();
                record.iterations_completed
            };

            if spec.solver.exploit_cadence > 0 && iterations % spec.solver.exploit_cadence == 0 {
                match self.estimate_exploitability(&handle, &spec, iterations).await {
                    Ok(estimate) => {
                        handle.record.write().await.current_exploitability = Some(estimate);
                    }
                    Err(e) => log::warn!("[orchestrator] {} exploitability: {}", id, e),
                }
            }
            if spec.solver.checkpoint_cadence > 0
                && iterations % spec.solver.checkpoint_cadence == 0
            {
                if let Err(e) = self.checkpoint(&handle, id, &spec, iterations).await {
                    log::warn!("[orchestrator] {} checkpoint: {}", id, e);
                }
            }
            let exploitability = handle.record.read().await.current_exploitability;
            self.emit(id, iterations, exploitability, Phase::Running);
        }
    }

    /// Dispatches one wave and drains it to closure.
    #[allow(clippy::too_many_arguments)]
    async fn run_wave(
        &self,
        handle: &Arc<SimHandle>,
        id: ID<Sim>,
        spec: &SimulationSpec,
        iterations: Epoch,
        results_rx: &mut mpsc::UnboundedReceiver<Routed>,
        claims_rx: &mut mpsc::UnboundedReceiver<(ID<Task>, ID<Node>)>,
        orphans_rx: &mut mpsc::UnboundedReceiver<ID<Node>>,
    ) -> WaveEnd {
        let discipline = Discipline::new(spec.solver.variant, spec.solver.discount);
        let discardable = spec.solver.variant.sampled();
        let window = self.settings.task_deadline + Duration::from_secs(TASK_GRACE_SECS);
        let tasks = match decompose(id, spec, iterations) {
            Ok(tasks) => tasks,
            Err(e) => return WaveEnd::Failed(e.to_string()),
        };
        let queue = self.queue_for(spec.kind).to_string();
        let mut wave = Wave::new(tasks, window);
        for task in wave.unpublished() {
            match self.publish_task(handle, &queue, &task).await {
                Ok(()) => wave.mark_dispatched(task.task_id),
                Err(end) => return end,
            }
        }

        let mut tick = tokio::time::interval(Duration::from_millis(100));
        while !wave.is_closed() {
            if handle.cancelled.load(Ordering::Relaxed) {
                return WaveEnd::Cancelled;
            }
            tokio::select! {
                routed = results_rx.recv() => {
                    let Some(routed) = routed else { return WaveEnd::Cancelled };
                    if handle.cancelled.load(Ordering::Relaxed) {
                        self.ack_result(routed.tag).await;
                        return WaveEnd::Cancelled;
                    }
                    if let Some(end) = self
                        .absorb(handle, &queue, &mut wave, &discipline, discardable, routed)
                        .await
                    {
                        return end;
                    }
                }
                claim = claims_rx.recv() => {
                    if let Some((task_id, node)) = claim {
                        wave.attribute(task_id, node);
                    }
                }
                orphan = orphans_rx.recv() => {
                    if let Some(node) = orphan {
                        for disposition in wave.orphaned(node) {
                            if let Some(end) = self
                                .redispatch(handle, &queue, disposition, discardable)
                                .await
                            {
                                return end;
                            }
                        }
                    }
                }
                _ = tick.tick() => {
                    for disposition in wave.timeouts() {
                        if let Some(end) = self
                            .redispatch(handle, &queue, disposition, discardable)
                            .await
                        {
                            return end;
                        }
                    }
                }
            }
        }

        if discardable && wave.lost_fraction() > spec.solver.loss_fraction {
            return WaveEnd::Failed(format!(
                "wave {} lost {:.0}% of its tasks",
                wave.iteration(),
                wave.lost_fraction() * 100.0
            ));
        }
        WaveEnd::Closed
    }

    /// Applies one routed result to the wave and table, acking afterwards.
    async fn absorb(
        &self,
        handle: &Arc<SimHandle>,
        queue: &str,
        wave: &mut Wave,
        discipline: &Discipline,
        discardable: bool,
        routed: Routed,
    ) -> Option<WaveEnd> {
        let result = routed.result;
        let end = match (result.status, result.results) {
            (ResultStatus::Completed, Some(outcome)) => {
                if wave.complete(result.task_id) {
                    match handle.table.fold(&outcome, discipline) {
                        Ok(()) => None,
                        Err(e) => Some(WaveEnd::Failed(e.to_string())),
                    }
                } else {
                    // duplicate or stale delivery: idempotent drop
                    None
                }
            }
            _ => {
                if let Some(error) = result.error.as_deref() {
                    log::warn!(
                        "[orchestrator] task {} failed on {}: {}",
                        result.task_id,
                        result.node_id,
                        error
                    );
                }
                let disposition = wave.fail(result.task_id);
                self.redispatch(handle, queue, disposition, discardable).await
            }
        };
        self.ack_result(routed.tag).await;
        end
    }

    /// Acts on a retry/exhaustion decision from the wave.
    async fn redispatch(
        &self,
        handle: &Arc<SimHandle>,
        queue: &str,
        disposition: Disposition,
        discardable: bool,
    ) -> Option<WaveEnd> {
        match disposition {
            Disposition::Ignore => None,
            Disposition::Retry(task) => match self.publish_task(handle, queue, &task).await {
                Ok(()) => None,
                Err(end) => Some(end),
            },
            Disposition::Exhausted if discardable => None,
            Disposition::Exhausted => Some(WaveEnd::Failed(String::from(
                "essential task exhausted its retries",
            ))),
        }
    }

    async fn ack_result(&self, tag: Option<String>) {
        if let Some(tag) = tag {
            if let Err(e) = self.bus.ack(&self.queues.results, &tag).await {
                log::debug!("[orchestrator] result ack: {}", e);
            }
        }
    }

    /// Publishes a task, stalling (visibly) through broker outages rather
    /// than failing the simulation.
    async fn publish_task(
        &self,
        handle: &Arc<SimHandle>,
        queue: &str,
        task: &Task,
    ) -> Result<(), WaveEnd> {
        let envelope = Envelope::new(kind::TASK, task);
        loop {
            if handle.cancelled.load(Ordering::Relaxed) {
                return Err(WaveEnd::Cancelled);
            }
            match self.bus.publish(queue, envelope.clone()).await {
                Ok(()) => {
                    let mut record = handle.record.write().await;
                    if record.stalled {
                        record.stalled = false;
                        log::info!("[orchestrator] {} dispatch resumed", record.id);
                    }
                    return Ok(());
                }
                Err(e) if e.is_transient() => {
                    let mut record = handle.record.write().await;
                    if !record.stalled {
                        record.stalled = true;
                        log::warn!("[orchestrator] {} dispatch stalled: {}", record.id, e);
                        let id = record.id;
                        let iterations = record.iterations_completed;
                        drop(record);
                        self.emit(id, iterations, None, Phase::Stalled);
                    }
                    tokio::time::sleep(Duration::from_millis(250)).await;
                }
                Err(e) => return Err(WaveEnd::Failed(e.to_string())),
            }
        }
    }

    async fn publish_snapshot(
        &self,
        handle: &Arc<SimHandle>,
        id: ID<Sim>,
        spec: &SimulationSpec,
        iterations: Epoch,
    ) {
        let checkpoint = Checkpoint {
            iteration: iterations,
            variant: spec.solver.variant,
            nodes: handle.table.snapshot().0,
            rng_seed: spec.solver.variant.sampled().then_some(spec.solver.seed),
        };
        if let Err(e) = self
            .cache
            .put(&strategy_key(id), checkpoint.encode())
            .await
        {
            log::warn!("[orchestrator] {} snapshot publish: {}", id, e);
        }
    }

    async fn estimate_exploitability(
        &self,
        handle: &Arc<SimHandle>,
        spec: &SimulationSpec,
        iterations: Epoch,
    ) -> Result<f64, OrchestratorError> {
        let root = spec.root_state()?;
        let view = handle.table.snapshot();
        let evaluator = self.evaluator.clone();
        let params = spec.solver.abstraction;
        let samples = spec.solver.exploit_samples;
        let seed = task_seed(spec.solver.seed, iterations, u32::MAX - 1);
        let estimate = tokio::task::spawn_blocking(move || {
            exploitability(&root, &view, evaluator.as_ref(), &params, samples, seed)
        })
        .await
        .expect("estimation task is not cancelled")?;
        Ok(estimate)
    }

    async fn checkpoint(
        &self,
        handle: &Arc<SimHandle>,
        id: ID<Sim>,
        spec: &SimulationSpec,
        iterations: Epoch,
    ) -> Result<(), OrchestratorError> {
        let checkpoint = Checkpoint {
            iteration: iterations,
            variant: spec.solver.variant,
            nodes: handle.table.snapshot().0,
            rng_seed: spec.solver.variant.sampled().then_some(spec.solver.seed),
        };
        let name = format!("{}/checkpoint_{:08}.bin", id, iterations);
        let reference = self.artifacts.put(&name, checkpoint.encode()).await?;
        handle.record.write().await.checkpoint = Some(reference);
        log::debug!("[orchestrator] {} checkpointed at {}", id, iterations);
        Ok(())
    }

    /// Terminal success: compute the final exploitability, freeze the
    /// table, archive the final checkpoint, and announce completion.
    async fn finish(
        &self,
        handle: &Arc<SimHandle>,
        id: ID<Sim>,
        spec: &SimulationSpec,
        iterations: Epoch,
    ) {
        match self.estimate_exploitability(handle, spec, iterations).await {
            Ok(estimate) => {
                handle.record.write().await.current_exploitability = Some(estimate);
            }
            Err(e) => log::warn!("[orchestrator] {} final exploitability: {}", id, e),
        }
        if let Err(e) = self.checkpoint(handle, id, spec, iterations).await {
            log::warn!("[orchestrator] {} final checkpoint: {}", id, e);
        }
        let exploitability = {
            let mut record = handle.record.write().await;
            record.transition(SimulationStatus::Completed);
            record.current_exploitability
        };
        self.emit(id, iterations, exploitability, Phase::Completed);
        log::info!(
            "[orchestrator] simulation {} completed after {} iterations",
            id,
            iterations
        );
    }

    async fn fail(&self, handle: &Arc<SimHandle>, id: ID<Sim>, reason: String) {
        let iterations = {
            let mut record = handle.record.write().await;
            record.error = Some(reason.clone());
            record.transition(SimulationStatus::Failed);
            record.iterations_completed
        };
        self.emit(id, iterations, None, Phase::Failed);
        log::error!("[orchestrator] simulation {} failed: {}", id, reason);
    }

    fn emit(&self, id: ID<Sim>, iterations: Epoch, exploitability: Option<f64>, phase: Phase) {
        let _ = self.progress.send(ProgressEvent {
            simulation_id: id,
            iterations,
            exploitability,
            phase,
        });
    }

    fn queue_for(&self, kind: TaskKind) -> &str {
        match kind {
            TaskKind::Preflop => &self.queues.preflop,
            TaskKind::Postflop => &self.queues.postflop,
        }
    }

    async fn handle(&self, id: ID<Sim>) -> Result<Arc<SimHandle>, OrchestratorError> {
        self.sims
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(OrchestratorError::NotFound(id))
    }

    /// Point-in-time view of a simulation's table, for analysis surfaces.
    pub async fn strategy_view(&self, id: ID<Sim>) -> Result<TableView, OrchestratorError> {
        Ok(self.handle(id).await?.table.snapshot())
    }
}
