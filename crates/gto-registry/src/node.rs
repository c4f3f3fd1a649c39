use gto_cfr::TaskKind;
use gto_core::*;
use std::collections::HashSet;
use std::time::Instant;

/// Worker liveness state machine.
///
/// `Available` ↔ `Busy` via attribute/release; either drops to `Offline`
/// when heartbeats go stale; a fresh heartbeat brings `Offline` back to
/// `Available`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Available,
    Busy,
    Offline,
}

/// What a worker announces when it registers.
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct NodeSpec {
    pub node_id: ID<Node>,
    pub platform: String,
    pub cpu_count: u32,
    pub memory_total: u64,
    pub max_concurrent: usize,
    /// Task kinds this worker pulls.
    #[serde(default = "all_kinds")]
    pub kinds: Vec<TaskKind>,
}

fn all_kinds() -> Vec<TaskKind> {
    vec![TaskKind::Preflop, TaskKind::Postflop]
}

impl NodeSpec {
    /// Describes the current host.
    pub fn local(max_concurrent: usize) -> Self {
        Self {
            node_id: ID::default(),
            platform: std::env::consts::OS.to_string(),
            cpu_count: std::thread::available_parallelism()
                .map(|n| n.get() as u32)
                .unwrap_or(1),
            memory_total: 0,
            max_concurrent,
            kinds: all_kinds(),
        }
    }
}

/// What a worker reports on every heartbeat.
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Telemetry {
    pub node_id: ID<Node>,
    pub current_tasks: usize,
    #[serde(default)]
    pub cpu_usage: f64,
    #[serde(default)]
    pub memory_usage: f64,
}

/// A worker announcing it has started executing a task, so attribution is
/// recorded before any result exists.
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Claim {
    pub node_id: ID<Node>,
    pub task_id: uuid::Uuid,
    pub simulation_id: uuid::Uuid,
}

/// The registry's record of one worker.
#[derive(Debug, Clone)]
pub struct ComputeNode {
    pub node_id: ID<Node>,
    pub platform: String,
    pub cpu_count: u32,
    pub memory_total: u64,
    pub max_concurrent: usize,
    pub current_tasks: usize,
    pub status: NodeStatus,
    /// Unix seconds of the last heartbeat, for display surfaces.
    pub last_heartbeat: u64,
    /// Monotonic instant of the last heartbeat, for liveness decisions.
    pub seen_at: Instant,
    pub registered_at: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    /// Task kinds this node pulls.
    pub kinds: Vec<TaskKind>,
    /// Tasks currently attributed to this node.
    pub tasks: HashSet<uuid::Uuid>,
}

impl ComputeNode {
    pub fn new(spec: NodeSpec) -> Self {
        Self {
            node_id: spec.node_id,
            platform: spec.platform,
            cpu_count: spec.cpu_count,
            memory_total: spec.memory_total,
            max_concurrent: spec.max_concurrent,
            current_tasks: 0,
            status: NodeStatus::Available,
            last_heartbeat: now(),
            seen_at: Instant::now(),
            registered_at: now(),
            total_completed: 0,
            total_failed: 0,
            cpu_usage: 0.0,
            memory_usage: 0.0,
            kinds: spec.kinds,
            tasks: HashSet::new(),
        }
    }
    /// Re-derives Available/Busy from the task count. Offline is only
    /// entered through the liveness sweep and only left through a
    /// heartbeat.
    pub fn refresh(&mut self) {
        if self.status != NodeStatus::Offline {
            self.status = if self.current_tasks > 0 {
                NodeStatus::Busy
            } else {
                NodeStatus::Available
            };
        }
    }
    /// Free capacity right now.
    pub fn headroom(&self) -> usize {
        self.max_concurrent.saturating_sub(self.current_tasks)
    }
}
