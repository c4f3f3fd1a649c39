use gto_cfr::TaskKind;
use gto_core::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::sync::RwLock;

use crate::*;

/// Tracks worker identities, capacity, liveness, and task attribution.
///
/// The node map is guarded by a read-write lock; each record additionally
/// sits behind its own mutex so heartbeat and attribution traffic for
/// different nodes never contends.
pub struct Registry {
    nodes: RwLock<HashMap<ID<Node>, Arc<Mutex<ComputeNode>>>>,
    offline_after: Duration,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Duration::from_secs(OFFLINE_AFTER_SECS))
    }
}

impl Registry {
    pub fn new(offline_after: Duration) -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            offline_after,
        }
    }

    /// Upserts a node record. Idempotent: re-registration resets the record
    /// to Available with a fresh heartbeat, preserving lifetime counters.
    pub async fn register(&self, spec: NodeSpec) -> ID<Node> {
        let id = spec.node_id;
        let mut nodes = self.nodes.write().await;
        match nodes.get(&id) {
            Some(held) => {
                let mut node = held.lock().await;
                let (completed, failed) = (node.total_completed, node.total_failed);
                *node = ComputeNode::new(spec);
                node.total_completed = completed;
                node.total_failed = failed;
            }
            None => {
                nodes.insert(id, Arc::new(Mutex::new(ComputeNode::new(spec))));
                log::info!("[registry] node {} registered", id);
            }
        }
        id
    }

    /// Removes a node record entirely, returning its attributed tasks.
    pub async fn unregister(&self, id: ID<Node>) -> Result<Vec<uuid::Uuid>, RegistryError> {
        let held = self
            .nodes
            .write()
            .await
            .remove(&id)
            .ok_or(RegistryError::UnknownNode(id))?;
        let node = held.lock().await;
        log::info!("[registry] node {} unregistered", id);
        Ok(node.tasks.iter().copied().collect())
    }

    /// Updates liveness and telemetry. A heartbeat from an Offline node
    /// revives it.
    pub async fn heartbeat(&self, telemetry: Telemetry) -> Result<(), RegistryError> {
        let held = self.held(telemetry.node_id).await?;
        let mut node = held.lock().await;
        node.last_heartbeat = now();
        node.seen_at = Instant::now();
        node.current_tasks = telemetry.current_tasks.min(node.max_concurrent);
        node.cpu_usage = telemetry.cpu_usage;
        node.memory_usage = telemetry.memory_usage;
        if node.status == NodeStatus::Offline {
            log::info!("[registry] node {} back online", node.node_id);
            node.status = NodeStatus::Available;
        }
        node.refresh();
        Ok(())
    }

    /// Records that a task is running on a node.
    pub async fn attribute(&self, id: ID<Node>, task: uuid::Uuid) -> Result<(), RegistryError> {
        let held = self.held(id).await?;
        let mut node = held.lock().await;
        if node.tasks.contains(&task) {
            return Ok(());
        }
        if node.current_tasks >= node.max_concurrent {
            return Err(RegistryError::CapacityExceeded {
                node: id,
                max_concurrent: node.max_concurrent,
            });
        }
        node.tasks.insert(task);
        node.current_tasks += 1;
        node.refresh();
        Ok(())
    }

    /// Clears a task from a node, crediting the outcome.
    pub async fn release(
        &self,
        id: ID<Node>,
        task: uuid::Uuid,
        completed: bool,
    ) -> Result<(), RegistryError> {
        let held = self.held(id).await?;
        let mut node = held.lock().await;
        if !node.tasks.remove(&task) {
            return Err(RegistryError::NotAttributed { node: id, task });
        }
        node.current_tasks = node.current_tasks.saturating_sub(1);
        if completed {
            node.total_completed += 1;
        } else {
            node.total_failed += 1;
        }
        node.refresh();
        Ok(())
    }

    /// Candidate nodes for dispatching tasks of one kind: live nodes with
    /// headroom that pull that queue, best first.
    pub async fn list_available(&self, kind: TaskKind) -> Vec<ComputeNode> {
        let mut nodes = self.snapshot().await;
        nodes.retain(|n| {
            n.status != NodeStatus::Offline && n.headroom() > 0 && n.kinds.contains(&kind)
        });
        nodes.sort_by(|a, b| {
            let avail = |n: &ComputeNode| n.status == NodeStatus::Available;
            avail(b)
                .cmp(&avail(a))
                .then(a.current_tasks.cmp(&b.current_tasks))
                .then(b.last_heartbeat.cmp(&a.last_heartbeat))
        });
        nodes
    }

    /// Every record, unordered.
    pub async fn list_all(&self) -> Vec<ComputeNode> {
        self.snapshot().await
    }

    pub async fn get(&self, id: ID<Node>) -> Result<ComputeNode, RegistryError> {
        let held = self.held(id).await?;
        let node = held.lock().await;
        Ok(node.clone())
    }

    /// Sweeps stale records into Offline, returning each newly-offline
    /// node's attributed tasks so the orchestrator can reissue them.
    pub async fn evict_offline(&self) -> Vec<(ID<Node>, Vec<uuid::Uuid>)> {
        let nodes = self.snapshot_arcs().await;
        let mut evicted = Vec::new();
        let now = Instant::now();
        for held in nodes {
            let mut node = held.lock().await;
            let stale = now.duration_since(node.seen_at) > self.offline_after;
            if stale && node.status != NodeStatus::Offline {
                log::warn!(
                    "[registry] node {} offline ({} tasks orphaned)",
                    node.node_id,
                    node.tasks.len()
                );
                node.status = NodeStatus::Offline;
                let orphans = node.tasks.drain().collect::<Vec<_>>();
                node.current_tasks = 0;
                evicted.push((node.node_id, orphans));
            }
        }
        evicted
    }

    /// Aggregate cluster counters for status surfaces.
    pub async fn stats(&self) -> ClusterStats {
        let nodes = self.snapshot().await;
        let live = nodes
            .iter()
            .filter(|n| n.status != NodeStatus::Offline)
            .collect::<Vec<_>>();
        let capacity = live.iter().map(|n| n.max_concurrent as u64).sum::<u64>();
        let in_use = live.iter().map(|n| n.current_tasks as u64).sum::<u64>();
        let completed = nodes.iter().map(|n| n.total_completed).sum::<u64>();
        let failed = nodes.iter().map(|n| n.total_failed).sum::<u64>();
        ClusterStats {
            total_nodes: nodes.len(),
            active_nodes: live.len(),
            total_capacity: capacity,
            capacity_in_use: in_use,
            total_completed: completed,
            total_failed: failed,
            success_rate: match completed + failed {
                0 => 1.0,
                attempts => completed as f64 / attempts as f64,
            },
        }
    }

    async fn held(&self, id: ID<Node>) -> Result<Arc<Mutex<ComputeNode>>, RegistryError> {
        self.nodes
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RegistryError::UnknownNode(id))
    }
    async fn snapshot_arcs(&self) -> Vec<Arc<Mutex<ComputeNode>>> {
        self.nodes.read().await.values().cloned().collect()
    }
    async fn snapshot(&self) -> Vec<ComputeNode> {
        let mut out = Vec::new();
        for held in self.snapshot_arcs().await {
            out.push(held.lock().await.clone());
        }
        out
    }
}

/// Cluster-wide aggregates.
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct ClusterStats {
    pub total_nodes: usize,
    pub active_nodes: usize,
    pub total_capacity: u64,
    pub capacity_in_use: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    pub success_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(max_concurrent: usize) -> NodeSpec {
        NodeSpec {
            max_concurrent,
            ..NodeSpec::local(1)
        }
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let registry = Registry::default();
        let s = spec(2);
        let a = registry.register(s.clone()).await;
        let b = registry.register(s).await;
        assert_eq!(a, b);
        assert_eq!(registry.list_all().await.len(), 1);
    }

    #[tokio::test]
    async fn capacity_is_enforced() {
        let registry = Registry::default();
        let id = registry.register(spec(1)).await;
        registry.attribute(id, uuid::Uuid::now_v7()).await.unwrap();
        let err = registry.attribute(id, uuid::Uuid::now_v7()).await;
        assert!(matches!(err, Err(RegistryError::CapacityExceeded { .. })));
        let node = registry.get(id).await.unwrap();
        assert!(node.current_tasks <= node.max_concurrent);
    }

    #[tokio::test]
    async fn busy_tracks_task_count() {
        let registry = Registry::default();
        let id = registry.register(spec(2)).await;
        assert_eq!(registry.get(id).await.unwrap().status, NodeStatus::Available);
        let task = uuid::Uuid::now_v7();
        registry.attribute(id, task).await.unwrap();
        assert_eq!(registry.get(id).await.unwrap().status, NodeStatus::Busy);
        registry.release(id, task, true).await.unwrap();
        let node = registry.get(id).await.unwrap();
        assert_eq!(node.status, NodeStatus::Available);
        assert_eq!(node.total_completed, 1);
    }

    #[tokio::test]
    async fn release_requires_attribution() {
        let registry = Registry::default();
        let id = registry.register(spec(1)).await;
        let err = registry.release(id, uuid::Uuid::now_v7(), true).await;
        assert!(matches!(err, Err(RegistryError::NotAttributed { .. })));
    }

    #[tokio::test]
    async fn eviction_returns_orphaned_tasks_and_heartbeat_revives() {
        let registry = Registry::new(Duration::from_millis(20));
        let id = registry.register(spec(2)).await;
        let task = uuid::Uuid::now_v7();
        registry.attribute(id, task).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        let evicted = registry.evict_offline().await;
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].0, id);
        assert_eq!(evicted[0].1, vec![task]);
        assert_eq!(registry.get(id).await.unwrap().status, NodeStatus::Offline);
        assert!(registry.list_available(TaskKind::Preflop).await.is_empty());
        // a fresh heartbeat brings the node back
        registry
            .heartbeat(Telemetry {
                node_id: id,
                current_tasks: 0,
                cpu_usage: 0.0,
                memory_usage: 0.0,
            })
            .await
            .unwrap();
        assert_eq!(registry.get(id).await.unwrap().status, NodeStatus::Available);
    }

    #[tokio::test]
    async fn available_ordering_prefers_idle_nodes() {
        let registry = Registry::default();
        let busy = registry.register(spec(4)).await;
        let idle = registry.register(spec(4)).await;
        registry.attribute(busy, uuid::Uuid::now_v7()).await.unwrap();
        let order = registry.list_available(TaskKind::Preflop).await;
        assert_eq!(order[0].node_id, idle);
        assert_eq!(order[1].node_id, busy);
    }

    #[tokio::test]
    async fn stats_aggregate_the_cluster() {
        let registry = Registry::default();
        let a = registry.register(spec(2)).await;
        let _b = registry.register(spec(3)).await;
        let task = uuid::Uuid::now_v7();
        registry.attribute(a, task).await.unwrap();
        registry.release(a, task, true).await.unwrap();
        let stats = registry.stats().await;
        assert_eq!(stats.total_nodes, 2);
        assert_eq!(stats.active_nodes, 2);
        assert_eq!(stats.total_capacity, 5);
        assert_eq!(stats.total_completed, 1);
        assert_eq!(stats.success_rate, 1.0);
    }
}
