use std::time::Duration;

use crate::BusError;
use crate::Envelope;

/// One consumed message awaiting acknowledgement.
///
/// Dropping a delivery without acking it is safe: the message returns to the
/// queue on the next [`Bus::recover`] sweep and is delivered again.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub envelope: Envelope,
    pub tag: String,
}

/// Typed publish/consume over named queues with manual acknowledgement.
///
/// Delivery is at-least-once: consumers ack only after their side effects
/// are durable, and anything downstream must tolerate duplicates. Per-queue
/// FIFO is not promised.
#[async_trait::async_trait]
pub trait Bus: Send + Sync {
    /// Enqueues a message. During a broker outage publishes land in a
    /// bounded in-memory outbox and are flushed on reconnect; once the
    /// outbox is full this fails synchronously.
    async fn publish(&self, queue: &str, envelope: Envelope) -> Result<(), BusError>;
    /// Pulls one message, waiting up to `wait`. The message is held
    /// in-flight until acked or recovered.
    async fn consume(&self, queue: &str, wait: Duration) -> Result<Option<Delivery>, BusError>;
    /// Acknowledges a delivery, removing it from in-flight state.
    async fn ack(&self, queue: &str, tag: &str) -> Result<(), BusError>;
    /// Requeues in-flight messages past the redelivery window. Returns how
    /// many went back.
    async fn recover(&self, queue: &str) -> Result<usize, BusError>;
    /// Ready-message count for a queue.
    async fn depth(&self, queue: &str) -> Result<u64, BusError>;
    /// Current broker connectivity, for status surfaces.
    fn connected(&self) -> bool;
}

/// The five named queues the grid runs on.
#[derive(Debug, Clone)]
pub struct Queues {
    pub preflop: String,
    pub postflop: String,
    pub results: String,
    pub heartbeats: String,
    pub control: String,
}

impl From<&gto_core::Settings> for Queues {
    fn from(settings: &gto_core::Settings) -> Self {
        Self {
            preflop: settings.queue_preflop.clone(),
            postflop: settings.queue_postflop.clone(),
            results: settings.queue_results.clone(),
            heartbeats: settings.queue_heartbeats.clone(),
            control: settings.queue_control.clone(),
        }
    }
}

impl Default for Queues {
    fn default() -> Self {
        Self::from(&gto_core::Settings::default())
    }
}

/// The queue-status read model served to operators.
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct QueueStatus {
    pub preflop_tasks: u64,
    pub postflop_tasks: u64,
    pub pending_results: u64,
    pub connected: bool,
}

/// Snapshots queue depths; depth errors read as zero rather than failing
/// the whole status call.
pub async fn queue_status(bus: &dyn Bus, queues: &Queues) -> QueueStatus {
    QueueStatus {
        preflop_tasks: bus.depth(&queues.preflop).await.unwrap_or(0),
        postflop_tasks: bus.depth(&queues.postflop).await.unwrap_or(0),
        pending_results: bus.depth(&queues.results).await.unwrap_or(0),
        connected: bus.connected(),
    }
}
