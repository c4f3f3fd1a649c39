use std::collections::HashMap;
use std::collections::VecDeque;
use std::time::Duration;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::Bus;
use crate::BusError;
use crate::Delivery;
use crate::Envelope;

/// In-process bus with the same at-least-once contract as the broker
/// adapter. Backs the test suites and single-process deployments.
pub struct MemoryBus {
    queues: Mutex<HashMap<String, VecDeque<Envelope>>>,
    inflight: Mutex<HashMap<String, Vec<(String, Envelope, Instant)>>>,
    redelivery: Duration,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new(Duration::from_secs(gto_core::UNACKED_AFTER_SECS))
    }
}

impl MemoryBus {
    pub fn new(redelivery: Duration) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            redelivery,
        }
    }
}

#[async_trait::async_trait]
impl Bus for MemoryBus {
    async fn publish(&self, queue: &str, envelope: Envelope) -> Result<(), BusError> {
        self.queues
            .lock()
            .await
            .entry(queue.to_string())
            .or_default()
            .push_back(envelope);
        Ok(())
    }

    async fn consume(&self, queue: &str, wait: Duration) -> Result<Option<Delivery>, BusError> {
        let deadline = Instant::now() + wait;
        loop {
            let popped = self
                .queues
                .lock()
                .await
                .get_mut(queue)
                .and_then(VecDeque::pop_front);
            if let Some(envelope) = popped {
                let tag = uuid::Uuid::now_v7().to_string();
                self.inflight
                    .lock()
                    .await
                    .entry(queue.to_string())
                    .or_default()
                    .push((tag.clone(), envelope.clone(), Instant::now()));
                return Ok(Some(Delivery { envelope, tag }));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn ack(&self, queue: &str, tag: &str) -> Result<(), BusError> {
        let mut inflight = self.inflight.lock().await;
        let held = inflight.entry(queue.to_string()).or_default();
        let before = held.len();
        held.retain(|(t, _, _)| t != tag);
        if held.len() == before {
            return Err(BusError::UnknownDelivery {
                queue: queue.to_string(),
            });
        }
        Ok(())
    }

    async fn recover(&self, queue: &str) -> Result<usize, BusError> {
        let mut inflight = self.inflight.lock().await;
        let held = inflight.entry(queue.to_string()).or_default();
        let now = Instant::now();
        let (stale, fresh): (Vec<_>, Vec<_>) = held
            .drain(..)
            .partition(|(_, _, since)| now.duration_since(*since) >= self.redelivery);
        *held = fresh;
        drop(inflight);
        let count = stale.len();
        let mut queues = self.queues.lock().await;
        let q = queues.entry(queue.to_string()).or_default();
        for (_, envelope, _) in stale {
            q.push_back(envelope);
        }
        Ok(count)
    }

    async fn depth(&self, queue: &str) -> Result<u64, BusError> {
        Ok(self
            .queues
            .lock()
            .await
            .get(queue)
            .map(|q| q.len() as u64)
            .unwrap_or(0))
    }

    fn connected(&self) -> bool {
        true
    }
}
