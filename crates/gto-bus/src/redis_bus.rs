use redis::AsyncCommands;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::Bus;
use crate::BusError;
use crate::Delivery;
use crate::Envelope;

/// Broker adapter over Redis lists.
///
/// Queues are plain lists; consuming moves a message into a per-consumer
/// unacked list (`LMOVE`), acking removes it (`LREM`), and a recovery sweep
/// walks unacked lists to requeue messages whose consumer died. Connection
/// loss flips the adapter into a reconnect cycle with capped exponential
/// backoff; publishes meanwhile queue in a bounded outbox that flushes on
/// reconnect.
pub struct RedisBus {
    client: redis::Client,
    consumer: String,
    link: Mutex<Link>,
    up: AtomicBool,
}

struct Link {
    conn: Option<redis::aio::MultiplexedConnection>,
    outbox: VecDeque<(String, String)>,
    backoff: Duration,
    next_attempt: Instant,
}

impl RedisBus {
    pub fn new(url: &str, consumer: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            consumer: consumer.to_string(),
            link: Mutex::new(Link {
                conn: None,
                outbox: VecDeque::new(),
                backoff: Duration::from_millis(gto_core::BACKOFF_BASE_MS),
                next_attempt: Instant::now(),
            }),
            up: AtomicBool::new(false),
        })
    }

    fn unacked(&self, queue: &str) -> String {
        format!("{}:unacked:{}", queue, self.consumer)
    }

    /// Hands out a live connection, reconnecting (and flushing the outbox)
    /// when the backoff window allows another attempt.
    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, BusError> {
        let mut link = self.link.lock().await;
        if let Some(conn) = link.conn.clone() {
            return Ok(conn);
        }
        if Instant::now() < link.next_attempt {
            return Err(BusError::BrokerUnavailable(String::from("backing off")));
        }
        match self.client.get_multiplexed_async_connection().await {
            Ok(mut conn) => {
                while let Some((queue, json)) = link.outbox.pop_front() {
                    if let Err(e) = conn.lpush::<_, _, ()>(&queue, &json).await {
                        link.outbox.push_front((queue, json));
                        link.next_attempt = Instant::now() + link.backoff;
                        return Err(e.into());
                    }
                }
                link.backoff = Duration::from_millis(gto_core::BACKOFF_BASE_MS);
                link.conn = Some(conn.clone());
                self.up.store(true, Ordering::Relaxed);
                log::info!("[bus] connected to broker");
                Ok(conn)
            }
            Err(e) => {
                link.backoff =
                    (link.backoff * 2).min(Duration::from_millis(gto_core::BACKOFF_CAP_MS));
                link.next_attempt = Instant::now() + link.backoff;
                log::warn!("[bus] reconnect failed, next attempt in {:?}", link.backoff);
                Err(e.into())
            }
        }
    }

    /// Marks the connection dead so the next operation reconnects.
    async fn disconnected(&self) {
        let mut link = self.link.lock().await;
        link.conn = None;
        self.up.store(false, Ordering::Relaxed);
    }

    /// Buffers a publish across a disconnect, bounded.
    async fn buffer(&self, queue: &str, json: String) -> Result<(), BusError> {
        let mut link = self.link.lock().await;
        if link.outbox.len() >= gto_core::OUTBOX_CAPACITY {
            return Err(BusError::OutboxFull);
        }
        link.outbox.push_back((queue.to_string(), json));
        Ok(())
    }
}

#[async_trait::async_trait]
impl Bus for RedisBus {
    async fn publish(&self, queue: &str, envelope: Envelope) -> Result<(), BusError> {
        let json = envelope.to_json();
        match self.connection().await {
            Ok(mut conn) => match conn.lpush::<_, _, ()>(queue, &json).await {
                Ok(()) => Ok(()),
                Err(e) => {
                    log::warn!("[bus] publish failed, buffering: {}", e);
                    self.disconnected().await;
                    self.buffer(queue, json).await
                }
            },
            Err(BusError::OutboxFull) => Err(BusError::OutboxFull),
            Err(_) => self.buffer(queue, json).await,
        }
    }

    async fn consume(&self, queue: &str, wait: Duration) -> Result<Option<Delivery>, BusError> {
        let deadline = Instant::now() + wait;
        let unacked = self.unacked(queue);
        loop {
            let mut conn = self.connection().await?;
            let moved: Result<Option<String>, _> = conn
                .lmove(queue, &unacked, redis::Direction::Right, redis::Direction::Left)
                .await;
            match moved {
                Ok(Some(json)) => {
                    let envelope = Envelope::from_json(&json)?;
                    return Ok(Some(Delivery {
                        envelope,
                        tag: json,
                    }));
                }
                Ok(None) => {
                    if Instant::now() >= deadline {
                        return Ok(None);
                    }
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                Err(e) => {
                    self.disconnected().await;
                    return Err(e.into());
                }
            }
        }
    }

    async fn ack(&self, queue: &str, tag: &str) -> Result<(), BusError> {
        let mut conn = self.connection().await?;
        let removed: i64 = conn
            .lrem(self.unacked(queue), 1, tag)
            .await
            .inspect_err(|_| self.up.store(false, Ordering::Relaxed))?;
        if removed == 0 {
            return Err(BusError::UnknownDelivery {
                queue: queue.to_string(),
            });
        }
        Ok(())
    }

    async fn recover(&self, queue: &str) -> Result<usize, BusError> {
        let mut conn = self.connection().await?;
        let lists: Vec<String> = conn.keys(format!("{}:unacked:*", queue)).await?;
        let horizon = gto_core::now().saturating_sub(gto_core::UNACKED_AFTER_SECS);
        let mut requeued = 0usize;
        for list in lists {
            let held: Vec<String> = conn.lrange(&list, 0, -1).await?;
            for json in held {
                let stale = Envelope::from_json(&json)
                    .map(|e| e.enqueued_at <= horizon)
                    .unwrap_or(true);
                if stale {
                    let gone: i64 = conn.lrem(&list, 1, &json).await?;
                    if gone > 0 {
                        conn.lpush::<_, _, ()>(queue, &json).await?;
                        requeued += 1;
                    }
                }
            }
        }
        if requeued > 0 {
            log::warn!("[bus] requeued {} stale deliveries onto {}", requeued, queue);
        }
        Ok(requeued)
    }

    async fn depth(&self, queue: &str) -> Result<u64, BusError> {
        let mut conn = self.connection().await?;
        Ok(conn.llen(queue).await?)
    }

    fn connected(&self) -> bool {
        self.up.load(Ordering::Relaxed)
    }
}
