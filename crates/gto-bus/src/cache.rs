use redis::AsyncCommands;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::BusError;

/// Opaque byte storage for strategy snapshots.
///
/// The orchestrator writes its table snapshot here after every closed wave;
/// workers read it before traversing so their regret matching reflects the
/// simulation's cumulative state. Values are whole blobs, replaced
/// atomically.
#[async_trait::async_trait]
pub trait ByteCache: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), BusError>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BusError>;
    async fn remove(&self, key: &str) -> Result<(), BusError>;
}

/// In-process cache for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryCache(Mutex<HashMap<String, Vec<u8>>>);

#[async_trait::async_trait]
impl ByteCache for MemoryCache {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), BusError> {
        self.0.lock().await.insert(key.to_string(), bytes);
        Ok(())
    }
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BusError> {
        Ok(self.0.lock().await.get(key).cloned())
    }
    async fn remove(&self, key: &str) -> Result<(), BusError> {
        self.0.lock().await.remove(key);
        Ok(())
    }
}

/// Redis-backed cache for multi-process deployments.
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    pub fn new(url: &str) -> Result<Self, BusError> {
        Ok(Self {
            client: redis::Client::open(url)?,
        })
    }
    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, BusError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait::async_trait]
impl ByteCache for RedisCache {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), BusError> {
        Ok(self.connection().await?.set(key, bytes).await?)
    }
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BusError> {
        Ok(self.connection().await?.get(key).await?)
    }
    async fn remove(&self, key: &str) -> Result<(), BusError> {
        Ok(self.connection().await?.del(key).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_cache_round_trips() {
        let cache = MemoryCache::default();
        assert_eq!(cache.get("k").await.unwrap(), None);
        cache.put("k", vec![1, 2, 3]).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(vec![1, 2, 3]));
        cache.remove("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
