use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection failed: {0}")]
    Connection(String),
    #[error("cache command failed: {0}")]
    Command(String),
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Raw string key-value store with expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Bulk lookup. The result is positional: `result[i]` belongs to `keys[i]`.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError>;

    /// Store every entry with the same expiry in one round trip. Not atomic as a set.
    async fn set_many(&self, entries: &[(String, String)], ttl: Duration) -> Result<(), CacheError>;

    fn name(&self) -> &str;
}

/// Redis over a single multiplexed connection, cloned per operation.
pub struct RedisBackend {
    conn: MultiplexedConnection,
}

impl RedisBackend {
    pub async fn connect(redis_url: &SecretString) -> Result<Self, CacheError> {
        let client = Client::open(redis_url.expose_secret())
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut cmd = redis::cmd("MGET");
        for key in keys {
            cmd.arg(key.as_str());
        }

        let mut conn = self.conn.clone();
        let values: Vec<Option<String>> = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Command(e.to_string()))?;

        Ok(values)
    }

    async fn set_many(&self, entries: &[(String, String)], ttl: Duration) -> Result<(), CacheError> {
        if entries.is_empty() {
            return Ok(());
        }

        // SETEX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        let mut pipe = redis::pipe();
        for (key, value) in entries {
            pipe.set_ex(key.as_str(), value.as_str(), seconds).ignore();
        }

        let mut conn = self.conn.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Command(e.to_string()))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "redis"
    }
}

/// In-process map with expiry on the tokio clock.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries that have not expired yet.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|(_, expires)| *expires > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, (_, expires)| *expires > now);

        Ok(keys
            .iter()
            .map(|key| entries.get(key).map(|(value, _)| value.clone()))
            .collect())
    }

    async fn set_many(&self, entries: &[(String, String)], ttl: Duration) -> Result<(), CacheError> {
        let expires = Instant::now() + ttl;
        let mut map = self.entries.lock().await;
        for (key, value) in entries {
            map.insert(key.clone(), (value.clone(), expires));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_memory_backend_is_positional() {
        let backend = MemoryBackend::new();
        backend
            .set_many(&[("b".to_string(), "2".to_string())], Duration::from_secs(60))
            .await
            .unwrap();

        let values = backend
            .get_many(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(values, vec![None, Some("2".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_backend_expires() {
        let backend = MemoryBackend::new();
        backend
            .set_many(&[("k".to_string(), "v".to_string())], Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(backend.len().await, 1);

        tokio::time::advance(Duration::from_secs(31)).await;

        assert!(backend.is_empty().await);
        let values = backend.get_many(&["k".to_string()]).await.unwrap();
        assert_eq!(values, vec![None]);
    }
}
