use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::backend::{CacheBackend, CacheError, MemoryBackend, RedisBackend};
use crate::config::{CacheBackendKind, CacheConfig, Secrets};
use crate::models::WeatherReading;

/// Typed, namespaced view over a [`CacheBackend`].
///
/// Keys passed in and out are cell keys; the namespace prefix is added here.
/// With no backend every lookup misses and every write is dropped.
pub struct WeatherCache {
    backend: Option<Arc<dyn CacheBackend>>,
    namespace: String,
    ttl: Duration,
    op_timeout: Duration,
}

impl WeatherCache {
    /// Build the cache selected by `config`. Never fails: an unreachable or
    /// unconfigured backend leaves the cache disabled.
    pub async fn connect(config: &CacheConfig, secrets: &Secrets) -> Self {
        let backend: Option<Arc<dyn CacheBackend>> = match config.backend {
            CacheBackendKind::None => None,
            CacheBackendKind::Memory => Some(Arc::new(MemoryBackend::new())),
            CacheBackendKind::Redis => match secrets.redis_url {
                None => {
                    warn!("REDIS_URL not set, weather cache disabled");
                    None
                }
                Some(ref url) => {
                    let timeout = Duration::from_millis(config.operation_timeout_ms);
                    match tokio::time::timeout(timeout, RedisBackend::connect(url)).await {
                        Ok(Ok(redis)) => Some(Arc::new(redis)),
                        Ok(Err(e)) => {
                            warn!(error = %e, "Redis unreachable, weather cache disabled");
                            None
                        }
                        Err(_) => {
                            warn!(
                                timeout_ms = config.operation_timeout_ms,
                                "Redis connect timed out, weather cache disabled"
                            );
                            None
                        }
                    }
                }
            },
        };

        let cache = match backend {
            Some(backend) => Self::with_backend(backend, config),
            None => Self::disabled(config),
        };

        info!(
            backend = cache.backend_name(),
            ttl_seconds = config.ttl_seconds,
            "Weather cache ready"
        );
        cache
    }

    pub fn with_backend(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        Self {
            backend: Some(backend),
            namespace: config.namespace.clone(),
            ttl: Duration::from_secs(config.ttl_seconds),
            op_timeout: Duration::from_millis(config.operation_timeout_ms),
        }
    }

    pub fn disabled(config: &CacheConfig) -> Self {
        Self {
            backend: None,
            namespace: config.namespace.clone(),
            ttl: Duration::from_secs(config.ttl_seconds),
            op_timeout: Duration::from_millis(config.operation_timeout_ms),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.as_ref().map_or("none", |b| b.name())
    }

    /// Configured expiry for fresh readings.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// `<namespace>:<cell key>`
    pub fn storage_key(&self, cell_key: &str) -> String {
        format!("{}:{}", self.namespace, cell_key)
    }

    /// One bulk lookup. Cells missing from the returned map are absent: not cached,
    /// expired, undecodable, or the cache is unavailable.
    pub async fn get(&self, cell_keys: &[String]) -> HashMap<String, WeatherReading> {
        let mut found = HashMap::new();
        let Some(ref backend) = self.backend else {
            return found;
        };
        if cell_keys.is_empty() {
            return found;
        }

        let storage_keys: Vec<String> = cell_keys.iter().map(|k| self.storage_key(k)).collect();

        let values = match self.bounded(backend.get_many(&storage_keys)).await {
            Ok(values) => values,
            Err(e) => {
                warn!(error = %e, keys = cell_keys.len(), "Cache lookup failed, treating all as misses");
                return found;
            }
        };

        for (cell_key, value) in cell_keys.iter().zip(values) {
            let Some(raw) = value else {
                continue;
            };
            match serde_json::from_str::<WeatherReading>(&raw) {
                Ok(reading) => {
                    found.insert(cell_key.clone(), reading);
                }
                Err(e) => {
                    debug!(cell = %cell_key, error = %e, "Undecodable cache entry, treating as miss");
                }
            }
        }

        found
    }

    pub async fn set(&self, cell_key: &str, reading: &WeatherReading, ttl: Duration) {
        self.set_many(&[(cell_key.to_string(), *reading)], ttl).await;
    }

    /// Pipelined write of several readings with the same expiry.
    pub async fn set_many(&self, readings: &[(String, WeatherReading)], ttl: Duration) {
        let Some(ref backend) = self.backend else {
            return;
        };
        if readings.is_empty() {
            return;
        }

        let mut entries = Vec::with_capacity(readings.len());
        for (cell_key, reading) in readings {
            match serde_json::to_string(reading) {
                Ok(raw) => entries.push((self.storage_key(cell_key), raw)),
                Err(e) => warn!(cell = %cell_key, error = %e, "Failed to encode weather reading"),
            }
        }

        if let Err(e) = self.bounded(backend.set_many(&entries, ttl)).await {
            warn!(error = %e, entries = entries.len(), "Cache write failed");
        }
    }

    /// Release the backend connection.
    pub async fn close(self) {
        if let Some(backend) = self.backend {
            info!(backend = backend.name(), "Weather cache closed");
        }
    }

    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        match tokio::time::timeout(self.op_timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.op_timeout)),
        }
    }
}
