//! Resolves weather for grid cells: cache first, then rate-limited batched
//! Open-Meteo calls for the misses, written back to the cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::WeatherCache;
use crate::config::AppConfig;
use crate::data::open_meteo::OpenMeteoClient;
use crate::enrichment::grid::Cell;
use crate::models::WeatherReading;
use crate::resilience::rate_limiter::FixedWindowLimiter;
use crate::resilience::retry::RetryPolicy;

/// Counters from one `resolve_into` pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub batches_issued: usize,
    pub batches_failed: usize,
    pub cells_fetched: usize,
    pub limiter_wait: Duration,
}

pub struct WeatherBatchFetcher {
    provider: OpenMeteoClient,
    cache: Arc<WeatherCache>,
    /// Provider budget shared by every request this process serves.
    limiter: Mutex<FixedWindowLimiter>,
    retry: RetryPolicy,
    batch_size: usize,
}

impl WeatherBatchFetcher {
    pub fn new(
        provider: OpenMeteoClient,
        cache: Arc<WeatherCache>,
        limiter: FixedWindowLimiter,
        retry: RetryPolicy,
        batch_size: usize,
    ) -> Self {
        Self {
            provider,
            cache,
            limiter: Mutex::new(limiter),
            retry,
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(config: &AppConfig, cache: Arc<WeatherCache>) -> Result<Self> {
        Ok(Self::new(
            OpenMeteoClient::new(&config.weather)?,
            cache,
            FixedWindowLimiter::from_config(&config.rate_limit),
            RetryPolicy::from_config(&config.retry),
            config.weather.batch_size,
        ))
    }

    pub fn cache(&self) -> &WeatherCache {
        &self.cache
    }

    /// Rate-limit units left in the current window.
    pub async fn remaining_capacity(&self) -> u32 {
        self.limiter.lock().await.remaining()
    }

    /// Resolve readings for `cells` into `resolved`, keyed by cell key.
    ///
    /// Batches run one after another so limiter accounting stays exact. Results are
    /// pushed into `resolved` as each batch lands, so a caller that abandons this
    /// future on a deadline keeps everything resolved so far. Cells that cannot be
    /// resolved this round are simply left out.
    pub async fn resolve_into(
        &self,
        cells: &[Cell],
        resolved: &mut HashMap<String, WeatherReading>,
        report: &mut BatchReport,
    ) {
        let keys: Vec<String> = cells.iter().map(|c| c.key.clone()).collect();
        let hits = self.cache.get(&keys).await;

        let misses: Vec<&Cell> = cells.iter().filter(|c| !hits.contains_key(&c.key)).collect();
        let hit_count = hits.len();
        report.cache_hits += hit_count;
        report.cache_misses += misses.len();
        resolved.extend(hits);

        debug!(
            cells = cells.len(),
            hits = hit_count,
            misses = misses.len(),
            "Weather cache partitioned"
        );

        for (n, batch) in misses.chunks(self.batch_size).enumerate() {
            let fresh = self.fetch_batch(n, batch, report).await;
            if fresh.is_empty() {
                continue;
            }

            self.cache.set_many(&fresh, self.cache.ttl()).await;
            report.cells_fetched += fresh.len();
            resolved.extend(fresh);
        }

        info!(
            hits = report.cache_hits,
            fetched = report.cells_fetched,
            batches = report.batches_issued,
            failed = report.batches_failed,
            "Weather resolved"
        );
    }

    async fn fetch_batch(
        &self,
        n: usize,
        batch: &[&Cell],
        report: &mut BatchReport,
    ) -> Vec<(String, WeatherReading)> {
        // The guard is held through any wait so batches consume capacity in order
        let waited = self.limiter.lock().await.acquire().await;
        report.limiter_wait += waited;
        report.batches_issued += 1;

        let coords: Vec<(f64, f64)> = batch.iter().map(|c| (c.lat, c.lon)).collect();

        match self.retry.run(|| self.provider.fetch_batch(&coords)).await {
            Ok(readings) => {
                if readings.len() < batch.len() {
                    warn!(
                        batch = n,
                        requested = batch.len(),
                        returned = readings.len(),
                        "Short weather batch, remaining cells left without weather"
                    );
                }
                pair_readings(batch, readings)
            }
            Err(e) => {
                report.batches_failed += 1;
                warn!(batch = n, cells = batch.len(), error = %e, "Weather batch dropped");
                Vec::new()
            }
        }
    }
}

/// Match provider results to cells by position, dropping cells without a reading.
fn pair_readings(
    batch: &[&Cell],
    readings: Vec<Option<WeatherReading>>,
) -> Vec<(String, WeatherReading)> {
    batch
        .iter()
        .zip(readings)
        .filter_map(|(cell, reading)| reading.map(|r| (cell.key.clone(), r)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn cell(key: &str) -> Cell {
        Cell {
            key: key.to_string(),
            lat: 0.0,
            lon: 0.0,
            balloon_ids: BTreeSet::new(),
        }
    }

    fn reading(t: f64) -> WeatherReading {
        WeatherReading {
            temperature_c: Some(t),
            wind_speed_ms: None,
            wind_direction_deg: None,
        }
    }

    #[test]
    fn test_pair_readings_short_result() {
        let cells = [cell("a"), cell("b"), cell("c")];
        let batch: Vec<&Cell> = cells.iter().collect();

        let paired = pair_readings(&batch, vec![Some(reading(1.0)), None]);

        assert_eq!(paired, vec![("a".to_string(), reading(1.0))]);
    }

    #[test]
    fn test_pair_readings_ignores_extra_results() {
        let cells = [cell("a")];
        let batch: Vec<&Cell> = cells.iter().collect();

        let paired = pair_readings(&batch, vec![Some(reading(1.0)), Some(reading(2.0))]);

        assert_eq!(paired.len(), 1);
        assert_eq!(paired[0].1, reading(1.0));
    }
}
