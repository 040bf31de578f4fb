//! The read entry point: snapshots → tracks → cells → weather → response.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::time::{timeout_at, Instant};
use tracing::{instrument, warn};

use crate::cache::WeatherCache;
use crate::config::AppConfig;
use crate::data::snapshots::SnapshotFetcher;
use crate::enrichment::batch::{BatchReport, WeatherBatchFetcher};
use crate::enrichment::grid::{cluster_latest, Cell};
use crate::models::{BalloonHistory, WeatherReading};
use crate::monitoring::stats::{log_stats, EnrichmentStats};
use crate::tracks::{build_tracks, TrackSet};

pub struct Enricher {
    snapshots: SnapshotFetcher,
    weather: WeatherBatchFetcher,
    grid_resolution: f64,
    request_timeout: Duration,
}

impl Enricher {
    pub fn new(
        snapshots: SnapshotFetcher,
        weather: WeatherBatchFetcher,
        grid_resolution: f64,
        request_timeout: Duration,
    ) -> Self {
        Self {
            snapshots,
            weather,
            grid_resolution,
            request_timeout,
        }
    }

    pub fn from_config(config: &AppConfig, cache: Arc<WeatherCache>) -> Result<Self> {
        Ok(Self::new(
            SnapshotFetcher::new(&config.snapshots)?,
            WeatherBatchFetcher::from_config(config, cache)?,
            config.grid.resolution_degrees,
            Duration::from_secs(config.pipeline.request_timeout_seconds),
        ))
    }

    pub fn cache(&self) -> &WeatherCache {
        self.weather.cache()
    }

    /// Build a fresh balloon history with the latest weather per balloon.
    ///
    /// Unavailable hours, failed batches and cache outages only shrink the result.
    /// When the request deadline passes, whatever was gathered so far is returned.
    #[instrument(skip(self), fields(request_id = %uuid::Uuid::new_v4()))]
    pub async fn build_history(&self) -> Result<BalloonHistory> {
        let (history, stats) = self.build_history_with_stats().await?;
        log_stats(&stats);
        Ok(history)
    }

    pub async fn build_history_with_stats(&self) -> Result<(BalloonHistory, EnrichmentStats)> {
        let started = Instant::now();
        let deadline = started + self.request_timeout;
        let now = Utc::now();

        let mut stats = EnrichmentStats {
            hours_requested: self.snapshots.hours_back() as usize,
            ..Default::default()
        };

        let mut hours = Vec::new();
        if timeout_at(deadline, self.snapshots.fetch_all_into(&mut hours))
            .await
            .is_err()
        {
            warn!(
                available = hours.len(),
                "Request deadline reached while fetching snapshots"
            );
            stats.timed_out = true;
        }
        stats.hours_available = hours.len();
        stats.records_dropped = hours.iter().map(|h| h.dropped).sum();

        let TrackSet { tracks, points } = build_tracks(&hours, now);
        let cells = cluster_latest(&tracks, self.grid_resolution);

        let mut resolved = HashMap::new();
        let mut report = BatchReport::default();
        if !cells.is_empty() && !stats.timed_out {
            let weather = self.weather.resolve_into(&cells, &mut resolved, &mut report);
            if timeout_at(deadline, weather).await.is_err() {
                warn!(
                    resolved = resolved.len(),
                    cells = cells.len(),
                    "Request deadline reached while fetching weather"
                );
                stats.timed_out = true;
            }
        }

        let latest_weather = fan_out(&cells, &resolved);

        stats.balloons = tracks.len();
        stats.points = points.len();
        stats.cells = cells.len();
        stats.cells_resolved = resolved.len();
        stats.batch = report;
        stats.elapsed = started.elapsed();

        let history = BalloonHistory {
            generated_at: now,
            points,
            balloons: tracks,
            latest_weather,
        };

        Ok((history, stats))
    }
}

/// Give every balloon in a resolved cell that cell's reading. Balloons in
/// unresolved cells get no entry.
pub fn fan_out(
    cells: &[Cell],
    resolved: &HashMap<String, WeatherReading>,
) -> BTreeMap<String, WeatherReading> {
    let mut weather = BTreeMap::new();
    for cell in cells {
        let Some(reading) = resolved.get(&cell.key) else {
            continue;
        };
        for id in &cell.balloon_ids {
            weather.insert(id.clone(), *reading);
        }
    }
    weather
}
