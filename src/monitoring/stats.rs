//! Per-request enrichment statistics.

use std::time::Duration;

use tracing::info;

use crate::enrichment::batch::BatchReport;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentStats {
    pub hours_requested: usize,
    pub hours_available: usize,
    pub records_dropped: usize,
    pub balloons: usize,
    pub points: usize,
    pub cells: usize,
    pub cells_resolved: usize,
    pub batch: BatchReport,
    pub elapsed: Duration,
    pub timed_out: bool,
}

impl EnrichmentStats {
    /// Share of cells that ended up with weather, 0.0 when there were no cells.
    pub fn coverage(&self) -> f64 {
        if self.cells == 0 {
            return 0.0;
        }
        self.cells_resolved as f64 / self.cells as f64
    }

    pub fn summary(&self) -> String {
        format!(
            "Hours: {}/{} ({} records dropped) | Balloons: {} ({} points)\n\
             Cells: {} ({} resolved, {:.0}% coverage) | Cache: {} hits / {} misses\n\
             Batches: {} issued, {} failed | Limiter wait: {}ms | Elapsed: {}ms{}",
            self.hours_available,
            self.hours_requested,
            self.records_dropped,
            self.balloons,
            self.points,
            self.cells,
            self.cells_resolved,
            self.coverage() * 100.0,
            self.batch.cache_hits,
            self.batch.cache_misses,
            self.batch.batches_issued,
            self.batch.batches_failed,
            self.batch.limiter_wait.as_millis(),
            self.elapsed.as_millis(),
            if self.timed_out { " | TIMED OUT" } else { "" },
        )
    }
}

pub fn log_stats(stats: &EnrichmentStats) {
    info!(
        hours_available = stats.hours_available,
        hours_requested = stats.hours_requested,
        records_dropped = stats.records_dropped,
        balloons = stats.balloons,
        cells = stats.cells,
        cells_resolved = stats.cells_resolved,
        cache_hits = stats.batch.cache_hits,
        cache_misses = stats.batch.cache_misses,
        batches_issued = stats.batch.batches_issued,
        batches_failed = stats.batch.batches_failed,
        limiter_wait_ms = stats.batch.limiter_wait.as_millis() as u64,
        elapsed_ms = stats.elapsed.as_millis() as u64,
        timed_out = stats.timed_out,
        "Balloon history built"
    );
}
