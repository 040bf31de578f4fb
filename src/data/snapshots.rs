//! Hourly balloon position snapshots.
//!
//! Fetches `<base>/<HH>.json` for every hour in the lookback window and parses
//! each body into raw records. A bad hour is logged and skipped; it never
//! aborts the others.

use std::time::Duration;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::SnapshotConfig;
use crate::resilience::RemoteError;

/// One validated `[lat, lon, alt?]` tuple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawRecord {
    pub lat: f64,
    pub lon: f64,
    pub alt: Option<f64>,
}

/// Records from one hour, each tagged with its index in the hour's array.
#[derive(Debug, Clone, PartialEq)]
pub struct HourSnapshot {
    pub hour: u32,
    pub records: Vec<(usize, RawRecord)>,
    pub dropped: usize,
}

pub struct SnapshotFetcher {
    client: reqwest::Client,
    base_url: String,
    hours_back: u32,
    max_concurrency: usize,
}

impl SnapshotFetcher {
    pub fn new(config: &SnapshotConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("balloon-tracker/0.1")
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .context("Failed to create snapshot HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            hours_back: config.hours_back,
            max_concurrency: config.max_concurrency.max(1),
        })
    }

    pub fn hours_back(&self) -> u32 {
        self.hours_back
    }

    pub fn snapshot_url(&self, hour: u32) -> String {
        format!("{}/{:02}.json", self.base_url, hour)
    }

    /// Fetch every hour concurrently, pushing each available hour into `out` as it
    /// settles. Hours that fail are left out. Results arrive in completion order.
    ///
    /// Taking `out` by reference lets a caller that times this future out keep the
    /// hours that had already arrived.
    pub async fn fetch_all_into(&self, out: &mut Vec<HourSnapshot>) {
        let mut pending = stream::iter(0..self.hours_back)
            .map(|hour| async move { self.fetch_hour(hour).await })
            .buffer_unordered(self.max_concurrency);

        while let Some(snapshot) = pending.next().await {
            if let Some(snapshot) = snapshot {
                out.push(snapshot);
            }
        }
    }

    /// One hour's snapshot, or `None` when it is unavailable.
    #[instrument(skip(self))]
    pub async fn fetch_hour(&self, hour: u32) -> Option<HourSnapshot> {
        match self.try_fetch_hour(hour).await {
            Ok(snapshot) => {
                if snapshot.dropped > 0 {
                    debug!(
                        hour,
                        kept = snapshot.records.len(),
                        dropped = snapshot.dropped,
                        "Dropped malformed snapshot records"
                    );
                }
                Some(snapshot)
            }
            Err(e) => {
                warn!(hour, error = %e, "Snapshot unavailable");
                None
            }
        }
    }

    async fn try_fetch_hour(&self, hour: u32) -> Result<HourSnapshot, RemoteError> {
        let resp = self.client.get(self.snapshot_url(hour)).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }

        let body = resp.text().await?;
        let value: Value =
            serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))?;

        parse_snapshot(hour, &value)
            .ok_or_else(|| RemoteError::Decode("snapshot body is not a JSON array".to_string()))
    }
}

/// Parse a snapshot body. `None` when the body is not an array; otherwise every
/// well-formed record is kept and the rest are counted as dropped.
pub fn parse_snapshot(hour: u32, body: &Value) -> Option<HourSnapshot> {
    let entries = body.as_array()?;

    let mut records = Vec::with_capacity(entries.len());
    let mut dropped = 0;

    for (index, entry) in entries.iter().enumerate() {
        match parse_record(entry) {
            Some(record) => records.push((index, record)),
            None => dropped += 1,
        }
    }

    Some(HourSnapshot {
        hour,
        records,
        dropped,
    })
}

fn parse_record(entry: &Value) -> Option<RawRecord> {
    let fields = entry.as_array()?;
    if fields.len() < 2 {
        return None;
    }

    let lat = coerce_number(&fields[0])?;
    let lon = coerce_number(&fields[1])?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }

    let alt = fields.get(2).and_then(coerce_number);

    Some(RawRecord { lat, lon, alt })
}

/// Numbers and numeric strings; anything non-finite is rejected.
fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_malformed_records_dropped_rest_kept() {
        let body = json!([[10.2, 20.5, 5.0], [91, 20, 5], ["bad"]]);
        let snapshot = parse_snapshot(0, &body).unwrap();

        assert_eq!(
            snapshot.records,
            vec![(
                0,
                RawRecord {
                    lat: 10.2,
                    lon: 20.5,
                    alt: Some(5.0)
                }
            )]
        );
        assert_eq!(snapshot.dropped, 2);
    }

    #[test]
    fn test_indices_survive_gaps() {
        let body = json!([null, [1.0, 2.0], "x", [3.0, 4.0, 100.0]]);
        let snapshot = parse_snapshot(7, &body).unwrap();

        let indices: Vec<usize> = snapshot.records.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![1, 3]);
        assert_eq!(snapshot.hour, 7);
        assert_eq!(snapshot.records[0].1.alt, None);
    }

    #[test]
    fn test_non_array_body_is_unavailable() {
        assert!(parse_snapshot(0, &json!({"error": "nope"})).is_none());
        assert!(parse_snapshot(0, &json!("corrupted")).is_none());
        assert!(parse_snapshot(0, &Value::Null).is_none());
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let body = json!([["45.5", " -120.25 ", "12000"]]);
        let snapshot = parse_snapshot(0, &body).unwrap();
        assert_eq!(
            snapshot.records[0].1,
            RawRecord {
                lat: 45.5,
                lon: -120.25,
                alt: Some(12000.0)
            }
        );
    }

    #[test]
    fn test_range_edges() {
        let body = json!([[90, 180], [-90, -180], [0, 180.0001], [-90.5, 0]]);
        let snapshot = parse_snapshot(0, &body).unwrap();
        assert_eq!(snapshot.records.len(), 2);
        assert_eq!(snapshot.dropped, 2);
    }

    #[test]
    fn test_non_numeric_fields_rejected() {
        let body = json!([[true, 1], [null, null], [{"lat": 1}, 2], ["NaN", 3], [1, 2, "high"]]);
        let snapshot = parse_snapshot(0, &body).unwrap();

        // Only the last record survives; its bad altitude becomes None
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.records[0].0, 4);
        assert_eq!(snapshot.records[0].1.alt, None);
    }

    #[test]
    fn test_snapshot_url_is_zero_padded() {
        let mut config = crate::config::test_config().snapshots;
        config.base_url = "http://feed.local/treasure/".to_string();
        let fetcher = SnapshotFetcher::new(&config).unwrap();
        assert_eq!(fetcher.snapshot_url(3), "http://feed.local/treasure/03.json");
        assert_eq!(fetcher.snapshot_url(23), "http://feed.local/treasure/23.json");
    }
}
