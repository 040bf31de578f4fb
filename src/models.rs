use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observed balloon position from one hourly snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub balloon_id: String,
    pub timestamp: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub alt: Option<f64>,
    /// 0 is the most recent hour; larger values are further in the past.
    pub snapshot_index: u32,
}

/// Ordered history of one balloon, stored ascending by `snapshot_index`.
///
/// Balloon identity is the record's position within each hour's array. The upstream
/// feed carries no stable fleet id, so if its ordering shifts between hours a track
/// can splice two different balloons together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub points: Vec<Position>,
}

impl Track {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            points: Vec::new(),
        }
    }

    /// Most recent capture: the point with the smallest `snapshot_index`.
    pub fn latest(&self) -> Option<&Position> {
        self.points.first()
    }
}

/// Current conditions for one grid cell, shared by every balloon in it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReading {
    pub temperature_c: Option<f64>,
    pub wind_speed_ms: Option<f64>,
    pub wind_direction_deg: Option<f64>,
}

/// Everything the read entry point returns. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalloonHistory {
    pub generated_at: DateTime<Utc>,
    pub points: Vec<Position>,
    pub balloons: BTreeMap<String, Track>,
    pub latest_weather: BTreeMap<String, WeatherReading>,
}
