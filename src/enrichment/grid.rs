//! Coarse grid cells that let nearby balloons share one weather lookup.
//!
//! Cell keys double as cache key suffixes, so the formatting here must stay stable.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::Track;

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub key: String,
    pub lat: f64,
    pub lon: f64,
    pub balloon_ids: BTreeSet<String>,
}

/// Nearest multiple of `resolution`, with `-0.0` folded into `0.0`.
pub fn round_to_grid(value: f64, resolution: f64) -> f64 {
    (value / resolution).round() * resolution + 0.0
}

pub fn cell_key(lat: f64, lon: f64) -> String {
    format!("{lat:.1}:{lon:.1}")
}

/// Group every track's latest position into cells, ordered by key.
pub fn cluster_latest(tracks: &BTreeMap<String, Track>, resolution: f64) -> Vec<Cell> {
    let mut cells: BTreeMap<String, Cell> = BTreeMap::new();

    for track in tracks.values() {
        let Some(latest) = track.latest() else {
            continue;
        };

        let lat = round_to_grid(latest.lat, resolution);
        let lon = round_to_grid(latest.lon, resolution);
        let key = cell_key(lat, lon);

        cells
            .entry(key.clone())
            .or_insert_with(|| Cell {
                key,
                lat,
                lon,
                balloon_ids: BTreeSet::new(),
            })
            .balloon_ids
            .insert(track.id.clone());
    }

    cells.into_values().collect()
}
