use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::data::snapshots::HourSnapshot;
use crate::models::{Position, Track};

/// Tracks keyed by balloon id plus every position in fold order.
#[derive(Debug, Clone, Default)]
pub struct TrackSet {
    pub tracks: BTreeMap<String, Track>,
    pub points: Vec<Position>,
}

pub fn balloon_id(index: usize) -> String {
    format!("balloon-{index}")
}

/// Fold hourly snapshots into tracks.
///
/// Hours are folded in ascending order whatever order they arrived in, so
/// `points` is ordered by hour and then by record index. Each position is stamped
/// `now - hour`. Tracks end up sorted ascending by `snapshot_index`, and a balloon
/// with no valid record in any hour never gets a track.
pub fn build_tracks(snapshots: &[HourSnapshot], now: DateTime<Utc>) -> TrackSet {
    let mut ordered: Vec<&HourSnapshot> = snapshots.iter().collect();
    ordered.sort_by_key(|s| s.hour);

    let mut set = TrackSet::default();

    for snapshot in ordered {
        let timestamp = now - Duration::hours(i64::from(snapshot.hour));

        for (index, record) in &snapshot.records {
            let id = balloon_id(*index);
            let position = Position {
                balloon_id: id.clone(),
                timestamp,
                lat: record.lat,
                lon: record.lon,
                alt: record.alt,
                snapshot_index: snapshot.hour,
            };

            set.tracks
                .entry(id.clone())
                .or_insert_with(|| Track::new(id))
                .points
                .push(position.clone());
            set.points.push(position);
        }
    }

    for track in set.tracks.values_mut() {
        track.points.sort_by_key(|p| p.snapshot_index);
    }

    set
}
