//! Per-balloon track assembly from hourly snapshots.

pub mod builder;

pub use builder::{build_tracks, TrackSet};
