//! Upstream feeds: hourly balloon snapshots and Open-Meteo current weather.

pub mod open_meteo;
pub mod snapshots;
