//! Weather enrichment: grid clustering, cached batch lookups, and the
//! end-to-end orchestrator behind the read entry point.

pub mod batch;
pub mod grid;
pub mod orchestrator;

pub use batch::WeatherBatchFetcher;
pub use grid::{cluster_latest, Cell};
pub use orchestrator::Enricher;
