pub mod cache;
pub mod config;
pub mod data;
pub mod enrichment;
pub mod models;
pub mod monitoring;
pub mod resilience;
pub mod tracks;
