use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use balloon_tracker::cache::WeatherCache;
use balloon_tracker::config::AppConfig;
use balloon_tracker::enrichment::Enricher;
use balloon_tracker::monitoring::{logger, server};

#[derive(Debug, Parser)]
#[command(name = "balloon-tracker", version, about = "Balloon flight tracks enriched with current weather")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config/default.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the balloon history over HTTP (default)
    Serve,
    /// Build the balloon history once and print it as JSON
    Snapshot,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, secrets, rejected_overrides) = AppConfig::load(&cli.config)?;

    logger::init_logging(&config.monitoring)?;
    for rejected in &rejected_overrides {
        rejected.log();
    }

    tracing::info!(
        hours_back = config.snapshots.hours_back,
        grid = config.grid.resolution_degrees,
        batch_size = config.weather.batch_size,
        "Balloon tracker starting"
    );

    let cache = Arc::new(WeatherCache::connect(&config.cache, &secrets).await);
    let enricher = Arc::new(Enricher::from_config(&config, cache.clone())?);

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(&config, enricher.clone()).await,
        Command::Snapshot => run_snapshot(&enricher).await,
    };

    // Close the cache once nothing else holds it
    drop(enricher);
    match Arc::try_unwrap(cache) {
        Ok(cache) => cache.close().await,
        Err(_) => tracing::warn!("Weather cache still shared at shutdown, dropping without close"),
    }

    result
}

async fn run_server(config: &AppConfig, enricher: Arc<Enricher>) -> Result<()> {
    let state = server::ApiState::new(enricher);
    server::serve(state, &config.server.bind, config.server.port).await
}

async fn run_snapshot(enricher: &Enricher) -> Result<()> {
    let (history, stats) = enricher
        .build_history_with_stats()
        .await
        .context("could not build balloon history")?;

    println!("{}", serde_json::to_string_pretty(&history)?);
    eprintln!("\n{}", stats.summary());

    Ok(())
}
