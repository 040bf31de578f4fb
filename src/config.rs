use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub snapshots: SnapshotConfig,
    pub weather: WeatherConfig,
    pub grid: GridConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    pub base_url: String,
    pub hours_back: u32,
    pub request_timeout_seconds: u64,
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    pub base_url: String,
    pub batch_size: usize,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    pub resolution_degrees: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Redis,
    Memory,
    None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub namespace: String,
    pub ttl_seconds: u64,
    pub operation_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_per_window: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub json: bool,
}

/// Secrets loaded exclusively from environment variables.
/// Not serializable, not stored in config files.
pub struct Secrets {
    pub redis_url: Option<SecretString>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .ok()
                .filter(|url| !url.trim().is_empty())
                .map(SecretString::from),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, overlaying environment variables.
    ///
    /// Overrides that fail to parse are returned rather than logged, since this
    /// runs before the subscriber is installed.
    pub fn load(config_path: &Path) -> Result<(Self, Secrets, Vec<RejectedOverride>)> {
        dotenvy::dotenv().ok();

        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        let rejected = config.apply_env_overrides();
        config.validate()?;

        let secrets = Secrets::from_env();

        Ok((config, secrets, rejected))
    }

    /// Overlay the operational knobs that deployments tune through the environment.
    /// Returns the variables that were set but could not be parsed; those keep
    /// their file value.
    pub fn apply_env_overrides(&mut self) -> Vec<RejectedOverride> {
        let mut rejected = Vec::new();
        let r = &mut rejected;
        env_override("CACHE_TTL_SECONDS", &mut self.cache.ttl_seconds, r);
        env_override("GRID_RESOLUTION_DEGREES", &mut self.grid.resolution_degrees, r);
        env_override("WEATHER_BATCH_SIZE", &mut self.weather.batch_size, r);
        env_override("RATE_LIMIT_WINDOW_MS", &mut self.rate_limit.window_ms, r);
        env_override("RATE_LIMIT_MAX_PER_WINDOW", &mut self.rate_limit.max_per_window, r);
        env_override("RETRY_MAX_ATTEMPTS", &mut self.retry.max_attempts, r);
        env_override("RETRY_BASE_DELAY_MS", &mut self.retry.base_delay_ms, r);
        env_override("HOURS_BACK", &mut self.snapshots.hours_back, r);
        rejected
    }

    pub fn validate(&self) -> Result<()> {
        let grid = self.grid.resolution_degrees;
        if !grid.is_finite() || grid <= 0.0 {
            bail!("grid.resolution_degrees must be a positive number, got {grid}");
        }
        if self.weather.batch_size == 0 {
            bail!("weather.batch_size must be at least 1");
        }
        if !(1..=24).contains(&self.snapshots.hours_back) {
            bail!(
                "snapshots.hours_back must be within 1..=24, got {}",
                self.snapshots.hours_back
            );
        }
        if self.rate_limit.max_per_window == 0 || self.rate_limit.window_ms == 0 {
            bail!("rate_limit.window_ms and rate_limit.max_per_window must be non-zero");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        Ok(())
    }
}

/// An environment override that was set but did not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedOverride {
    pub var: &'static str,
    pub value: String,
}

impl RejectedOverride {
    pub fn log(&self) {
        tracing::warn!(var = self.var, value = %self.value, "Ignoring unparseable environment override");
    }
}

fn env_override<T: FromStr>(name: &'static str, target: &mut T, rejected: &mut Vec<RejectedOverride>) {
    let Ok(raw) = std::env::var(name) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => rejected.push(RejectedOverride {
            var: name,
            value: raw,
        }),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    toml::from_str(include_str!("../config/default.toml")).expect("default config should parse")
}
