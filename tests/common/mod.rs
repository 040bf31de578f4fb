#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use balloon_tracker::cache::{MemoryBackend, WeatherCache};
use balloon_tracker::config::{AppConfig, CacheBackendKind};
use balloon_tracker::enrichment::{Cell, Enricher};
use serde_json::{json, Value};
use wiremock::{Request, Respond, ResponseTemplate};

/// Default configuration pointed at a mock server, with short delays.
pub fn test_config(server_uri: &str) -> AppConfig {
    let mut config: AppConfig =
        toml::from_str(include_str!("../../config/default.toml")).expect("default config parses");
    config.snapshots.base_url = server_uri.to_string();
    config.snapshots.request_timeout_seconds = 2;
    config.weather.base_url = format!("{server_uri}/v1/forecast");
    config.retry.base_delay_ms = 5;
    config.cache.backend = CacheBackendKind::Memory;
    config
}

pub fn memory_cache(config: &AppConfig) -> (Arc<MemoryBackend>, Arc<WeatherCache>) {
    let backend = Arc::new(MemoryBackend::new());
    let cache = Arc::new(WeatherCache::with_backend(backend.clone(), &config.cache));
    (backend, cache)
}

pub fn enricher(config: &AppConfig, cache: Arc<WeatherCache>) -> Enricher {
    Enricher::from_config(config, cache).expect("enricher builds")
}

pub fn cell(lat: f64, lon: f64) -> Cell {
    Cell {
        key: format!("{lat:.1}:{lon:.1}"),
        lat,
        lon,
        balloon_ids: BTreeSet::new(),
    }
}

pub fn current_weather(temperature: f64, windspeed_kmh: f64, direction: f64) -> Value {
    json!({
        "current_weather": {
            "temperature": temperature,
            "windspeed": windspeed_kmh,
            "winddirection": direction
        }
    })
}

/// Answers a batched forecast request with one entry per requested latitude,
/// using the request position as the temperature.
pub struct EchoWeather;

impl Respond for EchoWeather {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let count = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "latitude")
            .map(|(_, v)| v.split(',').count())
            .unwrap_or(0);

        let body: Vec<Value> = (0..count)
            .map(|i| current_weather(i as f64, 36.0, 90.0))
            .collect();
        ResponseTemplate::new(200).set_body_json(body)
    }
}
