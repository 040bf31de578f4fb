//! Open-Meteo current weather, many coordinates per request.
//!
//! The provider answers a multi-location request with an array of per-location
//! objects and a single-location request with one object. Both carry
//! `current_weather` with °C, km/h and degrees.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::WeatherConfig;
use crate::models::WeatherReading;
use crate::resilience::RemoteError;

pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenMeteoClient {
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("balloon-tracker/0.1")
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .context("Failed to create weather HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// One request for every `(lat, lon)` in `coords`. The result is positional:
    /// `result[i]` is the reading for `coords[i]`, and it may be shorter than
    /// `coords` when the provider returns fewer entries.
    pub async fn fetch_batch(
        &self,
        coords: &[(f64, f64)],
    ) -> Result<Vec<Option<WeatherReading>>, RemoteError> {
        let latitudes = join_coords(coords.iter().map(|(lat, _)| *lat));
        let longitudes = join_coords(coords.iter().map(|(_, lon)| *lon));

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", latitudes.as_str()),
                ("longitude", longitudes.as_str()),
                ("current_weather", "true"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }

        let body = resp.text().await?;
        let value: Value =
            serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))?;

        let readings = parse_current_weather(&value);
        debug!(
            requested = coords.len(),
            returned = readings.len(),
            "Open-Meteo batch parsed"
        );
        Ok(readings)
    }
}

fn join_coords(values: impl Iterator<Item = f64>) -> String {
    values.map(|v| v.to_string()).collect::<Vec<_>>().join(",")
}

pub fn kmh_to_ms(kmh: f64) -> f64 {
    kmh / 3.6
}

/// Lenient parse: whatever entries have a `current_weather` object become readings,
/// anything else becomes `None` at its position. An unrecognised body yields nothing.
pub fn parse_current_weather(body: &Value) -> Vec<Option<WeatherReading>> {
    match body {
        Value::Array(items) => items.iter().map(parse_point).collect(),
        Value::Object(map) if map.contains_key("current_weather") => vec![parse_point(body)],
        _ => Vec::new(),
    }
}

fn parse_point(item: &Value) -> Option<WeatherReading> {
    let point: ProviderPoint = serde_json::from_value(item.clone()).ok()?;
    let current = point.current_weather?;

    Some(WeatherReading {
        temperature_c: current.temperature,
        wind_speed_ms: current.windspeed.map(kmh_to_ms),
        wind_direction_deg: current.winddirection,
    })
}

#[derive(Debug, Deserialize)]
struct ProviderPoint {
    current_weather: Option<CurrentWeather>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: Option<f64>,
    windspeed: Option<f64>,
    winddirection: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wind_speed_converted_to_ms() {
        assert!((kmh_to_ms(36.0) - 10.0).abs() < 1e-12);

        let body = json!({
            "latitude": 10.0,
            "longitude": 20.0,
            "current_weather": {"temperature": 21.4, "windspeed": 36.0, "winddirection": 180.0}
        });
        let readings = parse_current_weather(&body);
        assert_eq!(readings.len(), 1);

        let reading = readings[0].unwrap();
        assert_eq!(reading.temperature_c, Some(21.4));
        assert!((reading.wind_speed_ms.unwrap() - 10.0).abs() < 1e-12);
        assert_eq!(reading.wind_direction_deg, Some(180.0));
    }

    #[test]
    fn test_array_response_is_positional() {
        let body = json!([
            {"current_weather": {"temperature": 1.0, "windspeed": 3.6, "winddirection": 90}},
            {"unexpected": true},
            {"current_weather": {"temperature": 3.0}}
        ]);
        let readings = parse_current_weather(&body);

        assert_eq!(readings.len(), 3);
        assert_eq!(readings[0].unwrap().temperature_c, Some(1.0));
        assert!(readings[1].is_none());

        let partial = readings[2].unwrap();
        assert_eq!(partial.temperature_c, Some(3.0));
        assert_eq!(partial.wind_speed_ms, None);
        assert_eq!(partial.wind_direction_deg, None);
    }

    #[test]
    fn test_unrecognised_body_yields_nothing() {
        assert!(parse_current_weather(&json!({"error": true, "reason": "bad"})).is_empty());
        assert!(parse_current_weather(&json!("text")).is_empty());
    }

    #[test]
    fn test_wrongly_typed_fields_drop_the_entry() {
        let body = json!([{"current_weather": {"temperature": "warm"}}]);
        assert_eq!(parse_current_weather(&body), vec![None]);
    }

    #[test]
    fn test_join_coords() {
        assert_eq!(join_coords([10.0, -20.5].into_iter()), "10,-20.5");
    }
}
