//! Open-Meteo current-conditions wind source (`http` feature)
//!
//! Queries the public forecast endpoint for 10 m wind speed and direction at
//! the requested coordinate, asking for m/s directly.

use crate::core_types::{Degrees, MetersPerSecond};
use crate::error::FetchError;
use crate::wind::{WindDataSource, WindSample};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com";

// A hung request would hold its cell in-flight indefinitely
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<CurrentWind>,
}

#[derive(Debug, Deserialize)]
struct CurrentWind {
    wind_speed_10m: Option<f64>,
    wind_direction_10m: Option<f64>,
}

/// HTTP client for the Open-Meteo forecast API
#[derive(Debug, Clone)]
pub struct OpenMeteoSource {
    client: reqwest::Client,
    base_url: String,
}

impl OpenMeteoSource {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point at a mirror or self-hosted instance
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for OpenMeteoSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WindDataSource for OpenMeteoSource {
    async fn fetch(&self, lat: f64, lon: f64) -> Result<WindSample, FetchError> {
        let url = format!("{}/v1/forecast", self.base_url.trim_end_matches('/'));
        let response: ForecastResponse = self
            .client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .query(&[
                ("latitude", format!("{lat:.4}")),
                ("longitude", format!("{lon:.4}")),
                ("current", "wind_speed_10m,wind_direction_10m".to_string()),
                ("wind_speed_unit", "ms".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let current = response
            .current
            .ok_or_else(|| FetchError::InvalidResponse("missing `current` block".to_string()))?;
        match (current.wind_speed_10m, current.wind_direction_10m) {
            (Some(speed), Some(direction)) if speed.is_finite() && direction.is_finite() => Ok(
                WindSample::new(MetersPerSecond::new(speed), Degrees::new(direction).normalized()),
            ),
            _ => Err(FetchError::InvalidResponse(
                "missing or non-finite 10 m wind values".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "open-meteo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_current_block() {
        let body = r#"{
            "latitude": -31.95,
            "longitude": 115.86,
            "current": { "time": "2024-01-15T06:00", "wind_speed_10m": 7.4, "wind_direction_10m": 225.0 }
        }"#;
        let response: ForecastResponse = serde_json::from_str(body).unwrap();
        let current = response.current.unwrap();
        assert_eq!(current.wind_speed_10m, Some(7.4));
        assert_eq!(current.wind_direction_10m, Some(225.0));
    }

    #[test]
    fn test_missing_current_block_parses_as_none() {
        let response: ForecastResponse = serde_json::from_str(r#"{ "latitude": 0.0 }"#).unwrap();
        assert!(response.current.is_none());
    }
}
