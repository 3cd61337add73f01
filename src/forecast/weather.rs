//! Current-conditions lookup (OpenWeatherMap)
//!
//! Supplies the weather record that both the simulator and the predictor
//! consume. Lookups never fail loudly: any problem is logged and reported as
//! "no weather", and callers fall back to `WeatherSnapshot::fallback()`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::WeatherSnapshot;

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Current conditions for `city`, or `None` when unavailable.
    async fn current(&self, city: &str) -> Option<WeatherSnapshot>;
}

/// Provider name for a fleet city, where the two differ.
pub fn provider_city_name(city: &str) -> &str {
    match city {
        "Trichy" => "Tiruchirappalli",
        other => other,
    }
}

/// OpenWeatherMap "current weather" client
pub struct OpenWeatherMapClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenWeatherMapClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build weather HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    async fn fetch(&self, city: &str, api_key: &str) -> Result<WeatherSnapshot> {
        let url = format!("{}/data/2.5/weather", self.base_url.trim_end_matches('/'));
        let name = provider_city_name(city);

        debug!(city, provider_city = name, "fetching current weather");

        let response = self
            .client
            .get(&url)
            .query(&[("q", name), ("appid", api_key), ("units", "metric")])
            .send()
            .await
            .context("weather request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("weather API error: {}", response.status());
        }

        let body: OwmResponse = response
            .json()
            .await
            .context("failed to parse weather response")?;

        Ok(body.into_snapshot())
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherMapClient {
    async fn current(&self, city: &str) -> Option<WeatherSnapshot> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!(city, "weather API key not configured, weather unavailable");
            return None;
        };

        match self.fetch(city, api_key).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(city, error = %e, "weather lookup failed");
                None
            }
        }
    }
}

// OpenWeatherMap response structures
#[derive(Debug, Default, Deserialize)]
struct OwmResponse {
    #[serde(default)]
    main: OwmMain,
    #[serde(default)]
    clouds: OwmClouds,
    #[serde(default)]
    wind: OwmWind,
    uvi: Option<f64>,
    /// Metres.
    visibility: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OwmMain {
    temp: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OwmClouds {
    all: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OwmWind {
    speed: Option<f64>,
}

impl OwmResponse {
    fn into_snapshot(self) -> WeatherSnapshot {
        WeatherSnapshot {
            temperature_c: self.main.temp.unwrap_or(WeatherSnapshot::FALLBACK_TEMPERATURE_C),
            humidity_percent: self.main.humidity.unwrap_or(WeatherSnapshot::FALLBACK_HUMIDITY_PERCENT),
            cloud_cover_percent: self.clouds.all.unwrap_or(WeatherSnapshot::FALLBACK_CLOUD_COVER_PERCENT),
            wind_speed_ms: self.wind.speed.unwrap_or(WeatherSnapshot::FALLBACK_WIND_SPEED_MS),
            uv_index: self.uvi.unwrap_or(WeatherSnapshot::FALLBACK_UV_INDEX),
            visibility_km: self
                .visibility
                .map(|m| m / 1000.0)
                .unwrap_or(WeatherSnapshot::FALLBACK_VISIBILITY_KM),
            solar_irradiance_wm2: None,
        }
    }
}
