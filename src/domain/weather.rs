use serde::{Deserialize, Serialize};

/// Current conditions for one city, normalized from whatever provider served them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature_c: f64,
    pub humidity_percent: f64,
    pub cloud_cover_percent: f64,
    pub wind_speed_ms: f64,
    pub uv_index: f64,
    pub visibility_km: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solar_irradiance_wm2: Option<f64>,
}

impl WeatherSnapshot {
    pub const FALLBACK_TEMPERATURE_C: f64 = 25.0;
    pub const FALLBACK_HUMIDITY_PERCENT: f64 = 50.0;
    pub const FALLBACK_CLOUD_COVER_PERCENT: f64 = 20.0;
    pub const FALLBACK_WIND_SPEED_MS: f64 = 2.0;
    pub const FALLBACK_UV_INDEX: f64 = 5.0;
    pub const FALLBACK_VISIBILITY_KM: f64 = 10.0;

    /// Record used downstream when the provider has nothing for a city.
    pub fn fallback() -> Self {
        Self {
            temperature_c: Self::FALLBACK_TEMPERATURE_C,
            humidity_percent: Self::FALLBACK_HUMIDITY_PERCENT,
            cloud_cover_percent: Self::FALLBACK_CLOUD_COVER_PERCENT,
            wind_speed_ms: Self::FALLBACK_WIND_SPEED_MS,
            uv_index: Self::FALLBACK_UV_INDEX,
            visibility_km: Self::FALLBACK_VISIBILITY_KM,
            solar_irradiance_wm2: None,
        }
    }

    /// Cloud cover above 80% or temperature outside 0..=40 °C.
    pub fn is_extreme(&self) -> bool {
        self.cloud_cover_percent > 80.0 || self.temperature_c > 40.0 || self.temperature_c < 0.0
    }
}
