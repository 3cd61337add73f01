use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::inference::{InferenceProvider, InferenceRequest};
use crate::domain::{HistoricalObservation, Prediction, PredictionFactors, PredictionSource, WeatherSnapshot};
use crate::simulation::solar::{cloud_derate, humidity_derate, temperature_derate};

/// Reference irradiance for a fully lit panel.
pub const PEAK_IRRADIANCE_WM2: f64 = 1000.0;
/// Share of the external estimate in a blended prediction.
pub const EXTERNAL_WEIGHT: f64 = 0.7;
/// Confidence ceiling when only the physical model ran.
pub const FALLBACK_CONFIDENCE_CAP: f64 = 0.6;
/// History needed before confidence gets a boost.
pub const RICH_HISTORY_LEN: usize = 10;

/// Irradiance guess from cloud cover and UV index.
pub fn estimate_irradiance(weather: &WeatherSnapshot) -> f64 {
    let cloud_reduction = weather.cloud_cover_percent / 100.0;
    let uv_factor = (weather.uv_index / 10.0).min(1.0);
    PEAK_IRRADIANCE_WM2 * (1.0 - cloud_reduction * 0.8) * uv_factor
}

pub fn physical_factors(weather: &WeatherSnapshot) -> PredictionFactors {
    let irradiance = weather
        .solar_irradiance_wm2
        .unwrap_or_else(|| estimate_irradiance(weather));
    PredictionFactors {
        temperature: temperature_derate(weather.temperature_c, 0.3),
        cloudiness: cloud_derate(weather.cloud_cover_percent),
        humidity: humidity_derate(weather.humidity_percent),
        solar_radiation: (irradiance / PEAK_IRRADIANCE_WM2).min(1.0),
    }
}

/// Base 0.7, +0.2 with rich history, -0.2 in extreme weather, kept in [0.3, 0.95].
pub fn confidence(weather: &WeatherSnapshot, history_len: usize) -> f64 {
    let mut confidence: f64 = 0.7;
    if history_len >= RICH_HISTORY_LEN {
        confidence += 0.2;
    }
    if weather.is_extreme() {
        confidence -= 0.2;
    }
    confidence.clamp(0.3, 0.95)
}

/// Expected-output model: physical sub-factors, optionally blended with an
/// external estimate.
pub struct OutputPredictor {
    inference: Option<Arc<dyn InferenceProvider>>,
    timeout: Duration,
}

impl OutputPredictor {
    /// Physical model only.
    pub fn physical() -> Self {
        Self {
            inference: None,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_inference(inference: Arc<dyn InferenceProvider>, timeout: Duration) -> Self {
        Self {
            inference: Some(inference),
            timeout,
        }
    }

    pub fn has_inference(&self) -> bool {
        self.inference.is_some()
    }

    /// Never fails: an unavailable external estimate falls back to the physical model.
    pub async fn predict(
        &self,
        weather: &WeatherSnapshot,
        capacity_kw: f64,
        history: &[HistoricalObservation],
    ) -> Prediction {
        let factors = physical_factors(weather);
        let traditional_kw = capacity_kw * factors.product();
        let confidence = confidence(weather, history.len());

        match self.external_estimate(weather, capacity_kw, history).await {
            Some(external_kw) => Prediction {
                predicted_kw: (external_kw * EXTERNAL_WEIGHT + traditional_kw * (1.0 - EXTERNAL_WEIGHT)).max(0.0),
                confidence,
                factors,
                source: PredictionSource::Blended,
            },
            None => Prediction {
                predicted_kw: traditional_kw.max(0.0),
                confidence: confidence.min(FALLBACK_CONFIDENCE_CAP),
                factors,
                source: PredictionSource::Physical,
            },
        }
    }

    async fn external_estimate(
        &self,
        weather: &WeatherSnapshot,
        capacity_kw: f64,
        history: &[HistoricalObservation],
    ) -> Option<f64> {
        let inference = self.inference.as_ref()?;
        let request = InferenceRequest::new(*weather, capacity_kw, history);

        match tokio::time::timeout(self.timeout, inference.estimate_kw(&request)).await {
            Ok(Ok(kw)) => {
                debug!(external_kw = kw, "external estimate available");
                Some(kw)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "external estimate failed, using physical model");
                None
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "external estimate timed out, using physical model");
                None
            }
        }
    }
}
