use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::WeatherSnapshot;

/// Simulated hardware condition; each factor is a multiplier in (0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquipmentStatus {
    pub inverter_efficiency: f64,
    pub panel_degradation: f64,
    pub soiling: f64,
    pub shading: f64,
}

impl EquipmentStatus {
    /// Combined equipment multiplier.
    pub fn efficiency(&self) -> f64 {
        self.inverter_efficiency * self.panel_degradation * self.soiling * self.shading
    }
}

/// Contributions behind one simulated reading. `base_generation_kw` is in kW,
/// the rest are multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationFactors {
    pub base_generation_kw: f64,
    pub weather_impact: f64,
    pub equipment_efficiency: f64,
    pub maintenance_status: f64,
    pub random_variation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub building_id: String,
    pub timestamp: DateTime<Utc>,
    pub actual_kw: f64,
    pub factors: SimulationFactors,
    pub equipment_status: EquipmentStatus,
}

/// Physical sub-factors of a prediction, each a multiplier in (0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionFactors {
    pub temperature: f64,
    pub cloudiness: f64,
    pub humidity: f64,
    pub solar_radiation: f64,
}

impl PredictionFactors {
    pub fn product(&self) -> f64 {
        self.temperature * self.cloudiness * self.humidity * self.solar_radiation
    }
}

/// Which path produced a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    /// External estimate blended with the physical model.
    Blended,
    /// Physical model only.
    Physical,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub predicted_kw: f64,
    pub confidence: f64,
    pub factors: PredictionFactors,
    pub source: PredictionSource,
}

/// A past reading fed back to the predictor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalObservation {
    pub weather: WeatherSnapshot,
    pub actual_kw: f64,
}

/// One row of the append-only power history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerHistoryRecord {
    pub building_id: String,
    pub building_name: String,
    pub timestamp: DateTime<Utc>,
    pub actual_kw: f64,
    pub predicted_kw: f64,
    pub weather: WeatherSnapshot,
    pub factors: SimulationFactors,
    pub equipment_status: EquipmentStatus,
    pub prediction: Prediction,
}

impl PowerHistoryRecord {
    pub fn observation(&self) -> HistoricalObservation {
        HistoricalObservation {
            weather: self.weather,
            actual_kw: self.actual_kw,
        }
    }
}
