use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::{PredictionFactors, SimulationFactors};

/// Deviation magnitude tier. Declared in ascending order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Most likely root cause of a deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AlertType {
    Performance,
    Equipment,
    Weather,
    Maintenance,
}

/// Factor snapshot attached to an alert for root-cause classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertFactors {
    pub equipment_efficiency: f64,
    pub maintenance_status: f64,
    pub weather_impact: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<PredictionFactors>,
}

impl AlertFactors {
    pub fn new(simulation: &SimulationFactors, prediction: Option<PredictionFactors>) -> Self {
        Self {
            equipment_efficiency: simulation.equipment_efficiency,
            maintenance_status: simulation.maintenance_status,
            weather_impact: simulation.weather_impact,
            prediction,
        }
    }

    pub const EQUIPMENT_LIMIT: f64 = 0.8;
    pub const MAINTENANCE_LIMIT: f64 = 0.85;
    pub const WEATHER_LIMIT: f64 = 0.6;

    /// First matching cause wins: equipment, maintenance, weather.
    pub fn classify(&self) -> AlertType {
        if self.equipment_efficiency < Self::EQUIPMENT_LIMIT {
            AlertType::Equipment
        } else if self.maintenance_status < Self::MAINTENANCE_LIMIT {
            AlertType::Maintenance
        } else if self.weather_impact < Self::WEATHER_LIMIT {
            AlertType::Weather
        } else {
            AlertType::Performance
        }
    }

    /// Human readable list of every cause that applies.
    pub fn possible_causes(&self) -> Vec<&'static str> {
        let mut causes = Vec::new();
        if self.equipment_efficiency < Self::EQUIPMENT_LIMIT {
            causes.push("Equipment efficiency issues detected");
        }
        if self.maintenance_status < Self::MAINTENANCE_LIMIT {
            causes.push("Maintenance required");
        }
        if self.weather_impact < Self::WEATHER_LIMIT {
            causes.push("Adverse weather conditions");
        }
        if let Some(p) = &self.prediction {
            if p.cloudiness < 0.5 {
                causes.push("High cloud cover reducing solar irradiance");
            }
            if p.temperature < 0.8 {
                causes.push("High temperature reducing panel efficiency");
            }
        }
        causes
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub building_id: String,
    pub building_name: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub actual_kw: f64,
    pub predicted_kw: f64,
    /// actual - predicted
    pub difference: f64,
    pub difference_percentage: f64,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factors: Option<AlertFactors>,
}

impl Alert {
    pub fn summary(&self) -> AlertSummary {
        AlertSummary {
            id: self.id.clone(),
            severity: self.severity,
            title: self.title.clone(),
            message: self.message.clone(),
        }
    }
}

/// Compact alert reference embedded in analysis results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSummary {
    pub id: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

/// Counts over an alert log. Per-severity counts cover unacknowledged alerts only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertStats {
    pub total: usize,
    pub unacknowledged: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl AlertStats {
    pub fn from_alerts<'a>(alerts: impl IntoIterator<Item = &'a Alert>) -> Self {
        let mut stats = Self::default();
        for alert in alerts {
            stats.total += 1;
            if alert.acknowledged {
                continue;
            }
            stats.unacknowledged += 1;
            match alert.severity {
                Severity::Critical => stats.critical += 1,
                Severity::High => stats.high += 1,
                Severity::Medium => stats.medium += 1,
                Severity::Low => stats.low += 1,
            }
        }
        stats
    }
}

/// Query over alerts; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AlertFilter {
    pub building_id: Option<String>,
    pub acknowledged: Option<bool>,
    pub severity: Option<Severity>,
}

impl AlertFilter {
    pub fn matches(&self, alert: &Alert) -> bool {
        self.building_id.as_deref().map_or(true, |id| alert.building_id == id)
            && self.acknowledged.map_or(true, |ack| alert.acknowledged == ack)
            && self.severity.map_or(true, |sev| alert.severity == sev)
    }
}
