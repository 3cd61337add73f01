//! Batch analysis across the fleet.
//!
//! Per building: weather lookup, history fetch, prediction and simulation,
//! alert check, then persistence of the building, a history row and any new
//! alert. A bad building is reported in the batch result and the rest carry
//! on. A storage failure ends the batch, and an alert raised in that cycle
//! is retracted from the engine so the next batch can raise it again.

use chrono::{DateTime, Utc};
use futures::{stream, StreamExt, TryStreamExt};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use super::alerts::AlertEngine;
use crate::domain::{
    Alert, AlertFactors, AlertStats, AlertSummary, Building, BuildingStatus, EquipmentStatus,
    HistoricalObservation, PowerHistoryRecord, PredictionFactors, PredictionSource,
    SimulationFactors, WeatherSnapshot,
};
use crate::forecast::{OutputPredictor, WeatherProvider};
use crate::repo::Repositories;
use crate::simulation::PowerSimulator;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
    #[error("building {building_id} cannot be analyzed: {reason}")]
    InvalidBuilding { building_id: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    /// History rows fed to the predictor per building.
    pub history_limit: usize,
    /// Buildings analyzed at once.
    pub max_concurrency: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            history_limit: 50,
            max_concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildingAnalysis {
    pub building_id: String,
    pub building_name: String,
    pub actual_kw: f64,
    pub predicted_kw: f64,
    pub difference: f64,
    pub efficiency: f64,
    pub status: BuildingStatus,
    pub confidence: f64,
    pub prediction_source: PredictionSource,
    pub simulation_factors: SimulationFactors,
    pub prediction_factors: PredictionFactors,
    pub equipment_status: EquipmentStatus,
    pub weather: WeatherSnapshot,
    /// False when the provider had nothing and fallback weather was used.
    pub weather_available: bool,
    pub alert: Option<AlertSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildingFailure {
    pub building_id: String,
    pub building_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BuildingOutcome {
    Analyzed(BuildingAnalysis),
    Failed(BuildingFailure),
}

impl BuildingOutcome {
    pub fn is_analyzed(&self) -> bool {
        matches!(self, BuildingOutcome::Analyzed(_))
    }

    pub fn building_id(&self) -> &str {
        match self {
            BuildingOutcome::Analyzed(a) => &a.building_id,
            BuildingOutcome::Failed(f) => &f.building_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub results: Vec<BuildingOutcome>,
    pub alert_stats: AlertStats,
    pub total_buildings: usize,
    pub processed_buildings: usize,
}

pub struct AnalysisOrchestrator {
    weather: Arc<dyn WeatherProvider>,
    predictor: Arc<OutputPredictor>,
    simulator: PowerSimulator,
    alerts: Arc<AlertEngine>,
    repos: Repositories,
    settings: AnalysisSettings,
}

impl AnalysisOrchestrator {
    pub fn new(
        weather: Arc<dyn WeatherProvider>,
        predictor: Arc<OutputPredictor>,
        simulator: PowerSimulator,
        alerts: Arc<AlertEngine>,
        repos: Repositories,
        settings: AnalysisSettings,
    ) -> Self {
        Self {
            weather,
            predictor,
            simulator,
            alerts,
            repos,
            settings,
        }
    }

    pub fn alerts(&self) -> &Arc<AlertEngine> {
        &self.alerts
    }

    /// Analyze every stored building.
    pub async fn run_batch(&self) -> Result<AnalysisReport, AnalysisError> {
        self.run_batch_at(Utc::now()).await
    }

    #[instrument(skip(self), fields(buildings = tracing::field::Empty))]
    pub async fn run_batch_at(&self, now: DateTime<Utc>) -> Result<AnalysisReport, AnalysisError> {
        let buildings = self.repos.buildings.list().await?;
        tracing::Span::current().record("buildings", buildings.len());
        let total_buildings = buildings.len();

        let results: Vec<BuildingOutcome> = stream::iter(buildings)
            .map(|building| self.analyze_isolated(building, now))
            .buffered(self.settings.max_concurrency.max(1))
            .try_collect()
            .await?;

        let processed_buildings = results.iter().filter(|r| r.is_analyzed()).count();
        let alert_stats = self.alerts.stats();
        info!(
            total_buildings,
            processed_buildings,
            unacknowledged_alerts = alert_stats.unacknowledged,
            "analysis batch complete"
        );

        Ok(AnalysisReport {
            success: true,
            timestamp: now,
            results,
            alert_stats,
            total_buildings,
            processed_buildings,
        })
    }

    /// Per-building errors become a `Failed` entry; storage errors propagate.
    async fn analyze_isolated(
        &self,
        building: Building,
        now: DateTime<Utc>,
    ) -> Result<BuildingOutcome, AnalysisError> {
        let building_id = building.id.clone();
        let building_name = building.name.clone();
        match self.analyze_building(building, now).await {
            Ok(analysis) => Ok(BuildingOutcome::Analyzed(analysis)),
            Err(e @ AnalysisError::InvalidBuilding { .. }) => {
                warn!(building_id = %building_id, error = %e, "building analysis failed");
                Ok(BuildingOutcome::Failed(BuildingFailure {
                    building_id,
                    building_name,
                    error: e.to_string(),
                }))
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, building, now), fields(building_id = %building.id))]
    async fn analyze_building(
        &self,
        mut building: Building,
        now: DateTime<Utc>,
    ) -> Result<BuildingAnalysis, AnalysisError> {
        validate(&building)?;

        let reported = self.weather.current(&building.city).await;
        if reported.is_none() {
            warn!(city = %building.city, "weather unavailable, using fallback conditions");
        }
        let weather = reported.unwrap_or_else(WeatherSnapshot::fallback);

        let observations: Vec<HistoricalObservation> = self
            .repos
            .history
            .recent(&building.id, self.settings.history_limit)
            .await?
            .iter()
            .map(PowerHistoryRecord::observation)
            .collect();

        let simulation = self
            .simulator
            .simulate(&building.id, building.capacity_kw, reported.as_ref(), now);
        let prediction = self
            .predictor
            .predict(&weather, building.capacity_kw, &observations)
            .await;

        let alert = self.alerts.analyze_at(
            now,
            &building.id,
            &building.name,
            simulation.actual_kw,
            prediction.predicted_kw,
            Some(AlertFactors::new(&simulation.factors, Some(prediction.factors))),
        );

        building.record_cycle(simulation.actual_kw, prediction.predicted_kw, now);
        let record = PowerHistoryRecord {
            building_id: building.id.clone(),
            building_name: building.name.clone(),
            timestamp: now,
            actual_kw: simulation.actual_kw,
            predicted_kw: prediction.predicted_kw,
            weather,
            factors: simulation.factors,
            equipment_status: simulation.equipment_status,
            prediction,
        };
        if let Err(e) = self.persist_cycle(&building, &record, alert.as_ref()).await {
            if let Some(alert) = &alert {
                self.alerts.retract(&alert.id);
            }
            return Err(e.into());
        }

        Ok(BuildingAnalysis {
            efficiency: building.efficiency(),
            status: building.status(),
            difference: simulation.actual_kw - prediction.predicted_kw,
            building_id: building.id,
            building_name: building.name,
            actual_kw: simulation.actual_kw,
            predicted_kw: prediction.predicted_kw,
            confidence: prediction.confidence,
            prediction_source: prediction.source,
            simulation_factors: simulation.factors,
            prediction_factors: prediction.factors,
            equipment_status: simulation.equipment_status,
            weather,
            weather_available: reported.is_some(),
            alert: alert.as_ref().map(|a| a.summary()),
        })
    }

    /// Building, history row, then the alert. An alert only stays in the
    /// engine's log once it has been stored.
    async fn persist_cycle(
        &self,
        building: &Building,
        record: &PowerHistoryRecord,
        alert: Option<&Alert>,
    ) -> anyhow::Result<()> {
        self.repos.buildings.upsert(building).await?;
        self.repos.history.append(record).await?;
        if let Some(alert) = alert {
            self.repos.alerts.insert(alert).await?;
        }
        Ok(())
    }
}

fn validate(building: &Building) -> Result<(), AnalysisError> {
    if !building.capacity_kw.is_finite() || building.capacity_kw <= 0.0 {
        return Err(AnalysisError::InvalidBuilding {
            building_id: building.id.clone(),
            reason: format!("capacity must be positive, got {}", building.capacity_kw),
        });
    }
    if building.city.trim().is_empty() {
        return Err(AnalysisError::InvalidBuilding {
            building_id: building.id.clone(),
            reason: "city is empty".to_string(),
        });
    }
    Ok(())
}
