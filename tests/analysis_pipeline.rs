use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use solar_fleet_monitor::controller::{
    AlertEngine, AnalysisError, AnalysisOrchestrator, AnalysisSettings, BuildingOutcome,
};
use solar_fleet_monitor::domain::{
    Alert, AlertFilter, Building, PowerHistoryRecord, PredictionSource, Severity, WeatherSnapshot,
};
use solar_fleet_monitor::forecast::{InferenceProvider, InferenceRequest, OutputPredictor, WeatherProvider};
use solar_fleet_monitor::repo::{AlertRepository, MemoryStore, PowerHistoryRepository, Repositories};
use solar_fleet_monitor::simulation::PowerSimulator;

struct FixedWeather(Option<WeatherSnapshot>);

#[async_trait]
impl WeatherProvider for FixedWeather {
    async fn current(&self, _city: &str) -> Option<WeatherSnapshot> {
        self.0
    }
}

struct FixedEstimate(f64);

#[async_trait]
impl InferenceProvider for FixedEstimate {
    async fn estimate_kw(&self, _request: &InferenceRequest) -> Result<f64> {
        Ok(self.0)
    }
}

struct BrokenHistory;

#[async_trait]
impl PowerHistoryRepository for BrokenHistory {
    async fn append(&self, _record: &PowerHistoryRecord) -> Result<()> {
        anyhow::bail!("history table unavailable")
    }

    async fn recent(&self, _building_id: &str, _limit: usize) -> Result<Vec<PowerHistoryRecord>> {
        Ok(Vec::new())
    }
}

/// Alert table that rejects the first insert.
struct FlakyAlerts {
    inner: MemoryStore,
    failed_once: AtomicBool,
}

#[async_trait]
impl AlertRepository for FlakyAlerts {
    async fn insert(&self, alert: &Alert) -> Result<()> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            anyhow::bail!("alert table unavailable");
        }
        self.inner.insert(alert).await
    }

    async fn acknowledge(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        self.inner.acknowledge(id, at).await
    }

    async fn query(&self, filter: &AlertFilter, limit: usize) -> Result<Vec<Alert>> {
        self.inner.query(filter, limit).await
    }
}

fn clear_noon() -> WeatherSnapshot {
    WeatherSnapshot {
        temperature_c: 30.0,
        humidity_percent: 70.0,
        cloud_cover_percent: 50.0,
        wind_speed_ms: 3.0,
        uv_index: 10.0,
        visibility_km: 10.0,
        solar_irradiance_wm2: None,
    }
}

fn ist() -> FixedOffset {
    FixedOffset::east_opt(330 * 60).unwrap()
}

/// 12:00 local time.
fn local_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 21, 6, 30, 0).unwrap()
}

/// 00:00 local time.
fn local_midnight() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 21, 18, 30, 0).unwrap()
}

fn building(id: &str, capacity_kw: f64) -> Building {
    Building {
        id: id.to_string(),
        name: format!("Building {id}"),
        city: "Chennai".to_string(),
        capacity_kw,
        actual_kw: 0.0,
        expected_kw: 0.0,
        last_updated: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        coords: None,
    }
}

async fn seeded(buildings: &[Building]) -> Repositories {
    let repos = Repositories::in_memory();
    for b in buildings {
        repos.buildings.upsert(b).await.unwrap();
    }
    repos
}

fn orchestrator(
    repos: Repositories,
    weather: Option<WeatherSnapshot>,
    predictor: OutputPredictor,
) -> (AnalysisOrchestrator, Arc<AlertEngine>) {
    let alerts = Arc::new(AlertEngine::new());
    let orchestrator = AnalysisOrchestrator::new(
        Arc::new(FixedWeather(weather)),
        Arc::new(predictor),
        PowerSimulator::new(ist()),
        alerts.clone(),
        repos,
        AnalysisSettings { history_limit: 50, max_concurrency: 2 },
    );
    (orchestrator, alerts)
}

#[tokio::test]
async fn invalid_building_is_reported_without_aborting_batch() {
    let repos = seeded(&[building("a", 1000.0), building("broken", 0.0), building("c", 800.0)]).await;
    let (orchestrator, _) = orchestrator(repos.clone(), Some(clear_noon()), OutputPredictor::physical());

    let report = orchestrator.run_batch_at(local_noon()).await.unwrap();

    assert!(report.success);
    assert_eq!(report.total_buildings, 3);
    assert_eq!(report.processed_buildings, 2);

    let failed: Vec<_> = report
        .results
        .iter()
        .filter_map(|r| match r {
            BuildingOutcome::Failed(f) => Some(f),
            BuildingOutcome::Analyzed(_) => None,
        })
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].building_id, "broken");
    assert!(failed[0].error.contains("capacity"));

    // the failed building is left untouched
    let broken = repos.buildings.get("broken").await.unwrap().unwrap();
    assert_eq!(broken.last_updated, building("broken", 0.0).last_updated);
    assert!(repos.history.recent("broken", 50).await.unwrap().is_empty());
}

#[tokio::test]
async fn analyzed_buildings_are_persisted() {
    let repos = seeded(&[building("a", 1000.0)]).await;
    let (orchestrator, _) = orchestrator(repos.clone(), Some(clear_noon()), OutputPredictor::physical());

    let report = orchestrator.run_batch_at(local_noon()).await.unwrap();
    let BuildingOutcome::Analyzed(result) = &report.results[0] else {
        panic!("building should have been analyzed");
    };

    assert!((result.predicted_kw - 347.508).abs() < 1e-6);
    assert_eq!(result.prediction_source, PredictionSource::Physical);
    assert!(result.weather_available);
    assert!(result.actual_kw > 0.0);
    assert_eq!(result.simulation_factors.base_generation_kw, 1000.0);

    let stored = repos.buildings.get("a").await.unwrap().unwrap();
    assert_eq!(stored.last_updated, local_noon());
    assert_eq!(stored.actual_kw, result.actual_kw);
    assert_eq!(stored.expected_kw, result.predicted_kw);
    assert_eq!(stored.status(), result.status);

    let history = repos.history.recent("a", 50).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].predicted_kw, result.predicted_kw);
    assert_eq!(history[0].weather, clear_noon());
}

#[tokio::test]
async fn night_shortfall_alerts_once_per_window() {
    let repos = seeded(&[building("a", 1000.0), building("b", 1000.0)]).await;
    let (orchestrator, alerts) = orchestrator(repos.clone(), Some(clear_noon()), OutputPredictor::physical());

    // the curve is zero at midnight while the weather model still expects output
    let first = orchestrator.run_batch_at(local_midnight()).await.unwrap();
    for result in &first.results {
        let BuildingOutcome::Analyzed(a) = result else { panic!("unexpected failure") };
        assert_eq!(a.actual_kw, 0.0);
        assert_eq!(a.alert.as_ref().map(|s| s.severity), Some(Severity::Critical));
    }
    assert_eq!(first.alert_stats.critical, 2);

    let second = orchestrator
        .run_batch_at(local_midnight() + Duration::minutes(15))
        .await
        .unwrap();
    for result in &second.results {
        let BuildingOutcome::Analyzed(a) = result else { panic!("unexpected failure") };
        assert!(a.alert.is_none());
    }

    assert_eq!(alerts.len(), 2);
    let stored = repos.alerts.query(&AlertFilter::default(), 100).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(second.alert_stats, alerts.stats());
}

#[tokio::test]
async fn missing_weather_falls_back() {
    let repos = seeded(&[building("a", 1000.0)]).await;
    let (orchestrator, _) = orchestrator(repos, None, OutputPredictor::physical());

    let report = orchestrator.run_batch_at(local_noon()).await.unwrap();
    let BuildingOutcome::Analyzed(result) = &report.results[0] else {
        panic!("building should have been analyzed");
    };
    assert!(!result.weather_available);
    assert_eq!(result.weather, WeatherSnapshot::fallback());
    assert_eq!(result.simulation_factors.weather_impact, 0.8);
}

#[tokio::test]
async fn external_estimate_is_blended() {
    let repos = seeded(&[building("a", 1000.0)]).await;
    let predictor = OutputPredictor::with_inference(Arc::new(FixedEstimate(900.0)), std::time::Duration::from_secs(1));
    let (orchestrator, _) = orchestrator(repos, Some(clear_noon()), predictor);

    let report = orchestrator.run_batch_at(local_noon()).await.unwrap();
    let BuildingOutcome::Analyzed(result) = &report.results[0] else {
        panic!("building should have been analyzed");
    };
    assert_eq!(result.prediction_source, PredictionSource::Blended);
    assert!((result.predicted_kw - (0.7 * 900.0 + 0.3 * 347.508)).abs() < 1e-6);
}

#[tokio::test]
async fn storage_failure_fails_the_batch() {
    let store = Arc::new(MemoryStore::default());
    let mut repos = Repositories::from_store(store);
    repos.buildings.upsert(&building("a", 1000.0)).await.unwrap();
    repos.history = Arc::new(BrokenHistory);

    let (orchestrator, _) = orchestrator(repos, Some(clear_noon()), OutputPredictor::physical());
    let err = orchestrator.run_batch_at(local_noon()).await.unwrap_err();
    assert!(matches!(err, AnalysisError::Storage(_)));
    assert!(err.to_string().contains("history table unavailable"));
}

#[tokio::test]
async fn unstored_alert_is_raised_again_next_batch() {
    let mut repos = seeded(&[building("a", 1000.0)]).await;
    let flaky = Arc::new(FlakyAlerts {
        inner: MemoryStore::default(),
        failed_once: AtomicBool::new(false),
    });
    repos.alerts = flaky.clone();
    let (orchestrator, alerts) = orchestrator(repos, Some(clear_noon()), OutputPredictor::physical());

    let err = orchestrator.run_batch_at(local_midnight()).await.unwrap_err();
    assert!(matches!(err, AnalysisError::Storage(_)));
    assert!(alerts.is_empty());

    let retry = orchestrator
        .run_batch_at(local_midnight() + Duration::minutes(15))
        .await
        .unwrap();
    let BuildingOutcome::Analyzed(a) = &retry.results[0] else {
        panic!("building should have been analyzed");
    };
    let raised = a.alert.as_ref().expect("alert should be raised on retry");
    assert_eq!(raised.severity, Severity::Critical);

    let stored = flaky.query(&AlertFilter::default(), 100).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts.alerts(&AlertFilter::default())[0].id, stored[0].id);
}
