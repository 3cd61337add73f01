pub mod alerts;
pub mod analysis;

use anyhow::Result;
use chrono::{FixedOffset, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::seed_buildings;
use crate::forecast::{ChatCompletionsClient, OpenWeatherMapClient, OutputPredictor, WeatherProvider};
use crate::repo::Repositories;
use crate::simulation::PowerSimulator;

pub use alerts::AlertEngine;
pub use analysis::{
    AnalysisError, AnalysisOrchestrator, AnalysisReport, AnalysisSettings, BuildingAnalysis,
    BuildingFailure, BuildingOutcome,
};

#[derive(Clone)]
pub struct AppState {
    pub auth_token: Arc<str>,
    pub orchestrator: Arc<AnalysisOrchestrator>,
    pub alerts: Arc<AlertEngine>,
    pub repos: Repositories,
    pub weather: Arc<dyn WeatherProvider>,
}

impl AppState {
    /// Wire providers and storage from configuration.
    pub async fn new(cfg: &Config) -> Result<Self> {
        let repos = Repositories::new(cfg).await?;
        if cfg.analysis.seed_buildings {
            repos.seed_buildings_if_empty(seed_buildings(Utc::now())).await?;
        }

        let weather: Arc<dyn WeatherProvider> = Arc::new(OpenWeatherMapClient::new(
            cfg.weather.base_url.clone(),
            cfg.weather.api_key.clone(),
            Duration::from_secs(cfg.weather.http_timeout_seconds.max(1)),
        )?);

        let predictor = match cfg.predictor.api_key.clone().filter(|k| !k.is_empty()) {
            Some(key) if cfg.predictor.enabled => {
                info!(model = %cfg.predictor.model, "external predictor enabled");
                let client = ChatCompletionsClient::new(&cfg.predictor, key)?;
                OutputPredictor::with_inference(Arc::new(client), cfg.predictor.timeout())
            }
            _ => {
                if cfg.predictor.enabled {
                    warn!("predictor enabled without api key, using physical model only");
                }
                OutputPredictor::physical()
            }
        };

        let offset = FixedOffset::east_opt(cfg.analysis.utc_offset_minutes * 60)
            .ok_or_else(|| anyhow::anyhow!("utc_offset_minutes out of range: {}", cfg.analysis.utc_offset_minutes))?;

        Ok(Self::from_parts(
            cfg.auth.token.as_str(),
            weather,
            Arc::new(predictor),
            PowerSimulator::new(offset),
            repos,
            AnalysisSettings {
                history_limit: cfg.analysis.history_limit,
                max_concurrency: cfg.analysis.max_concurrency,
            },
        ))
    }

    /// Assemble state from ready-made collaborators.
    pub fn from_parts(
        auth_token: &str,
        weather: Arc<dyn WeatherProvider>,
        predictor: Arc<OutputPredictor>,
        simulator: PowerSimulator,
        repos: Repositories,
        settings: AnalysisSettings,
    ) -> Self {
        let alerts = Arc::new(AlertEngine::new());
        let orchestrator = Arc::new(AnalysisOrchestrator::new(
            weather.clone(),
            predictor,
            simulator,
            alerts.clone(),
            repos.clone(),
            settings,
        ));
        Self {
            auth_token: Arc::from(auth_token),
            orchestrator,
            alerts,
            repos,
            weather,
        }
    }
}

pub fn spawn_controller_tasks(state: AppState, cfg: &Config) {
    let every_minutes = cfg.analysis.interval_minutes;
    if every_minutes == 0 {
        info!("periodic analysis disabled");
        return;
    }

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        analysis_loop(orchestrator, Duration::from_secs(every_minutes * 60)).await;
    });
}

/// Run a batch every `period`. Failed batches are logged and retried next tick.
pub async fn analysis_loop(orchestrator: Arc<AnalysisOrchestrator>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        match orchestrator.run_batch().await {
            Ok(report) => info!(
                processed = report.processed_buildings,
                total = report.total_buildings,
                "scheduled analysis finished"
            ),
            Err(e) => warn!(error = %e, "scheduled analysis failed"),
        }
    }
}
