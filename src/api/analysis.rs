use axum::{extract::State, Json};

use super::error::ApiError;
use crate::controller::{AnalysisReport, AppState};

/// POST /power-analysis - run one batch over the whole fleet
pub async fn run_power_analysis(State(st): State<AppState>) -> Result<Json<AnalysisReport>, ApiError> {
    let report = st.orchestrator.run_batch().await?;
    Ok(Json(report))
}
