//! Alert query and acknowledgement.
//!
//! Reads merge the persisted alerts with the in-process log, so alerts from
//! earlier runs and ones not yet flushed both show up.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;
use validator::Validate;

use super::{error::ApiError, response::CommandResponse};
use crate::controller::AppState;
use crate::domain::{Alert, AlertFilter, AlertStats};
use crate::repo::ALERT_QUERY_LIMIT;

#[derive(Debug, Serialize)]
pub struct AlertsResponse {
    pub success: bool,
    pub alerts: Vec<Alert>,
    pub stats: AlertStats,
}

/// Union by id, the first occurrence wins. Newest first, at most `limit`.
pub fn merge_alerts(primary: Vec<Alert>, secondary: Vec<Alert>, limit: usize) -> Vec<Alert> {
    let mut seen = HashSet::new();
    let mut merged: Vec<Alert> = primary
        .into_iter()
        .chain(secondary)
        .filter(|a| seen.insert(a.id.clone()))
        .collect();
    merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    merged.truncate(limit);
    merged
}

pub async fn list_alerts(
    State(st): State<AppState>,
    Query(filter): Query<AlertFilter>,
) -> Result<Json<AlertsResponse>, ApiError> {
    let stored = st.repos.alerts.query(&filter, ALERT_QUERY_LIMIT).await?;
    let alerts = merge_alerts(stored, st.alerts.alerts(&filter), ALERT_QUERY_LIMIT);
    Ok(Json(AlertsResponse {
        success: true,
        stats: st.alerts.stats(),
        alerts,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AlertCommand {
    #[validate(length(min = 1, max = 128))]
    pub alert_id: String,
    #[validate(length(min = 1))]
    pub action: String,
}

pub async fn update_alert(
    State(st): State<AppState>,
    Json(cmd): Json<AlertCommand>,
) -> Result<Json<CommandResponse>, ApiError> {
    cmd.validate()?;
    if cmd.action != "acknowledge" {
        return Err(ApiError::BadRequest(format!("unsupported action: {}", cmd.action)));
    }

    let now = Utc::now();
    let in_memory = st.alerts.acknowledge_at(&cmd.alert_id, now);
    let stored = st.repos.alerts.acknowledge(&cmd.alert_id, now).await?;

    if in_memory || stored {
        info!(alert_id = %cmd.alert_id, in_memory, stored, "alert acknowledged");
        Ok(Json(CommandResponse::new(true, "Alert acknowledged")))
    } else {
        Ok(Json(CommandResponse::new(false, "Alert not found")))
    }
}
