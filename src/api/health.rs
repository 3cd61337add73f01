use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::time::Instant;

use crate::controller::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
    checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    storage: ComponentHealth,
    alerts: AlertLogHealth,
}

/// Health status of a component
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ComponentHealth {
    fn healthy(latency_ms: u64) -> Self {
        Self {
            status: "healthy",
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    fn unhealthy(error: String) -> Self {
        Self {
            status: "unhealthy",
            latency_ms: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AlertLogHealth {
    logged: usize,
    unacknowledged: usize,
}

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

/// GET /health - storage round trip plus alert log size
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let storage = match state.repos.buildings.list().await {
        Ok(_) => ComponentHealth::healthy(start.elapsed().as_millis() as u64),
        Err(e) => ComponentHealth::unhealthy(format!("{e:#}")),
    };
    let stats = state.alerts.stats();

    let healthy = storage.status == "healthy";
    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" },
        timestamp: chrono::Utc::now(),
        checks: HealthChecks {
            storage,
            alerts: AlertLogHealth {
                logged: stats.total,
                unacknowledged: stats.unacknowledged,
            },
        },
    };

    tracing::debug!(healthy, "health check completed");
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response))
}
