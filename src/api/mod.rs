pub mod alerts;
pub mod analysis;
pub mod buildings;
pub mod error;
pub mod health;
pub mod response;
pub mod v1;
pub mod weather;

use axum::{http::StatusCode, Router};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{config::Config, controller::AppState};

pub fn router(state: AppState, cfg: &Config) -> Router {
    let mut router = Router::new().nest("/api/v1", v1::router(state));

    if cfg.server.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
            ]);
        router = router.layer(cors);
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(64 * 1024))
                .layer(request_timeout(cfg)),
        )
        .layer(TraceLayer::new_for_http())
}

/// Requests running past `server.request_timeout_secs` get a 408.
fn request_timeout(cfg: &Config) -> TimeoutLayer {
    TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(cfg.server.request_timeout_secs.max(1)),
    )
}

#[cfg(feature = "metrics")]
pub fn with_metrics(app: Router, state: &AppState) -> Router {
    use axum_prometheus::PrometheusMetricLayer;
    let (layer, handle) = PrometheusMetricLayer::pair();

    let metrics_router = Router::new()
        .route("/metrics", axum::routing::get(move || async move { handle.render() }))
        .route_layer(axum::middleware::from_fn_with_state(
            state.auth_token.clone(),
            crate::auth::require_bearer,
        ));

    app.layer(layer).merge(metrics_router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get};
    use tower::ServiceExt;

    #[tokio::test(start_paused = true)]
    async fn test_slow_request_times_out() {
        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    "done"
                }),
            )
            .layer(request_timeout(&Config::default()));

        let response = app
            .oneshot(Request::builder().uri("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
