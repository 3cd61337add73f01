use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use super::{alerts, analysis, buildings, health, weather};
use crate::{auth, controller::AppState};

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/buildings", get(buildings::list_buildings))
        .route("/buildings/:id", get(buildings::get_building))
        .route("/buildings/:id/history", get(buildings::get_history))
        .route("/summary", get(buildings::get_summary))
        .route("/power-analysis", post(analysis::run_power_analysis))
        .route("/alerts", get(alerts::list_alerts).post(alerts::update_alert))
        .route("/weather", get(weather::get_weather))
        .route_layer(middleware::from_fn_with_state(
            state.auth_token.clone(),
            auth::require_bearer,
        ));

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/health", get(health::health_check))
        .merge(protected)
        .with_state(state)
}
