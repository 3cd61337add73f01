use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use solar_fleet_monitor::api;
use solar_fleet_monitor::config::Config;
use solar_fleet_monitor::controller::{AnalysisSettings, AppState};
use solar_fleet_monitor::domain::{seed_buildings, WeatherSnapshot};
use solar_fleet_monitor::forecast::{OutputPredictor, WeatherProvider};
use solar_fleet_monitor::repo::Repositories;
use solar_fleet_monitor::simulation::PowerSimulator;

const TOKEN: &str = "test-token";

struct Unavailable;

#[async_trait]
impl WeatherProvider for Unavailable {
    async fn current(&self, _city: &str) -> Option<WeatherSnapshot> {
        None
    }
}

async fn app() -> (Router, AppState) {
    let repos = Repositories::in_memory();
    repos.seed_buildings_if_empty(seed_buildings(Utc::now())).await.unwrap();
    let state = AppState::from_parts(
        TOKEN,
        Arc::new(Unavailable),
        Arc::new(OutputPredictor::physical()),
        PowerSimulator::default(),
        repos,
        AnalysisSettings::default(),
    );
    (api::router(state.clone(), &Config::default()), state)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let (app, _) = app().await;
    let response = app
        .oneshot(Request::builder().uri("/api/v1/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_require_token() {
    let (app, _) = app().await;

    let missing = app
        .clone()
        .oneshot(Request::builder().uri("/api/v1/buildings").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/summary")
                .header(header::AUTHORIZATION, "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn buildings_listing_and_lookup() {
    let (app, _) = app().await;

    let response = app.clone().oneshot(get("/api/v1/buildings?status=warn")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["total_count"], 2);
    assert_eq!(body["data"][0]["status"], "warn");

    let response = app.clone().oneshot(get("/api/v1/buildings/bld-ch-01")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["data"]["name"], "CH-A");

    let response = app.oneshot(get("/api/v1/buildings/unknown")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn summary_covers_fleet() {
    let (app, _) = app().await;
    let body = json_body(app.oneshot(get("/api/v1/summary")).await.unwrap()).await;
    assert_eq!(body["data"]["building_count"], 5);
    assert_eq!(body["data"]["total_actual_kw"], 3247.0);
}

#[tokio::test]
async fn power_analysis_reports_every_building() {
    let (app, _) = app().await;
    let response = app.clone().oneshot(post_json("/api/v1/power-analysis", json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["total_buildings"], 5);
    assert_eq!(body["processed_buildings"], 5);
    assert_eq!(body["results"].as_array().unwrap().len(), 5);
    assert_eq!(body["results"][0]["weather_available"], false);

    let history = json_body(app.oneshot(get("/api/v1/buildings/bld-ch-01/history")).await.unwrap()).await;
    assert_eq!(history["total_count"], 1);
}

#[tokio::test]
async fn acknowledge_flow() {
    let (app, state) = app().await;
    let alert = state.alerts.analyze("bld-ch-01", "CH-A", 100.0, 800.0, None).unwrap();

    let body = json_body(app.clone().oneshot(get("/api/v1/alerts")).await.unwrap()).await;
    assert_eq!(body["alerts"].as_array().unwrap().len(), 1);
    assert_eq!(body["stats"]["critical"], 1);

    let response = app
        .clone()
        .oneshot(post_json("/api/v1/alerts", json!({"alert_id": alert.id, "action": "acknowledge"})))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["success"], true);

    let body = json_body(app.clone().oneshot(get("/api/v1/alerts?acknowledged=false")).await.unwrap()).await;
    assert!(body["alerts"].as_array().unwrap().is_empty());
    assert_eq!(body["stats"]["unacknowledged"], 0);

    let response = app
        .clone()
        .oneshot(post_json("/api/v1/alerts", json!({"alert_id": "alert-missing", "action": "acknowledge"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["success"], false);

    let response = app
        .oneshot(post_json("/api/v1/alerts", json!({"alert_id": alert.id, "action": "delete"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn weather_degrades_to_unavailable() {
    let (app, _) = app().await;
    let body = json_body(app.clone().oneshot(get("/api/v1/weather?city=Chennai")).await.unwrap()).await;
    assert_eq!(body["available"], false);
    assert!(body.get("weather").is_none());

    let response = app.oneshot(get("/api/v1/weather")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
