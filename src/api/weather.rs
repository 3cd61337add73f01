//! Current conditions for a fleet city

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use crate::{controller::AppState, domain::WeatherSnapshot};

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    pub city: Option<String>,
}

/// `available: false` with no snapshot when the provider has nothing.
#[derive(Debug, Serialize)]
pub struct WeatherResponse {
    pub city: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherSnapshot>,
}

pub async fn get_weather(
    State(st): State<AppState>,
    Query(q): Query<WeatherQuery>,
) -> Result<Json<WeatherResponse>, ApiError> {
    let city = q
        .city
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("city is required".to_string()))?;

    let weather = st.weather.current(&city).await;
    Ok(Json(WeatherResponse {
        available: weather.is_some(),
        city,
        weather,
    }))
}
