//! Building listing, detail, history and fleet summary.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{error::ApiError, response::ApiResponse};
use crate::controller::AppState;
use crate::domain::{BuildingStatus, BuildingView, FleetSummary, PowerHistoryRecord};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildingSort {
    #[default]
    Name,
    /// Highest efficiency first.
    Efficiency,
    /// Highest actual output first.
    Actual,
}

#[derive(Debug, Default, Deserialize)]
pub struct BuildingQuery {
    /// Case-insensitive substring of the building name.
    pub query: Option<String>,
    pub status: Option<BuildingStatus>,
    #[serde(default)]
    pub sort: BuildingSort,
}

/// Filter and order a building listing.
pub fn select_buildings(mut views: Vec<BuildingView>, q: &BuildingQuery) -> Vec<BuildingView> {
    if let Some(needle) = q.query.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let needle = needle.to_lowercase();
        views.retain(|v| v.building.name.to_lowercase().contains(&needle));
    }
    if let Some(status) = q.status {
        views.retain(|v| v.status == status);
    }
    match q.sort {
        BuildingSort::Name => views.sort_by(|a, b| a.building.name.cmp(&b.building.name)),
        BuildingSort::Efficiency => views.sort_by(|a, b| b.efficiency.total_cmp(&a.efficiency)),
        BuildingSort::Actual => views.sort_by(|a, b| b.building.actual_kw.total_cmp(&a.building.actual_kw)),
    }
    views
}

pub async fn list_buildings(
    State(st): State<AppState>,
    Query(q): Query<BuildingQuery>,
) -> Result<Json<ApiResponse<Vec<BuildingView>>>, ApiError> {
    let views = st.repos.buildings.list().await?.iter().map(|b| b.view()).collect();
    let selected = select_buildings(views, &q);
    let count = selected.len();
    Ok(Json(ApiResponse::success(selected).with_count(count)))
}

pub async fn get_building(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<BuildingView>>, ApiError> {
    let building = st
        .repos
        .buildings
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("building {id}")))?;
    Ok(Json(ApiResponse::success(building.view())))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub async fn get_history(
    State(st): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<PowerHistoryRecord>>>, ApiError> {
    if st.repos.buildings.get(&id).await?.is_none() {
        return Err(ApiError::NotFound(format!("building {id}")));
    }
    let limit = q.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);
    let records = st.repos.history.recent(&id, limit).await?;
    let count = records.len();
    Ok(Json(ApiResponse::success(records).with_count(count)))
}

pub async fn get_summary(State(st): State<AppState>) -> Result<Json<ApiResponse<FleetSummary>>, ApiError> {
    let buildings = st.repos.buildings.list().await?;
    Ok(Json(ApiResponse::success(FleetSummary::from_buildings(&buildings))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::seed_buildings;
    use chrono::Utc;

    fn fleet() -> Vec<BuildingView> {
        seed_buildings(Utc::now()).iter().map(|b| b.view()).collect()
    }

    #[test]
    fn test_query_is_case_insensitive() {
        let q = BuildingQuery { query: Some("  lakeSHORE ".to_string()), ..Default::default() };
        let selected = select_buildings(fleet(), &q);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].building.name, "Lakeshore Campus");
    }

    #[test]
    fn test_status_filter() {
        // ABC Block runs at 590/800 and Trinity Park Hub at 510/670, both under 0.8x
        let q = BuildingQuery { status: Some(BuildingStatus::Warn), ..Default::default() };
        let names: Vec<_> = select_buildings(fleet(), &q).into_iter().map(|v| v.building.name).collect();
        assert_eq!(names, ["ABC Block", "Trinity Park Hub"]);
    }

    #[test]
    fn test_sort_orders() {
        let by_name = select_buildings(fleet(), &BuildingQuery::default());
        assert_eq!(by_name[0].building.name, "ABC Block");

        let q = BuildingQuery { sort: BuildingSort::Actual, ..Default::default() };
        let by_actual = select_buildings(fleet(), &q);
        assert_eq!(by_actual[0].building.name, "Lakeshore Campus");

        let q = BuildingQuery { sort: BuildingSort::Efficiency, ..Default::default() };
        let by_eff = select_buildings(fleet(), &q);
        assert!(by_eff.windows(2).all(|w| w[0].efficiency >= w[1].efficiency));
    }
}
