use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health tier shown on the dashboard for a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BuildingStatus {
    Ok,
    Warn,
    Critical,
}

impl BuildingStatus {
    /// Critical below 70% of expected output, warn below 80%.
    pub fn from_output(actual_kw: f64, expected_kw: f64) -> Self {
        if actual_kw < expected_kw * 0.7 {
            BuildingStatus::Critical
        } else if actual_kw < expected_kw * 0.8 {
            BuildingStatus::Warn
        } else {
            BuildingStatus::Ok
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A monitored installation.
///
/// Efficiency and status are derived from the stored outputs and are never
/// persisted on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: String,
    pub name: String,
    pub city: String,
    pub capacity_kw: f64,
    pub actual_kw: f64,
    pub expected_kw: f64,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<GeoPoint>,
}

impl Building {
    pub fn efficiency(&self) -> f64 {
        if self.capacity_kw > 0.0 {
            self.actual_kw / self.capacity_kw
        } else {
            0.0
        }
    }

    pub fn status(&self) -> BuildingStatus {
        BuildingStatus::from_output(self.actual_kw, self.expected_kw)
    }

    /// Record the outcome of one analysis cycle.
    pub fn record_cycle(&mut self, actual_kw: f64, expected_kw: f64, at: DateTime<Utc>) {
        self.actual_kw = actual_kw;
        self.expected_kw = expected_kw;
        self.last_updated = at;
    }

    pub fn view(&self) -> BuildingView {
        BuildingView {
            efficiency: self.efficiency(),
            status: self.status(),
            building: self.clone(),
        }
    }
}

/// Building as served to clients, with the derived fields attached.
#[derive(Debug, Clone, Serialize)]
pub struct BuildingView {
    #[serde(flatten)]
    pub building: Building,
    pub efficiency: f64,
    pub status: BuildingStatus,
}

/// Fleet-wide KPIs for the dashboard header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetSummary {
    pub building_count: usize,
    pub total_actual_kw: f64,
    pub total_expected_kw: f64,
    pub average_efficiency: f64,
    pub critical_count: usize,
}

impl FleetSummary {
    pub fn from_buildings(buildings: &[Building]) -> Self {
        let total_actual_kw = buildings.iter().map(|b| b.actual_kw).sum();
        let total_expected_kw = buildings.iter().map(|b| b.expected_kw).sum();
        let average_efficiency = if buildings.is_empty() {
            0.0
        } else {
            buildings.iter().map(Building::efficiency).sum::<f64>() / buildings.len() as f64
        };
        Self {
            building_count: buildings.len(),
            total_actual_kw,
            total_expected_kw,
            average_efficiency,
            critical_count: buildings
                .iter()
                .filter(|b| b.status() == BuildingStatus::Critical)
                .count(),
        }
    }
}

/// Starting fleet, inserted into an empty store.
pub fn seed_buildings(now: DateTime<Utc>) -> Vec<Building> {
    let seed = |id: &str, name: &str, city: &str, capacity: f64, expected: f64, actual: f64, lat: f64, lng: f64| {
        Building {
            id: id.to_string(),
            name: name.to_string(),
            city: city.to_string(),
            capacity_kw: capacity,
            actual_kw: actual,
            expected_kw: expected,
            last_updated: now,
            coords: Some(GeoPoint { lat, lng }),
        }
    };

    vec![
        seed("bld-ch-01", "CH-A", "Chennai", 1200.0, 860.0, 712.0, 13.0827, 80.2707),
        seed("bld-th-01", "Th-A", "Thiruvallur", 980.0, 730.0, 710.0, 13.6288, 79.8878),
        seed("bld-ka-01", "ABC Block", "Kancheepuram", 1050.0, 800.0, 590.0, 12.8185, 79.7037),
        seed("bld-che-01", "Lakeshore Campus", "Chengalpet", 1100.0, 810.0, 725.0, 12.6819, 79.9864),
        seed("bld-tri-01", "Trinity Park Hub", "Trichy", 900.0, 670.0, 510.0, 10.7905, 78.7047),
    ]
}
