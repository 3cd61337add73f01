//! # Solar Output Simulation
//!
//! Produces a plausible "measured" output for a building from its nameplate
//! capacity, the hour of day and current weather, modelling the losses a real
//! installation sees: weather, equipment condition, maintenance state and
//! measurement noise.

use chrono::{DateTime, Duration, FixedOffset, Offset, Timelike, Utc};
use rand::Rng;

use super::equipment::{self, MAINTENANCE_EPOCH_HOURS};
use crate::domain::{SimulationFactors, SimulationResult, WeatherSnapshot};

/// First and last hour with any generation.
pub const DAYLIGHT_START_HOUR: f64 = 6.0;
pub const DAYLIGHT_END_HOUR: f64 = 18.0;
const PEAK_HOUR: f64 = 12.0;
/// Hours of significant generation; the bell's sigma is `WIDTH / 2.5`.
const CURVE_WIDTH_HOURS: f64 = 6.0;

/// Weather multiplier used when no weather is known at all.
pub const NEUTRAL_WEATHER_IMPACT: f64 = 0.8;
pub const MIN_WEATHER_IMPACT: f64 = 0.1;
pub const MAX_WEATHER_IMPACT: f64 = 1.05;

/// Daylight generation curve in kW: zero outside 06..=18, `capacity` at noon.
pub fn solar_curve(hour: f64, capacity_kw: f64) -> f64 {
    if !(DAYLIGHT_START_HOUR..=DAYLIGHT_END_HOUR).contains(&hour) {
        return 0.0;
    }
    let sigma = CURVE_WIDTH_HOURS / 2.5;
    let curve = (-(hour - PEAK_HOUR).powi(2) / (2.0 * sigma.powi(2))).exp();
    capacity_kw * curve
}

/// Loss above 25 °C at 0.4 %/°C, never below `floor`.
pub fn temperature_derate(temperature_c: f64, floor: f64) -> f64 {
    if temperature_c <= 25.0 {
        return 1.0;
    }
    (1.0 - (temperature_c - 25.0) * 0.004).max(floor)
}

/// 0 % clouds lose nothing, 100 % lose 80 %.
pub fn cloud_derate(cloud_cover_percent: f64) -> f64 {
    (1.0 - (cloud_cover_percent / 100.0) * 0.8).max(0.2)
}

/// Up to 15 % loss as humidity climbs from 60 % to 100 %.
pub fn humidity_derate(humidity_percent: f64) -> f64 {
    if humidity_percent <= 60.0 {
        return 1.0;
    }
    (1.0 - ((humidity_percent - 60.0) / 100.0) * 0.15).max(0.85)
}

/// Combined weather multiplier, always within [0.1, 1.05].
pub fn weather_impact(weather: Option<&WeatherSnapshot>) -> f64 {
    let Some(w) = weather else {
        return NEUTRAL_WEATHER_IMPACT;
    };

    let mut impact = 1.0;
    impact *= temperature_derate(w.temperature_c, 0.7);
    impact *= cloud_derate(w.cloud_cover_percent);
    impact *= humidity_derate(w.humidity_percent);
    // wind cools the panels
    impact *= (1.0 + w.wind_speed_ms * 0.01).min(1.05);

    if impact.is_nan() {
        return NEUTRAL_WEATHER_IMPACT;
    }
    impact.clamp(MIN_WEATHER_IMPACT, MAX_WEATHER_IMPACT)
}

/// Simulates measured output for buildings.
#[derive(Debug, Clone)]
pub struct PowerSimulator {
    utc_offset: FixedOffset,
    maintenance_epoch: Duration,
}

impl Default for PowerSimulator {
    fn default() -> Self {
        Self::new(Utc.fix())
    }
}

impl PowerSimulator {
    /// `utc_offset` is the fleet's local time, used to pick the solar hour.
    pub fn new(utc_offset: FixedOffset) -> Self {
        Self {
            utc_offset,
            maintenance_epoch: Duration::hours(MAINTENANCE_EPOCH_HOURS),
        }
    }

    pub fn local_hour(&self, at: DateTime<Utc>) -> f64 {
        f64::from(at.with_timezone(&self.utc_offset).hour())
    }

    /// Simulate with fresh measurement noise.
    pub fn simulate(
        &self,
        building_id: &str,
        capacity_kw: f64,
        weather: Option<&WeatherSnapshot>,
        at: DateTime<Utc>,
    ) -> SimulationResult {
        self.simulate_with_rng(building_id, capacity_kw, weather, at, &mut rand::thread_rng())
    }

    pub fn simulate_with_rng<R: Rng + ?Sized>(
        &self,
        building_id: &str,
        capacity_kw: f64,
        weather: Option<&WeatherSnapshot>,
        at: DateTime<Utc>,
        rng: &mut R,
    ) -> SimulationResult {
        let base_generation_kw = solar_curve(self.local_hour(at), capacity_kw);
        let weather_impact = weather_impact(weather);
        let equipment_status = equipment::equipment_status(building_id);
        let equipment_efficiency = equipment_status.efficiency();
        let maintenance_status =
            equipment::maintenance_status(building_id, at, self.maintenance_epoch);
        let random_variation = rng.gen_range(0.95..=1.05);

        let actual_kw = (base_generation_kw
            * weather_impact
            * equipment_efficiency
            * maintenance_status
            * random_variation)
            .max(0.0);

        SimulationResult {
            building_id: building_id.to_string(),
            timestamp: at,
            actual_kw,
            factors: SimulationFactors {
                base_generation_kw,
                weather_impact,
                equipment_efficiency,
                maintenance_status,
                random_variation,
            },
            equipment_status,
        }
    }
}
