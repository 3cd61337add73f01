//! # Power Simulation
//!
//! Stands in for metered output on each building:
//!
//! - **Solar**: daylight curve, weather multiplier and the final simulated reading
//! - **Equipment**: deterministic per-building hardware and maintenance condition

pub mod equipment;
pub mod solar;

pub use equipment::{equipment_status, maintenance_status};
pub use solar::{solar_curve, weather_impact, PowerSimulator};
