//! Deterministic per-building equipment model.
//!
//! Values are drawn from a `StdRng` seeded with a hash of the building id, so
//! the same building always reports the same hardware condition. Maintenance
//! additionally folds a coarse time bucket into the seed and drifts slowly.

use chrono::{DateTime, Duration, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::domain::EquipmentStatus;

/// Width of one maintenance bucket.
pub const MAINTENANCE_EPOCH_HOURS: i64 = 3;

/// 32-bit rolling string hash (`h * 31 + c` over UTF-16 units), made non-negative.
pub fn hash_code(s: &str) -> u64 {
    let mut hash: i32 = 0;
    for unit in s.encode_utf16() {
        hash = hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(unit as i32);
    }
    u64::from(hash.unsigned_abs())
}

fn rng_for(key: &str) -> StdRng {
    StdRng::seed_from_u64(hash_code(key))
}

pub fn equipment_status(building_id: &str) -> EquipmentStatus {
    let mut rng = rng_for(building_id);
    EquipmentStatus {
        inverter_efficiency: rng.gen_range(0.92..0.98),
        panel_degradation: rng.gen_range(0.95..0.99),
        soiling: rng.gen_range(0.85..0.95),
        shading: rng.gen_range(0.90..0.98),
    }
}

/// Index of the maintenance bucket containing `at`.
pub fn maintenance_bucket(at: DateTime<Utc>, epoch: Duration) -> i64 {
    let width = epoch.num_milliseconds().max(1);
    at.timestamp_millis().div_euclid(width)
}

pub fn maintenance_status(building_id: &str, at: DateTime<Utc>, epoch: Duration) -> f64 {
    let key = format!("{}{}", building_id, maintenance_bucket(at, epoch));
    rng_for(&key).gen_range(0.90..0.99)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn epoch() -> Duration {
        Duration::hours(MAINTENANCE_EPOCH_HOURS)
    }

    #[test]
    fn test_hash_code_matches_rolling_hash() {
        assert_eq!(hash_code(""), 0);
        assert_eq!(hash_code("a"), 97);
        assert_eq!(hash_code("ab"), 97 * 31 + 98);
        // overflow wraps instead of panicking
        let long = "x".repeat(64);
        assert_eq!(hash_code(&long), hash_code(&long));
    }

    #[test]
    fn test_equipment_status_is_deterministic_and_in_range() {
        let a = equipment_status("bld-ch-01");
        let b = equipment_status("bld-ch-01");
        assert_eq!(a, b);

        assert!((0.92..0.98).contains(&a.inverter_efficiency));
        assert!((0.95..0.99).contains(&a.panel_degradation));
        assert!((0.85..0.95).contains(&a.soiling));
        assert!((0.90..0.98).contains(&a.shading));
    }

    #[test]
    fn test_buildings_get_different_equipment() {
        assert_ne!(equipment_status("bld-ch-01"), equipment_status("bld-tri-01"));
    }

    #[test]
    fn test_maintenance_stable_within_bucket() {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 21, 9, 0, 0).unwrap();
        let t1 = t0 + Duration::minutes(30);
        assert_eq!(maintenance_bucket(t0, epoch()), maintenance_bucket(t1, epoch()));
        assert_eq!(
            maintenance_status("bld-ka-01", t0, epoch()),
            maintenance_status("bld-ka-01", t1, epoch())
        );

        let value = maintenance_status("bld-ka-01", t0, epoch());
        assert!((0.90..0.99).contains(&value));
    }

    #[test]
    fn test_maintenance_bucket_advances() {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 21, 9, 0, 0).unwrap();
        let later = t0 + Duration::hours(MAINTENANCE_EPOCH_HOURS);
        assert_eq!(maintenance_bucket(later, epoch()), maintenance_bucket(t0, epoch()) + 1);
    }
}
