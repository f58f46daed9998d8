//! Unit conversions and the two geometric derivations used throughout the
//! normalizers and sources: great-circle bearing (course fallback) and the
//! deterministic pseudo-random anchor offset used to plot FPV alerts.

use sha1::{Digest, Sha1};

/// 1 foot in meters.
pub const FEET_TO_METERS: f64 = 0.3048;
/// 1 knot in meters/second.
pub const KNOTS_TO_MPS: f64 = 0.514444;
/// 1 foot/minute in meters/second.
pub const FPM_TO_MPS: f64 = 0.00508;

pub fn feet_to_meters(feet: f64) -> f64 {
    feet * FEET_TO_METERS
}

pub fn knots_to_mps(knots: f64) -> f64 {
    knots * KNOTS_TO_MPS
}

pub fn fpm_to_mps(fpm: f64) -> f64 {
    fpm * FPM_TO_MPS
}

/// Great-circle initial bearing in degrees `[0, 360)` from `(lat1, lon1)`
/// to `(lat2, lon2)`, all in degrees.
pub fn bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let y = delta_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();
    let theta = y.atan2(x).to_degrees();

    (theta + 360.0) % 360.0
}

/// Meters-per-degree of longitude at a given latitude (clamped so a
/// pole doesn't collapse the divisor to zero).
const METERS_PER_DEG_LAT: f64 = 111_320.0;

fn meters_per_deg_lon(lat_deg: f64) -> f64 {
    METERS_PER_DEG_LAT * lat_deg.to_radians().cos().max(1e-6)
}

/// Deterministic pseudo-random (north, east) offset in meters within
/// `radius_m`, derived from the SHA-1 digest of `seed` so the same seed
/// always plots at the same point.
pub fn stable_offset(seed: &str, radius_m: f64) -> (f64, f64) {
    let digest = Sha1::digest(seed.as_bytes());
    let angle = (digest[0] as f64 / 255.0) * std::f64::consts::TAU;
    let distance = (digest[1] as f64 / 255.0) * radius_m;
    let d_north = angle.cos() * distance;
    let d_east = angle.sin() * distance;
    (d_north, d_east)
}

/// Offsets `(lat, lon)` by a deterministic pseudo-random vector within
/// `radius_m`, keyed by `seed`. Used to anchor FPV alerts near the kit's
/// position without ever plotting two distinct alerts on top of each
/// other or the same alert at a different spot on repeat sightings.
pub fn offset_latlon(lat: f64, lon: f64, radius_m: f64, seed: &str) -> (f64, f64) {
    let (d_north, d_east) = stable_offset(seed, radius_m);
    let new_lat = lat + d_north / METERS_PER_DEG_LAT;
    let new_lon = lon + d_east / meters_per_deg_lon(lat);
    (new_lat, new_lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearing_due_east_is_90() {
        let b = bearing_deg(0.0, 0.0, 0.0, 1.0);
        assert!((b - 90.0).abs() < 1e-6);
    }

    #[test]
    fn bearing_due_north_is_0() {
        let b = bearing_deg(0.0, 0.0, 1.0, 0.0);
        assert!(b.abs() < 1e-6 || (b - 360.0).abs() < 1e-6);
    }

    #[test]
    fn bearing_is_normalized_to_0_360() {
        let b = bearing_deg(10.0, 10.0, 9.0, 9.0);
        assert!((0.0..360.0).contains(&b));
    }

    #[test]
    fn offset_is_deterministic_for_same_seed() {
        let a = offset_latlon(34.0, -117.0, 500.0, "fpv-alert-915MHz");
        let b = offset_latlon(34.0, -117.0, 500.0, "fpv-alert-915MHz");
        assert_eq!(a, b);
    }

    #[test]
    fn offset_differs_for_different_seed() {
        let a = offset_latlon(34.0, -117.0, 500.0, "fpv-alert-915MHz");
        let b = offset_latlon(34.0, -117.0, 500.0, "fpv-alert-433MHz");
        assert_ne!(a, b);
    }

    #[test]
    fn offset_stays_within_radius() {
        let (lat, lon) = offset_latlon(34.0, -117.0, 100.0, "seed");
        let dlat = (lat - 34.0) * METERS_PER_DEG_LAT;
        let dlon = (lon - (-117.0)) * meters_per_deg_lon(34.0);
        let dist = (dlat * dlat + dlon * dlon).sqrt();
        assert!(dist <= 100.0 + 1e-6);
    }

    #[test]
    fn unit_conversions() {
        assert!((feet_to_meters(1000.0) - 304.8).abs() < 1e-9);
        assert!((knots_to_mps(250.0) - 128.611).abs() < 1e-3);
    }
}
