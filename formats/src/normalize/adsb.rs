//! ADS-B (`dump1090`/`readsb` `aircraft.json`) normalizer.

use super::{get_f64, get_i64, get_str};
use crate::model::*;
use chrono::Utc;
use dragonsync_common::{feet_to_meters, fpm_to_mps, knots_to_mps};
use serde_json::Value;

/// ICAO emitter category -> (ua_type code, subtype name). Categories not
/// present here default to `(1, "Aircraft - Unknown Type")`.
pub fn category_to_ua_type(category: &str) -> (u8, &'static str) {
    match category {
        "A1" => (1, "Light"),
        "A2" => (1, "Small"),
        "A3" => (1, "Large"),
        "A4" => (1, "High Vortex Large"),
        "A5" => (1, "Heavy"),
        "A6" => (2, "Rotorcraft"),
        "A7" => (1, "High Performance"),
        "B1" => (6, "Glider/Sailplane"),
        "B2" => (8, "Lighter-than-Air"),
        "B3" => (14, "Parachutist/Skydiver"),
        "B4" => (11, "Ultralight/Hang-glider/Paraglider"),
        "B6" => (12, "Unmanned Aerial Vehicle"),
        "B7" => (13, "Space/Trans-atmospheric"),
        "C1" => (14, "Surface Vehicle - Emergency"),
        "C2" => (14, "Surface Vehicle - Service"),
        "C3" => (14, "Point Obstacle"),
        "C4" => (14, "Cluster Obstacle"),
        "C5" => (14, "Line Obstacle"),
        _ => (1, "Aircraft - Unknown Type"),
    }
}

fn altitude_feet(v: &Value, key: &str) -> Option<(f64, bool)> {
    match v.get(key) {
        Some(Value::String(s)) if s == "ground" => Some((0.0, true)),
        Some(other) => other.as_f64().map(|alt| (alt, false)),
        None => None,
    }
}

/// `normalize(raw) -> Option<Observation>`. Requires `hex`.
pub fn normalize(raw: &Value, seen_by: Option<String>) -> Option<Observation> {
    let hex = get_str(raw, "hex")?;
    let uid = format!("adsb-{}", hex.to_lowercase());

    let lat = get_f64(raw, "lat");
    let lon = get_f64(raw, "lon");
    let (lat, lon) = (lat?, lon?);

    let (alt_ft, on_ground) = altitude_feet(raw, "alt_geom")
        .or_else(|| altitude_feet(raw, "alt_baro"))
        .unwrap_or((0.0, false));

    let gs = get_f64(raw, "gs").map(knots_to_mps);
    let vs = get_f64(raw, "geom_rate")
        .or_else(|| get_f64(raw, "baro_rate"))
        .map(fpm_to_mps);

    let rssi = get_f64(raw, "rssi")
        .map(|v| v.clamp(-100.0, 0.0) as i32)
        .unwrap_or(-50);

    let category = get_str(raw, "category");
    let (ua_type_code, ua_type_name) = category
        .as_deref()
        .map(category_to_ua_type)
        .unwrap_or((1, "Aircraft - Unknown Type"));

    Some(Observation {
        kind: ObservationKind::AircraftAdsb,
        uid: Some(uid),
        position: Position { lat, lon, alt_m: feet_to_meters(alt_ft) },
        kinematics: Kinematics {
            ground_speed_mps: gs,
            vertical_speed_mps: vs,
            course_deg: get_f64(raw, "track"),
            on_ground: Some(on_ground),
        },
        identity: Identity {
            mac: Some(hex.to_uppercase()),
            callsign: get_str(raw, "flight").map(|s| s.trim().to_string()),
            alt_id: get_str(raw, "squawk"),
            description: None,
            ua_type_code: Some(ua_type_code),
            ua_type_name: Some(format!("Aircraft - {ua_type_name}")),
            category,
            id_type: Some("ICAO Address".into()),
            op_status: None,
            height_type: None,
            ew_dir: None,
            operator_id: None,
            caa_id: get_str(raw, "r"),
            timestamp: None,
        },
        quality: Quality {
            rssi_dbm: Some(rssi),
            horizontal_accuracy_m: None,
            vertical_accuracy_m: None,
            nic: get_i64(raw, "nic").map(|v| v as u8),
            nac_p: get_i64(raw, "nac_p").map(|v| v as u8),
            nac_v: get_i64(raw, "nac_v").map(|v| v as u8),
        },
        auxiliary: Auxiliary::default(),
        observed_at: Utc::now(),
        seen_by,
        partial: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_units_and_derives_uid() {
        let raw = json!({"hex":"A12345","lat":40.0,"lon":-74.0,"alt_geom":1000.0,"gs":250.0,"track":90.0});
        let obs = normalize(&raw, None).expect("should normalize");
        assert_eq!(obs.uid.as_deref(), Some("adsb-a12345"));
        assert!((obs.position.alt_m - 304.8).abs() < 1e-6);
        assert!((obs.kinematics.ground_speed_mps.unwrap() - 128.611).abs() < 1e-3);
        assert_eq!(obs.kinematics.course_deg, Some(90.0));
    }

    #[test]
    fn ground_string_altitude_is_zero_and_on_ground() {
        let raw = json!({"hex":"A12345","lat":40.0,"lon":-74.0,"alt_geom":"ground"});
        let obs = normalize(&raw, None).expect("should normalize");
        assert_eq!(obs.position.alt_m, 0.0);
        assert_eq!(obs.kinematics.on_ground, Some(true));
    }

    #[test]
    fn missing_lat_lon_is_rejected() {
        let raw = json!({"hex":"A12345"});
        assert!(normalize(&raw, None).is_none());
    }

    #[test]
    fn missing_hex_is_rejected() {
        let raw = json!({"lat": 1.0, "lon": 2.0});
        assert!(normalize(&raw, None).is_none());
    }

    #[test]
    fn rssi_defaults_and_clamps() {
        let raw = json!({"hex":"A1","lat":1.0,"lon":2.0,"rssi":-200.0});
        let obs = normalize(&raw, None).unwrap();
        assert_eq!(obs.quality.rssi_dbm, Some(-100));

        let raw = json!({"hex":"A1","lat":1.0,"lon":2.0});
        let obs = normalize(&raw, None).unwrap();
        assert_eq!(obs.quality.rssi_dbm, Some(-50));
    }
}
