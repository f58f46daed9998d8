//! UAT (978 MHz) normalizer, fed from `dump978`/`uat2json`-style records.

use super::{get_f64, get_i64, get_str};
use crate::model::*;
use chrono::Utc;
use dragonsync_common::{feet_to_meters, fpm_to_mps, knots_to_mps};
use serde_json::Value;

/// UAT emitter category (0-19) -> human ua_type name.
pub const UAT_EMITTER_TO_UA_TYPE: [&str; 20] = [
    "No aircraft type information",
    "Light",
    "Small",
    "Large",
    "High Vortex Large",
    "Heavy",
    "High Performance",
    "Rotorcraft",
    "Reserved",
    "Glider/Sailplane",
    "Lighter-than-Air",
    "Parachutist/Skydiver",
    "Ultralight/Hang-glider/Paraglider",
    "Reserved",
    "Unmanned Aerial Vehicle",
    "Space/Trans-atmospheric",
    "Reserved",
    "Surface Vehicle - Emergency",
    "Surface Vehicle - Service",
    "Point Obstacle",
];

fn emitter_name(code: u8) -> Option<&'static str> {
    UAT_EMITTER_TO_UA_TYPE.get(code as usize).copied()
}

fn altitude_feet(v: &Value, key: &str) -> Option<(f64, bool)> {
    match v.get(key) {
        Some(Value::String(s)) if s == "ground" => Some((0.0, true)),
        Some(other) => other.as_f64().map(|alt| (alt, false)),
        None => None,
    }
}

/// `normalize(raw) -> Option<Observation>`. Requires `address`.
pub fn normalize(raw: &Value, seen_by: Option<String>) -> Option<Observation> {
    let address = get_str(raw, "address")?;
    let uid = address.to_uppercase();

    let lat = get_f64(raw, "lat")?;
    let lon = get_f64(raw, "lon")?;

    let (alt_ft, on_ground) = altitude_feet(raw, "alt_geom")
        .or_else(|| altitude_feet(raw, "alt"))
        .unwrap_or((0.0, false));

    let gs = get_f64(raw, "gs").map(knots_to_mps);
    let vs = get_f64(raw, "vert_rate").map(fpm_to_mps);

    let emitter = get_i64(raw, "emitter_category").and_then(|v| u8::try_from(v).ok());
    let ua_type_name = emitter.and_then(emitter_name).map(str::to_string);

    Some(Observation {
        kind: ObservationKind::AircraftUat,
        uid: Some(uid),
        position: Position { lat, lon, alt_m: feet_to_meters(alt_ft) },
        kinematics: Kinematics {
            ground_speed_mps: gs,
            vertical_speed_mps: vs,
            course_deg: get_f64(raw, "track").or_else(|| get_f64(raw, "nav_heading")),
            on_ground: Some(on_ground),
        },
        identity: Identity {
            mac: Some(address.to_uppercase()),
            callsign: get_str(raw, "callsign").map(|s| s.trim().to_string()),
            alt_id: get_str(raw, "squawk"),
            description: None,
            ua_type_code: emitter,
            ua_type_name: ua_type_name.map(|n| format!("Aircraft - {n}")),
            category: get_str(raw, "emitter_category").or_else(|| emitter.map(|e| e.to_string())),
            id_type: Some("UAT Address".into()),
            op_status: None,
            height_type: None,
            ew_dir: None,
            operator_id: None,
            caa_id: None,
            timestamp: None,
        },
        quality: Quality {
            rssi_dbm: get_f64(raw, "rssi").map(|v| v.clamp(-100.0, 0.0) as i32),
            horizontal_accuracy_m: None,
            vertical_accuracy_m: None,
            nic: get_i64(raw, "nic").map(|v| v as u8),
            nac_p: get_i64(raw, "nac_p").map(|v| v as u8),
            nac_v: get_i64(raw, "sil").map(|v| v as u8),
        },
        auxiliary: Auxiliary {
            pilot_position: None,
            home_position: None,
            frequency_hz: None,
            bandwidth_hz: None,
        },
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
    fn uid_is_uppercased_address() {
        let raw = json!({"address":"a1b2c3","lat":1.0,"lon":2.0,"alt":5000.0});
        let obs = normalize(&raw, None).expect("should normalize");
        assert_eq!(obs.uid.as_deref(), Some("A1B2C3"));
    }

    #[test]
    fn emitter_category_maps_to_name() {
        let raw = json!({"address":"A1","lat":1.0,"lon":2.0,"emitter_category":14});
        let obs = normalize(&raw, None).expect("should normalize");
        assert_eq!(
            obs.identity.ua_type_name.as_deref(),
            Some("Aircraft - Unmanned Aerial Vehicle")
        );
    }

    #[test]
    fn ground_string_altitude_handled() {
        let raw = json!({"address":"A1","lat":1.0,"lon":2.0,"alt":"ground"});
        let obs = normalize(&raw, None).expect("should normalize");
        assert_eq!(obs.position.alt_m, 0.0);
        assert_eq!(obs.kinematics.on_ground, Some(true));
    }

    #[test]
    fn missing_address_is_rejected() {
        let raw = json!({"lat":1.0,"lon":2.0});
        assert!(normalize(&raw, None).is_none());
    }

    #[test]
    fn missing_position_is_rejected() {
        let raw = json!({"address":"A1"});
        assert!(normalize(&raw, None).is_none());
    }
}
