//! Remote-ID (drone) normalizer.

use super::{get_f64, get_i64, get_str, RemoteIdPayload};
use crate::model::*;
use chrono::Utc;
use serde_json::Value;

/// Human-readable name for the 0-15 UA type code.
pub const UA_TYPE_MAPPING: [&str; 16] = [
    "No UA type defined",
    "Aeroplane",
    "Helicopter or Multirotor",
    "Gyroplane",
    "Hybrid Lift (Fixed Wing Aircraft)",
    "Ornithopter",
    "Glider",
    "Kite",
    "Free Balloon",
    "Captive Balloon",
    "Airship",
    "Free Fall/Parachute",
    "Rocket",
    "Tethered Powered Aircraft",
    "Ground Obstacle",
    "Other type",
];

fn ua_type_name(code: u8) -> Option<&'static str> {
    UA_TYPE_MAPPING.get(code as usize).copied()
}

/// `normalize(raw) -> Option<Observation>`.
///
/// `raw` may be a list of message-type fragments or a single flat dict
/// (see [`RemoteIdPayload`]); both are merged into one view before
/// extraction.
pub fn normalize(raw: Value, seen_by: Option<String>) -> Option<Observation> {
    let flat = RemoteIdPayload::from_raw(raw).flatten();

    let id = get_str(&flat, "id");
    let id_type = get_str(&flat, "id_type");
    let mut mac = get_str(&flat, "mac").or_else(|| get_str(&flat, "MAC"));

    let uid = match (id.as_deref(), id_type.as_deref()) {
        (Some(id), Some("Serial Number (ANSI/CTA-2063-A)")) => Some(format!("drone-{id}")),
        (Some(id), _) if id == "drone-alert" => Some(id.to_string()),
        _ => None,
    };

    if uid.is_none() && mac.is_none() {
        // Neither a serial-based uid nor a MAC to fall back to: nothing
        // the registry could admit or merge this observation against.
        return None;
    }

    if let Some(id) = &id {
        if mac.is_none() && id_type.as_deref() == Some("CAA Assigned Registration ID") {
            mac = get_str(&flat, "MAC");
        }
    }

    let lat = get_f64(&flat, "latitude");
    let lon = get_f64(&flat, "longitude");
    let position = match (lat, lon) {
        (Some(lat), Some(lon)) => Position {
            lat,
            lon,
            alt_m: get_f64(&flat, "geodetic_altitude")
                .or_else(|| get_f64(&flat, "height"))
                .unwrap_or(0.0),
        },
        _ => Position::default(),
    };

    let ua_type_code = get_i64(&flat, "ua_type").and_then(|v| u8::try_from(v).ok());
    let ua_type_code = ua_type_code.filter(|c| *c <= 15);

    let pilot_position = match (get_f64(&flat, "pilot_lat"), get_f64(&flat, "pilot_lon")) {
        (Some(lat), Some(lon)) => Some(Position { lat, lon, alt_m: position.alt_m }),
        _ => None,
    };
    let home_position = match (get_f64(&flat, "home_lat"), get_f64(&flat, "home_lon")) {
        (Some(lat), Some(lon)) => Some(Position { lat, lon, alt_m: position.alt_m }),
        _ => None,
    };

    let partial = id.as_deref() == Some("drone-alert");

    Some(Observation {
        kind: ObservationKind::Drone,
        uid,
        position,
        kinematics: Kinematics {
            ground_speed_mps: get_f64(&flat, "speed"),
            vertical_speed_mps: get_f64(&flat, "vspeed"),
            course_deg: get_f64(&flat, "direction"),
            on_ground: None,
        },
        identity: Identity {
            mac,
            callsign: id.clone(),
            alt_id: get_str(&flat, "operator_id").or_else(|| get_str(&flat, "caa_id")),
            description: get_str(&flat, "description"),
            ua_type_code,
            ua_type_name: ua_type_code.and_then(ua_type_name).map(str::to_string),
            category: None,
            id_type,
            op_status: get_str(&flat, "op_status"),
            height_type: get_str(&flat, "height_type"),
            ew_dir: get_str(&flat, "ew_dir"),
            operator_id: get_str(&flat, "operator_id"),
            caa_id: get_str(&flat, "caa_id"),
            timestamp: get_str(&flat, "timestamp"),
        },
        quality: Quality {
            rssi_dbm: get_i64(&flat, "rssi").map(|v| v as i32),
            horizontal_accuracy_m: None,
            vertical_accuracy_m: None,
            nic: None,
            nac_p: None,
            nac_v: None,
        },
        auxiliary: Auxiliary {
            pilot_position,
            home_position,
            frequency_hz: get_f64(&flat, "freq"),
            bandwidth_hz: None,
        },
        observed_at: Utc::now(),
        seen_by,
        partial,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serial_number_id_type_produces_drone_prefixed_uid() {
        let raw = json!([
            {"Basic ID": {"id": "ABC123", "id_type": "Serial Number (ANSI/CTA-2063-A)"}},
            {"Location/Vector Message": {"latitude": 34.1, "longitude": -117.2, "geodetic_altitude": 120.5}},
        ]);
        let obs = normalize(raw, Some("wardragon-1".into())).expect("should normalize");
        assert_eq!(obs.uid.as_deref(), Some("drone-ABC123"));
        assert_eq!(obs.position.lat, 34.1);
        assert_eq!(obs.position.alt_m, 120.5);
    }

    #[test]
    fn caa_only_with_no_serial_has_no_uid_but_keeps_mac() {
        let raw = json!([
            {"Basic ID": {"id_type": "CAA Assigned Registration ID", "MAC": "AA:BB:CC:DD:EE:FF"}},
        ]);
        let obs = normalize(raw, None).expect("should normalize");
        assert!(obs.uid.is_none());
        assert_eq!(obs.identity.mac.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
    }

    #[test]
    fn neither_uid_nor_mac_is_rejected() {
        let raw = json!([{"Basic ID": {"id_type": "CAA Assigned Registration ID"}}]);
        assert!(normalize(raw, None).is_none());
    }

    #[test]
    fn out_of_range_ua_type_becomes_none() {
        let raw = json!([
            {"Basic ID": {"id": "ABC123", "id_type": "Serial Number (ANSI/CTA-2063-A)", "ua_type": 99}},
        ]);
        let obs = normalize(raw, None).expect("should normalize");
        assert_eq!(obs.identity.ua_type_code, None);
    }

    #[test]
    fn drone_alert_sentinel_sets_partial_flag() {
        let raw = json!([{"Basic ID": {"id": "drone-alert"}}]);
        let obs = normalize(raw, None).expect("should normalize");
        assert!(obs.partial);
        assert_eq!(obs.uid.as_deref(), Some("drone-alert"));
    }
}
