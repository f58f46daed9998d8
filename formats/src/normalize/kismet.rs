//! Kismet REST device-record normalizer (Wi-Fi / Bluetooth).

use super::{get_f64, get_str};
use crate::model::*;
use chrono::Utc;
use serde_json::Value;

/// The physical layers this normalizer accepts; any other `phyname`
/// (Zigbee, RFTAP, etc.) is ignored.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phy {
    Wifi,
    Bluetooth,
}

fn infer_phy(raw: &Value) -> Option<Phy> {
    match get_str(raw, "kismet.device.base.phyname").as_deref() {
        Some("IEEE802.11") => return Some(Phy::Wifi),
        Some("Bluetooth") => return Some(Phy::Bluetooth),
        _ => {}
    }
    if raw.get("dot11.device").is_some() {
        return Some(Phy::Wifi);
    }
    if raw.get("bluetooth.device").is_some() {
        return Some(Phy::Bluetooth);
    }
    None
}

/// Probes a fixed, ordered list of nested location candidates; the first
/// populated one wins.
fn extract_location(raw: &Value) -> Option<Position> {
    const CANDIDATES: &[&str] = &[
        "kismet.common.location.geopoint",
        "kismet.common.location.last_loc",
        "kismet.common.location.avg_loc",
    ];

    for path in CANDIDATES {
        if let Some(loc) = raw.get(path) {
            if let Some(pos) = position_from_geopoint(loc) {
                return Some(pos);
            }
        }
    }

    raw.get("dot11.device")
        .and_then(|d| d.get("dot11.device.last_beaconed_ssid_record"))
        .or_else(|| {
            raw.get("dot11.device")
                .and_then(|d| d.get("dot11.device.advertised_ssid_map"))
                .and_then(|m| m.as_array().and_then(|a| a.first()))
        })
        .and_then(|record| record.get("dot11.advertisedssid.location"))
        .and_then(position_from_geopoint)
}

fn position_from_geopoint(v: &Value) -> Option<Position> {
    if let Some(arr) = v.get("kismet.common.location.geopoint").and_then(|g| g.as_array()) {
        let lon = arr.first()?.as_f64()?;
        let lat = arr.get(1)?.as_f64()?;
        return Some(Position { lat, lon, alt_m: 0.0 });
    }
    if let Some(arr) = v.as_array() {
        if arr.len() >= 2 {
            let lon = arr[0].as_f64()?;
            let lat = arr[1].as_f64()?;
            return Some(Position { lat, lon, alt_m: 0.0 });
        }
    }
    let lat = v.get("lat").and_then(Value::as_f64).or_else(|| get_f64(v, "kismet.common.location.lat"));
    let lon = v.get("lon").and_then(Value::as_f64).or_else(|| get_f64(v, "kismet.common.location.lon"));
    match (lat, lon) {
        (Some(lat), Some(lon)) => Some(Position { lat, lon, alt_m: 0.0 }),
        _ => None,
    }
}

/// `normalize(raw) -> Option<Observation>`. Requires a recognized `phy`,
/// a MAC, and a populated location candidate.
pub fn normalize(raw: &Value, seen_by: Option<String>) -> Option<Observation> {
    let phy = infer_phy(raw)?;
    let mac = get_str(raw, "kismet.device.base.macaddr")?;
    let position = extract_location(raw)?;

    let (kind, uid_prefix) = match phy {
        Phy::Wifi => (ObservationKind::DeviceWifi, "kismet-wifi-"),
        Phy::Bluetooth => (ObservationKind::DeviceBt, "kismet-bt-"),
    };
    let uid = format!("{uid_prefix}{}", mac.to_lowercase());

    let rssi = get_f64(raw, "kismet.device.base.signal")
        .map(|v| v as i32)
        .or_else(|| {
            raw.get("kismet.device.base.signal")
                .and_then(|s| s.get("kismet.common.signal.last_signal"))
                .and_then(Value::as_f64)
                .map(|v| v as i32)
        });

    Some(Observation {
        kind,
        uid: Some(uid),
        position,
        kinematics: Kinematics::default(),
        identity: Identity {
            mac: Some(mac.to_uppercase()),
            callsign: get_str(raw, "kismet.device.base.name")
                .or_else(|| get_str(raw, "kismet.device.base.commonname")),
            alt_id: None,
            description: get_str(raw, "kismet.device.base.type"),
            ua_type_code: None,
            ua_type_name: None,
            category: None,
            id_type: Some("Kismet Device".into()),
            op_status: None,
            height_type: None,
            ew_dir: None,
            operator_id: None,
            caa_id: None,
            timestamp: None,
        },
        quality: Quality { rssi_dbm: rssi, ..Quality::default() },
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
    fn wifi_phy_produces_wifi_prefixed_uid() {
        let raw = json!({
            "kismet.device.base.phyname": "IEEE802.11",
            "kismet.device.base.macaddr": "aa:bb:cc:dd:ee:ff",
            "kismet.common.location.geopoint": {"kismet.common.location.geopoint": [-117.2, 34.1]},
        });
        let obs = normalize(&raw, None).expect("should normalize");
        assert_eq!(obs.kind, ObservationKind::DeviceWifi);
        assert_eq!(obs.uid.as_deref(), Some("kismet-wifi-aa:bb:cc:dd:ee:ff"));
        assert_eq!(obs.position.lat, 34.1);
        assert_eq!(obs.position.lon, -117.2);
    }

    #[test]
    fn bluetooth_phy_produces_bt_prefixed_uid() {
        let raw = json!({
            "kismet.device.base.phyname": "Bluetooth",
            "kismet.device.base.macaddr": "11:22:33:44:55:66",
            "kismet.common.location.geopoint": {"kismet.common.location.geopoint": [1.0, 2.0]},
        });
        let obs = normalize(&raw, None).expect("should normalize");
        assert_eq!(obs.kind, ObservationKind::DeviceBt);
        assert!(obs.uid.as_deref().unwrap().starts_with("kismet-bt-"));
    }

    #[test]
    fn location_probe_falls_back_to_last_loc() {
        let raw = json!({
            "kismet.device.base.phyname": "IEEE802.11",
            "kismet.device.base.macaddr": "aa:bb:cc:dd:ee:ff",
            "kismet.common.location.last_loc": {"lat": 5.0, "lon": 6.0},
        });
        let obs = normalize(&raw, None).expect("should normalize");
        assert_eq!(obs.position.lat, 5.0);
        assert_eq!(obs.position.lon, 6.0);
    }

    #[test]
    fn unrecognized_phy_is_rejected() {
        let raw = json!({
            "kismet.device.base.phyname": "Zigbee",
            "kismet.device.base.macaddr": "aa:bb:cc:dd:ee:ff",
        });
        assert!(normalize(&raw, None).is_none());
    }

    #[test]
    fn missing_location_is_rejected() {
        let raw = json!({
            "kismet.device.base.phyname": "IEEE802.11",
            "kismet.device.base.macaddr": "aa:bb:cc:dd:ee:ff",
        });
        assert!(normalize(&raw, None).is_none());
    }
}
