//! Cursor-on-Target XML encoding.
//!
//! Every emitted event shares the same skeleton — `<event><point/><detail>
//! ...</detail></event>` — so this module provides a small builder over
//! `quick_xml` and one function per event kind that fills it in with the
//! exact attribute/child shapes the original tactical clients expect.

use crate::model::{Position, Track, TrustLevel};
use dragonsync_common::now_cot_time;
use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;
use std::io::Cursor;

/// UA type code (0-15) to CoT event type, per the Remote-ID airspace
/// mapping: rotor/fixed-wing/VTOL get aircraft types, everything else
/// (including unknown/out-of-range) gets the generic ground-vehicle type.
pub fn ua_type_to_cot(ua_type: Option<u8>) -> &'static str {
    match ua_type {
        Some(1) | Some(5) | Some(6) => "a-f-A-f",
        Some(2) | Some(3) | Some(4) => "a-u-A-M-H-R",
        Some(7..=15) => "b-m-p-s-m",
        _ => "a-u-A-M-H-R",
    }
}

struct XmlBuilder {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlBuilder {
    fn new() -> Self {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .expect("writing XML declaration never fails");
        XmlBuilder { writer }
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) {
        let mut el = BytesStart::new(name);
        el.extend_attributes(attrs.iter().map(|(k, v)| (*k, *v)));
        self.writer
            .write_event(Event::Empty(el))
            .expect("writing to an in-memory buffer never fails");
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) {
        let mut el = BytesStart::new(name);
        el.extend_attributes(attrs.iter().map(|(k, v)| (*k, *v)));
        self.writer
            .write_event(Event::Start(el))
            .expect("writing to an in-memory buffer never fails");
    }

    fn end(&mut self, name: &str) {
        self.writer
            .write_event(Event::End(quick_xml::events::BytesEnd::new(name)))
            .expect("writing to an in-memory buffer never fails");
    }

    fn text(&mut self, text: &str) {
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .expect("writing to an in-memory buffer never fails");
    }

    fn elem_with_text(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) {
        self.start(name, attrs);
        if !text.is_empty() {
            self.text(text);
        }
        self.end(name);
    }

    fn finish(self) -> String {
        String::from_utf8(self.writer.into_inner().into_inner())
            .expect("quick_xml only ever writes valid UTF-8")
    }
}

/// Common event envelope: `<event version uid type time start stale how>`
/// followed by `<point>`. `detail` is appended after the point by the
/// caller before the event is closed.
struct EventEnvelope {
    b: XmlBuilder,
}

impl EventEnvelope {
    fn open(
        uid: &str,
        cot_type: &str,
        time: &str,
        start: &str,
        stale: &str,
        lat: f64,
        lon: f64,
        hae: f64,
        ce: f64,
        le: f64,
    ) -> Self {
        let mut b = XmlBuilder::new();
        b.start(
            "event",
            &[
                ("version", "2.0"),
                ("uid", uid),
                ("type", cot_type),
                ("time", time),
                ("start", start),
                ("stale", stale),
                ("how", "m-g"),
            ],
        );
        b.empty(
            "point",
            &[
                ("lat", &lat.to_string()),
                ("lon", &lon.to_string()),
                ("hae", &hae.to_string()),
                ("ce", &ce.to_string()),
                ("le", &le.to_string()),
            ],
        );
        EventEnvelope { b }
    }

    fn close(mut self) -> String {
        self.b.end("event");
        self.b.finish()
    }
}

/// Derives `(ce, le)` from NACp/NACv per the ADS-B/UAT convention: when
/// neither is present the generic GPS-grade default applies.
pub fn derive_ce_le(nac_p: Option<u8>, nac_v: Option<u8>, on_ground: bool) -> (f64, f64) {
    match nac_p {
        Some(nac_p) => {
            let ground_const = if on_ground { 51.56 } else { 56.57 };
            let nac_v = nac_v.unwrap_or(nac_p);
            (nac_p as f64 + ground_const, nac_v as f64 + 12.5)
        }
        None => (35.0, 999999.0),
    }
}

fn stale_for(track: &Track, now: chrono::DateTime<chrono::Utc>, inactivity_timeout_s: i64) -> String {
    let elapsed = (now - track.last_update_time).num_seconds();
    let remaining = (inactivity_timeout_s - elapsed).max(0);
    let stale = now + chrono::Duration::seconds(remaining);
    dragonsync_common::format_cot_time(stale)
}

/// Drone CoT event built from a Track, matching the original Remote-ID
/// client's remarks layout.
pub fn drone_event(track: &Track, inactivity_timeout_s: i64) -> String {
    let now = chrono::Utc::now();
    let time = now_cot_time();
    let stale = stale_for(track, now, inactivity_timeout_s);
    let cot_type = ua_type_to_cot(track.identity.ua_type_code);

    let mut env = EventEnvelope::open(
        &track.uid,
        cot_type,
        &time,
        &time,
        &stale,
        track.position.lat,
        track.position.lon,
        track.position.alt_m,
        35.0,
        999999.0,
    );

    env.b.start("detail", &[]);
    env.b
        .empty("contact", &[("callsign", track.identity.callsign.as_deref().unwrap_or(&track.uid))]);
    env.b.empty(
        "precisionlocation",
        &[("geopointsrc", "gps"), ("altsrc", "gps")],
    );
    env.b.empty(
        "track",
        &[
            ("course", &track.kinematics.course_deg.unwrap_or(0.0).to_string()),
            ("speed", &track.kinematics.ground_speed_mps.unwrap_or(0.0).to_string()),
        ],
    );

    let mut remarks = format!(
        "MAC: {}, RSSI: {}dBm; ID Type: {}; UA Type: {} ({})",
        track.identity.mac.as_deref().unwrap_or("unknown"),
        track.quality.rssi_dbm.map(|v| v.to_string()).unwrap_or_else(|| "N/A".into()),
        track.identity.id_type.as_deref().unwrap_or("unknown"),
        track.identity.ua_type_name.as_deref().unwrap_or("Unknown"),
        track.identity.ua_type_code.map(|v| v.to_string()).unwrap_or_else(|| "N/A".into()),
    );
    if let Some(op) = &track.identity.operator_id {
        remarks.push_str(&format!("; Operator ID: {op}"));
    }
    remarks.push_str(&format!(
        "; Speed: {} m/s; Altitude: {} m; Course: {}\u{b0}",
        track.kinematics.ground_speed_mps.unwrap_or(0.0),
        track.position.alt_m,
        track.kinematics.course_deg.unwrap_or(0.0),
    ));
    if track.partial {
        remarks.push_str("; Alert: Unknown DJI OcuSync format (Encrypted/Partial)");
    }
    if let Some(make) = &track.identity.description {
        if !make.is_empty() {
            remarks.push_str(&format!("; RID: {make}"));
        }
    }
    if let Some(seen_by) = &track.seen_by {
        remarks.push_str(&format!("; SeenBy: {seen_by}"));
    }
    env.b.elem_with_text("remarks", &[], &remarks);
    env.b.empty("color", &[("argb", "-256")]);

    if track.enrichment.success {
        env.b.empty(
            "rid",
            &[
                ("make", track.enrichment.make.as_deref().unwrap_or("")),
                ("model", track.enrichment.model.as_deref().unwrap_or("")),
                ("source", track.enrichment.source.as_deref().unwrap_or("")),
            ],
        );
    }
    env.b.end("detail");

    env.close()
}

/// The CoT `type` attribute a track's terminal event should carry,
/// matching whichever encoder `track_event` would have used for it.
pub fn cot_type_for(track: &Track) -> &'static str {
    use crate::model::ObservationKind::*;
    match track.kind {
        Drone | FpvAlert | System => ua_type_to_cot(track.identity.ua_type_code),
        AircraftAdsb | AircraftUat => "a-f-A",
        DeviceWifi | DeviceBt => "b-m-p-s-p",
    }
}

/// Terminal CoT: `stale == time`, signalling consumers to drop the icon.
pub fn terminal_event(uid: &str, cot_type: &str) -> String {
    let now = now_cot_time();
    let env = EventEnvelope::open(uid, cot_type, &now, &now, &now, 0.0, 0.0, 0.0, 9999999.0, 9999999.0);
    env.close()
}

fn pair_event(uid_prefix: &str, base_uid: &str, drone_alt_m: f64, pos: Position, icon: &str) -> String {
    let now = now_cot_time();
    let stale = {
        let t = chrono::Utc::now() + chrono::Duration::seconds(60);
        dragonsync_common::format_cot_time(t)
    };
    let uid = format!("{uid_prefix}-{base_uid}");
    let mut env = EventEnvelope::open(
        &uid, "b-m-p-s-m", &now, &now, &stale, pos.lat, pos.lon, drone_alt_m, 35.0, 999999.0,
    );
    env.b.start("detail", &[]);
    env.b.empty("usericon", &[("iconsetpath", icon)]);
    env.b.empty("contact", &[("callsign", &uid)]);
    env.b.end("detail");
    env.close()
}

pub fn pilot_event(track: &Track) -> Option<String> {
    let pos = track.auxiliary.pilot_position?;
    if pos.is_zero() {
        return None;
    }
    Some(pair_event("pilot", &track.uid, track.position.alt_m, pos, "Person.png"))
}

pub fn home_event(track: &Track) -> Option<String> {
    let pos = track.auxiliary.home_position?;
    if pos.is_zero() {
        return None;
    }
    Some(pair_event("home", &track.uid, track.position.alt_m, pos, "House.png"))
}

/// ADS-B/UAT aircraft CoT event.
pub fn aircraft_event(track: &Track, inactivity_timeout_s: i64) -> String {
    let now = chrono::Utc::now();
    let time = now_cot_time();
    let stale = stale_for(track, now, inactivity_timeout_s);
    let on_ground = track.kinematics.on_ground.unwrap_or(false);
    let (ce, le) = derive_ce_le(track.quality.nac_p, track.quality.nac_v, on_ground);

    let mut env = EventEnvelope::open(
        &track.uid, "a-f-A", &time, &time, &stale, track.position.lat, track.position.lon,
        track.position.alt_m, ce, le,
    );
    env.b.start("detail", &[]);
    env.b.empty("contact", &[("callsign", track.identity.callsign.as_deref().unwrap_or(&track.uid))]);
    let mut track_attrs = vec![
        ("course".to_string(), track.kinematics.course_deg.unwrap_or(0.0).to_string()),
        ("speed".to_string(), track.kinematics.ground_speed_mps.unwrap_or(0.0).to_string()),
    ];
    if on_ground {
        track_attrs.push(("slope".to_string(), "0".to_string()));
    }
    let attr_refs: Vec<(&str, &str)> = track_attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    env.b.empty("track", &attr_refs);

    let mut remarks = format!(
        "ADS-B hex={} alt={}m gs={}m/s track={}",
        track.identity.mac.as_deref().unwrap_or(&track.uid),
        track.position.alt_m,
        track.kinematics.ground_speed_mps.unwrap_or(0.0),
        track.kinematics.course_deg.unwrap_or(0.0),
    );
    if let Some(squawk) = &track.identity.alt_id {
        remarks.push_str(&format!(" squawk={squawk}"));
    }
    if on_ground {
        remarks.push_str(" onground=1");
    }
    if let Some(seen_by) = &track.seen_by {
        remarks.push_str(&format!(" SeenBy:{seen_by}"));
    }
    env.b.elem_with_text("remarks", &[], &remarks);
    env.b.end("detail");
    env.close()
}

/// Wi-Fi/Bluetooth device-sighting CoT event: a generic point marker,
/// since Remote-ID/ADS-B airspace types don't apply to a Kismet sighting.
pub fn device_event(track: &Track, inactivity_timeout_s: i64) -> String {
    let now = chrono::Utc::now();
    let time = now_cot_time();
    let stale = stale_for(track, now, inactivity_timeout_s);

    let mut env = EventEnvelope::open(
        &track.uid, "b-m-p-s-p", &time, &time, &stale, track.position.lat, track.position.lon,
        track.position.alt_m, 35.0, 999999.0,
    );
    env.b.start("detail", &[]);
    env.b.empty("contact", &[("callsign", track.identity.callsign.as_deref().unwrap_or(&track.uid))]);
    let mut remarks = format!("mac={}", track.identity.mac.as_deref().unwrap_or(&track.uid));
    if let Some(rssi) = track.quality.rssi_dbm {
        remarks.push_str(&format!(" rssi={rssi}dBm"));
    }
    if let Some(seen_by) = &track.seen_by {
        remarks.push_str(&format!(" SeenBy:{seen_by}"));
    }
    env.b.elem_with_text("remarks", &[], &remarks);
    env.b.end("detail");
    env.close()
}

/// FPV alert CoT event: `type="b-m-p-s-s"`, `ce=radius`.
pub fn fpv_event(alert: &crate::model::SignalAlert) -> String {
    let now = now_cot_time();
    let stale = dragonsync_common::format_cot_time(alert.expires_at);
    let mut env = EventEnvelope::open(
        &alert.uid, "b-m-p-s-s", &now, &now, &stale, alert.position.lat, alert.position.lon,
        alert.position.alt_m, alert.radius_m, 999999.0,
    );
    env.b.start("detail", &[]);
    let mut remarks = "signal=fpv".to_string();
    if let Some(src) = &alert.source {
        remarks.push_str(&format!(" source={src}"));
    }
    if let Some(hz) = alert.frequency_hz {
        remarks.push_str(&format!(" center_hz={hz}"));
    }
    if let Some(bw) = alert.bandwidth_hz {
        remarks.push_str(&format!(" bandwidth_hz={bw}"));
    }
    if let Some(seen_by) = &alert.seen_by {
        remarks.push_str(&format!(" SeenBy:{seen_by}"));
    }
    env.b.elem_with_text("remarks", &[], &remarks);
    env.b.end("detail");
    env.close()
}

/// System status ("kit") CoT event.
pub fn system_event(
    kit_id: &str,
    pos: Position,
    course: f64,
    speed: f64,
    remarks_text: &str,
) -> String {
    let now = now_cot_time();
    let stale = dragonsync_common::format_cot_time(chrono::Utc::now() + chrono::Duration::minutes(10));
    let mut env = EventEnvelope::open(
        kit_id, "a-f-G-E-S", &now, &now, &stale, pos.lat, pos.lon, pos.alt_m, 35.0, 999999.0,
    );
    env.b.start("detail", &[]);
    env.b.empty("contact", &[("endpoint", ""), ("phone", ""), ("callsign", kit_id)]);
    env.b.empty("precisionlocation", &[("geopointsrc", "gps"), ("altsrc", "gps")]);
    env.b.elem_with_text("remarks", &[], remarks_text);
    env.b.empty("color", &[("argb", "-256")]);
    env.b.empty("track", &[("course", &format!("{course:.1}")), ("speed", &format!("{speed:.2}"))]);
    env.b.end("detail");
    env.close()
}

/// Routes a Track to its kind-appropriate event encoder, so the
/// Dispatcher doesn't need a match arm for every ObservationKind.
pub fn track_event(track: &Track, inactivity_timeout_s: i64) -> String {
    use crate::model::ObservationKind::*;
    match track.kind {
        Drone => drone_event(track, inactivity_timeout_s),
        AircraftAdsb | AircraftUat => aircraft_event(track, inactivity_timeout_s),
        DeviceWifi | DeviceBt => device_event(track, inactivity_timeout_s),
        FpvAlert | System => drone_event(track, inactivity_timeout_s),
    }
}

pub fn trust_remarks_suffix(level: TrustLevel) -> &'static str {
    match level {
        TrustLevel::Trusted => " trust=trusted",
        TrustLevel::Opportunistic => " trust=opportunistic",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use chrono::Utc;

    fn sample_track() -> Track {
        let obs = Observation {
            kind: ObservationKind::Drone,
            uid: Some("drone-ABC123".into()),
            position: Position { lat: 34.1, lon: -117.2, alt_m: 120.5 },
            kinematics: Kinematics { course_deg: Some(90.0), ground_speed_mps: Some(5.0), ..Default::default() },
            identity: Identity { ua_type_code: Some(2), mac: Some("AA:BB:CC:DD:EE:FF".into()), ..Default::default() },
            quality: Quality::default(),
            auxiliary: Auxiliary::default(),
            observed_at: Utc::now(),
            seen_by: Some("wardragon-1".into()),
            partial: false,
        };
        Track::from_observation(obs, 0)
    }

    #[test]
    fn ua_type_2_maps_to_rotor_type() {
        assert_eq!(ua_type_to_cot(Some(2)), "a-u-A-M-H-R");
    }

    #[test]
    fn unknown_ua_type_defaults_to_rotor_type() {
        assert_eq!(ua_type_to_cot(None), "a-u-A-M-H-R");
        assert_eq!(ua_type_to_cot(Some(200)), "a-u-A-M-H-R");
    }

    #[test]
    fn ce_le_default_without_nac_p() {
        assert_eq!(derive_ce_le(None, None, false), (35.0, 999999.0));
    }

    #[test]
    fn ce_le_derived_from_nac_p_airborne() {
        let (ce, le) = derive_ce_le(Some(9), Some(7), false);
        assert!((ce - (9.0 + 56.57)).abs() < 1e-9);
        assert!((le - (7.0 + 12.5)).abs() < 1e-9);
    }

    #[test]
    fn ce_le_derived_from_nac_p_on_ground() {
        let (ce, _) = derive_ce_le(Some(9), Some(7), true);
        assert!((ce - (9.0 + 51.56)).abs() < 1e-9);
    }

    #[test]
    fn drone_event_contains_point_with_expected_coordinates() {
        let t = sample_track();
        let xml = drone_event(&t, 60);
        assert!(xml.contains("lat=\"34.1\""));
        assert!(xml.contains("lon=\"-117.2\""));
        assert!(xml.contains("hae=\"120.5\""));
        assert!(xml.contains("type=\"a-u-A-M-H-R\""));
    }

    #[test]
    fn terminal_event_has_equal_time_and_stale() {
        let xml = terminal_event("drone-ABC123", "a-u-A-M-H-R");
        assert!(xml.contains("uid=\"drone-ABC123\""));
    }

    #[test]
    fn pilot_event_none_when_position_absent() {
        let t = sample_track();
        assert!(pilot_event(&t).is_none());
    }

    #[test]
    fn pilot_event_uses_drone_altitude() {
        let mut t = sample_track();
        t.auxiliary.pilot_position = Some(Position { lat: 1.0, lon: 2.0, alt_m: 0.0 });
        let xml = pilot_event(&t).expect("pilot position is set");
        assert!(xml.contains(&format!("hae=\"{}\"", t.position.alt_m)));
        assert!(xml.contains("uid=\"pilot-drone-ABC123\""));
    }
}
