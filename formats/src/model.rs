//! The data model shared by every component downstream of the
//! normalizers: `Observation` (transient, one per ingested message),
//! `Track` (persistent registry entry) and `SignalAlert` (the FPV
//! signal store's short-lived entry).
//!
//! Altitude is always meters and speeds are always meters/second in this
//! model; source units (feet, knots, ft/min) are converted by the
//! normalizer that produced the `Observation`, never downstream.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of thing an `Observation`/`Track` represents.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObservationKind {
    Drone,
    AircraftAdsb,
    AircraftUat,
    DeviceWifi,
    DeviceBt,
    FpvAlert,
    System,
}

/// A lat/lon/altitude fix. Altitude is meters above the ellipsoid (`hae`
/// in CoT terms).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    pub alt_m: f64,
}

impl Position {
    pub fn is_zero(&self) -> bool {
        self.lat == 0.0 && self.lon == 0.0
    }
}

/// Motion fields, all already converted to metric/degrees by the
/// normalizer.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Kinematics {
    pub ground_speed_mps: Option<f64>,
    pub vertical_speed_mps: Option<f64>,
    pub course_deg: Option<f64>,
    pub on_ground: Option<bool>,
}

/// Descriptive/identifying fields. Empty strings here are treated by the
/// registry as "field not supplied" for mutation purposes (see
/// `Track::merge_observation`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Identity {
    pub mac: Option<String>,
    pub callsign: Option<String>,
    pub alt_id: Option<String>,
    pub description: Option<String>,
    pub ua_type_code: Option<u8>,
    pub ua_type_name: Option<String>,
    pub category: Option<String>,
    pub id_type: Option<String>,
    pub op_status: Option<String>,
    pub height_type: Option<String>,
    pub ew_dir: Option<String>,
    pub operator_id: Option<String>,
    pub caa_id: Option<String>,
    pub timestamp: Option<String>,
}

/// Positional/velocity quality/uncertainty fields.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Quality {
    pub rssi_dbm: Option<i32>,
    pub horizontal_accuracy_m: Option<f64>,
    pub vertical_accuracy_m: Option<f64>,
    pub nic: Option<u8>,
    pub nac_p: Option<u8>,
    pub nac_v: Option<u8>,
}

/// Fields that only apply to a subset of observation kinds.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Auxiliary {
    pub pilot_position: Option<Position>,
    pub home_position: Option<Position>,
    pub frequency_hz: Option<f64>,
    pub bandwidth_hz: Option<f64>,
}

/// Transient input to the registry, produced by a Normalizer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Observation {
    pub kind: ObservationKind,
    /// Stable per-kind identifier. `None` only for CAA-only Remote-ID
    /// fragments, which the registry resolves by MAC instead.
    pub uid: Option<String>,
    pub position: Position,
    pub kinematics: Kinematics,
    pub identity: Identity,
    pub quality: Quality,
    pub auxiliary: Auxiliary,
    pub observed_at: chrono::DateTime<chrono::Utc>,
    pub seen_by: Option<String>,
    /// Set by the Remote-ID normalizer for partially-decoded OcuSync
    /// frames (`uid == "drone-alert"`); replaces a string-match check at
    /// the dispatcher for pilot/home suppression.
    pub partial: bool,
}

/// Outcome of the enrichment worker's serial-number lookup.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Enrichment {
    pub attempted: bool,
    pub success: bool,
    pub pending: bool,
    pub tracking_id: Option<String>,
    pub status: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub source: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum TrustLevel {
    Trusted,
    Opportunistic,
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustLevel::Trusted => write!(f, "trusted"),
            TrustLevel::Opportunistic => write!(f, "opportunistic"),
        }
    }
}

/// Persistent entity held by the `TrackRegistry`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Track {
    pub uid: String,
    pub kind: ObservationKind,
    pub position: Position,
    pub prev_position: Option<Position>,
    pub kinematics: Kinematics,
    pub identity: Identity,
    pub quality: Quality,
    pub auxiliary: Auxiliary,
    pub seen_by: Option<String>,
    pub partial: bool,

    pub enrichment: Enrichment,
    pub trust_level: TrustLevel,

    pub last_update_time: chrono::DateTime<chrono::Utc>,
    pub last_sent_time: Option<chrono::DateTime<chrono::Utc>>,
    pub last_sent_position: Option<Position>,

    /// Insertion order within its pool; used for FIFO eviction.
    pub admitted_seq: u64,
}

impl Track {
    /// Builds a brand-new opportunistic Track from the first Observation
    /// admitted for a `uid`.
    pub fn from_observation(obs: Observation, admitted_seq: u64) -> Self {
        Track {
            uid: obs.uid.clone().expect("admission requires a uid"),
            kind: obs.kind,
            position: obs.position,
            prev_position: None,
            kinematics: obs.kinematics,
            identity: obs.identity,
            quality: obs.quality,
            auxiliary: obs.auxiliary,
            seen_by: obs.seen_by,
            partial: obs.partial,
            enrichment: Enrichment::default(),
            trust_level: TrustLevel::Opportunistic,
            last_update_time: obs.observed_at,
            last_sent_time: None,
            last_sent_position: None,
            admitted_seq,
        }
    }

    /// Merges a subsequent Observation for the same `uid` into this Track
    /// per the registry's mutation semantics: position/kinematics are
    /// overwritten unconditionally, descriptive identity fields treat an
    /// empty/absent value as "unchanged", `prev_position` captures the
    /// pre-update position, and course is derived from the position
    /// delta when the source didn't supply one.
    pub fn merge_observation(&mut self, obs: Observation) {
        self.prev_position = Some(self.position);
        self.position = obs.position;
        self.seen_by = obs.seen_by.or_else(|| self.seen_by.clone());
        self.partial = obs.partial;

        if obs.kinematics.ground_speed_mps.is_some() {
            self.kinematics.ground_speed_mps = obs.kinematics.ground_speed_mps;
        }
        if obs.kinematics.vertical_speed_mps.is_some() {
            self.kinematics.vertical_speed_mps = obs.kinematics.vertical_speed_mps;
        }
        if obs.kinematics.on_ground.is_some() {
            self.kinematics.on_ground = obs.kinematics.on_ground;
        }

        if let Some(course) = obs.kinematics.course_deg {
            self.kinematics.course_deg = Some(course);
        } else if let Some(prev) = self.prev_position {
            let bearing = dragonsync_common::bearing_deg(
                prev.lat,
                prev.lon,
                self.position.lat,
                self.position.lon,
            );
            self.kinematics.course_deg = Some(bearing);
        }

        merge_optional_string(&mut self.identity.callsign, obs.identity.callsign);
        merge_optional_string(&mut self.identity.description, obs.identity.description);
        merge_optional_string(&mut self.identity.id_type, obs.identity.id_type);
        merge_optional_string(&mut self.identity.ua_type_name, obs.identity.ua_type_name);
        merge_optional_string(&mut self.identity.op_status, obs.identity.op_status);
        merge_optional_string(&mut self.identity.height_type, obs.identity.height_type);
        merge_optional_string(&mut self.identity.ew_dir, obs.identity.ew_dir);
        merge_optional_string(&mut self.identity.operator_id, obs.identity.operator_id);
        merge_optional_string(&mut self.identity.caa_id, obs.identity.caa_id);
        merge_optional_string(&mut self.identity.timestamp, obs.identity.timestamp);
        if obs.identity.mac.is_some() {
            self.identity.mac = obs.identity.mac;
        }
        if obs.identity.ua_type_code.is_some() {
            self.identity.ua_type_code = obs.identity.ua_type_code;
        }
        if obs.identity.category.is_some() {
            self.identity.category = obs.identity.category;
        }
        if obs.identity.alt_id.is_some() {
            self.identity.alt_id = obs.identity.alt_id;
        }

        self.quality = obs.quality;
        if obs.auxiliary.pilot_position.is_some() {
            self.auxiliary.pilot_position = obs.auxiliary.pilot_position;
        }
        if obs.auxiliary.home_position.is_some() {
            self.auxiliary.home_position = obs.auxiliary.home_position;
        }

        self.last_update_time = obs.observed_at;
    }

    pub fn mac(&self) -> Option<&str> {
        self.identity.mac.as_deref()
    }
}

/// Empty strings mean "unchanged" for descriptive fields, matching the
/// original implementation's truthy-guard (`if x:`) behavior.
fn merge_optional_string(dst: &mut Option<String>, src: Option<String>) {
    if let Some(s) = src {
        if !s.is_empty() {
            *dst = Some(s);
        }
    }
}

/// A short-lived FPV-alert entry held by the signal store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignalAlert {
    pub uid: String,
    pub source: Option<String>,
    pub position: Position,
    pub radius_m: f64,
    pub frequency_hz: Option<f64>,
    pub bandwidth_hz: Option<f64>,
    pub seen_by: Option<String>,
    pub observed_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn obs(uid: &str) -> Observation {
        Observation {
            kind: ObservationKind::Drone,
            uid: Some(uid.to_string()),
            position: Position { lat: 1.0, lon: 2.0, alt_m: 3.0 },
            kinematics: Kinematics::default(),
            identity: Identity::default(),
            quality: Quality::default(),
            auxiliary: Auxiliary::default(),
            observed_at: Utc::now(),
            seen_by: Some("wardragon-1".into()),
            partial: false,
        }
    }

    #[test]
    fn empty_string_does_not_overwrite_descriptive_field() {
        let mut t = Track::from_observation(obs("drone-ABC"), 0);
        t.identity.callsign = Some("ABC123".into());

        let mut next = obs("drone-ABC");
        next.identity.callsign = Some(String::new());
        t.merge_observation(next);

        assert_eq!(t.identity.callsign.as_deref(), Some("ABC123"));
    }

    #[test]
    fn non_empty_string_overwrites_descriptive_field() {
        let mut t = Track::from_observation(obs("drone-ABC"), 0);
        t.identity.callsign = Some("ABC123".into());

        let mut next = obs("drone-ABC");
        next.identity.callsign = Some("XYZ999".into());
        t.merge_observation(next);

        assert_eq!(t.identity.callsign.as_deref(), Some("XYZ999"));
    }

    #[test]
    fn course_is_derived_from_position_delta_when_absent() {
        let mut t = Track::from_observation(obs("drone-ABC"), 0);
        let mut next = obs("drone-ABC");
        next.position = Position { lat: 2.0, lon: 2.0, alt_m: 3.0 };
        next.kinematics.course_deg = None;
        t.merge_observation(next);

        let course = t.kinematics.course_deg.expect("course should be derived");
        assert!((0.0..360.0).contains(&course));
    }

    #[test]
    fn source_provided_course_wins_over_derivation() {
        let mut t = Track::from_observation(obs("drone-ABC"), 0);
        let mut next = obs("drone-ABC");
        next.position = Position { lat: 2.0, lon: 2.0, alt_m: 3.0 };
        next.kinematics.course_deg = Some(42.0);
        t.merge_observation(next);

        assert_eq!(t.kinematics.course_deg, Some(42.0));
    }

    #[test]
    fn new_track_starts_opportunistic() {
        let t = Track::from_observation(obs("drone-ABC"), 0);
        assert_eq!(t.trust_level, TrustLevel::Opportunistic);
        assert!(!t.enrichment.success);
    }
}
