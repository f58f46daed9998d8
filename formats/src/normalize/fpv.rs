//! FPV-video RF signal normalizer. FPV alerts bypass the
//! `Observation`/`Track` admission pipeline entirely (the signal store
//! "does not interact with Track admission logic"); this module only
//! extracts the fields a `SignalAlert` needs, leaving the deterministic
//! plotted-position offset (`dragonsync_common::offset_latlon`) and the
//! `confirm_only` filtering to the source layer that owns a real
//! observer position to offset from.

use super::{get_f64, get_str};
use serde_json::Value;

/// A parsed FPV RF alert, prior to plotted-position offsetting.
#[derive(Clone, Debug, PartialEq)]
pub struct FpvSignal {
    pub uid: String,
    pub source: Option<String>,
    pub frequency_hz: f64,
    pub bandwidth_hz: Option<f64>,
    pub confirmed: bool,
}

/// `normalize(raw) -> Option<FpvSignal>`. Requires `center_hz` (or its
/// `frequency` alias) and a `uid`.
pub fn normalize(raw: &Value) -> Option<FpvSignal> {
    let uid = get_str(raw, "uid").or_else(|| get_str(raw, "id"))?;
    let frequency_hz = get_f64(raw, "center_hz").or_else(|| get_f64(raw, "frequency"))?;
    let source = get_str(raw, "source");
    let confirmed = source.as_deref() == Some("confirm");

    Some(FpvSignal {
        uid,
        source,
        frequency_hz,
        bandwidth_hz: get_f64(raw, "bandwidth_hz").or_else(|| get_f64(raw, "bandwidth")),
        confirmed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn frequency_alias_is_accepted() {
        let raw = json!({"uid": "fpv-1", "frequency": 5800000000.0, "source": "confirm"});
        let signal = normalize(&raw).expect("should normalize");
        assert_eq!(signal.frequency_hz, 5800000000.0);
        assert!(signal.confirmed);
    }

    #[test]
    fn center_hz_is_preferred_field_name() {
        let raw = json!({"uid": "fpv-1", "center_hz": 5745000000.0});
        let signal = normalize(&raw).expect("should normalize");
        assert_eq!(signal.frequency_hz, 5745000000.0);
        assert!(!signal.confirmed);
    }

    #[test]
    fn non_confirm_source_is_unconfirmed() {
        let raw = json!({"uid": "fpv-1", "center_hz": 5.8e9, "source": "scan"});
        let signal = normalize(&raw).expect("should normalize");
        assert!(!signal.confirmed);
    }

    #[test]
    fn missing_frequency_is_rejected() {
        let raw = json!({"uid": "fpv-1"});
        assert!(normalize(&raw).is_none());
    }

    #[test]
    fn missing_uid_is_rejected() {
        let raw = json!({"center_hz": 5.8e9});
        assert!(normalize(&raw).is_none());
    }
}
