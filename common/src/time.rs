//! CoT uses a fixed ISO-8601 microsecond timestamp format everywhere; this
//! module is the single place that formats it so every emitter agrees.

use chrono::{DateTime, Utc};

/// `%Y-%m-%dT%H:%M:%S.%fZ`, e.g. `2026-07-28T12:34:56.123456Z`.
pub fn format_cot_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

pub fn now_cot_time() -> String {
    format_cot_time(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_with_microsecond_precision_and_z_suffix() {
        let t = Utc.with_ymd_and_hms(2026, 7, 28, 12, 34, 56).unwrap();
        let s = format_cot_time(t);
        assert_eq!(s, "2026-07-28T12:34:56.000000Z");
    }
}
