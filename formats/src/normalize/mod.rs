//! One module per source kind, each exposing a single `normalize(raw) ->
//! Option<_>` operation. Remote-ID's raw payload is either a list of
//! message-type fragments or a single flattened dict (the ESP32 encoder
//! variant); that shape is modeled explicitly instead of guessed at
//! every call site.

pub mod adsb;
pub mod fpv;
pub mod kismet;
pub mod remoteid;
pub mod uat;

use serde_json::Value;

/// The two wire shapes Remote-ID telemetry arrives in.
pub enum RemoteIdPayload {
    /// A list of `{"Basic ID": {...}}`, `{"Location/Vector Message": {...}}`
    /// etc. fragments that must be merged before normalizing.
    Fragments(Vec<Value>),
    /// A single already-flat dict (ESP32 encoder variant).
    Flat(Value),
}

impl RemoteIdPayload {
    pub fn from_raw(raw: Value) -> Self {
        match raw {
            Value::Array(items) => RemoteIdPayload::Fragments(items),
            other => RemoteIdPayload::Flat(other),
        }
    }

    /// Merges all fragments (or returns the flat dict as-is) into one
    /// JSON object, last-value-wins on key collision.
    pub fn flatten(self) -> Value {
        match self {
            RemoteIdPayload::Flat(v) => v,
            RemoteIdPayload::Fragments(items) => {
                let mut merged = serde_json::Map::new();
                for item in items {
                    if let Value::Object(outer) = item {
                        for (_tag, inner) in outer {
                            if let Value::Object(fields) = inner {
                                for (k, v) in fields {
                                    merged.insert(k, v);
                                }
                            }
                        }
                    }
                }
                Value::Object(merged)
            }
        }
    }
}

pub(crate) fn get_f64(v: &Value, key: &str) -> Option<f64> {
    v.get(key).and_then(|x| x.as_f64().or_else(|| x.as_str().and_then(|s| s.parse().ok())))
}

pub(crate) fn get_str(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(|x| x.as_str()).map(|s| s.to_string())
}

pub(crate) fn get_i64(v: &Value, key: &str) -> Option<i64> {
    v.get(key).and_then(|x| x.as_i64().or_else(|| x.as_str().and_then(|s| s.parse().ok())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_merges_fragments_into_one_object() {
        let raw = json!([
            {"Basic ID": {"id": "ABC123", "id_type": "Serial Number (ANSI/CTA-2063-A)"}},
            {"Location/Vector Message": {"latitude": 34.1, "longitude": -117.2}},
        ]);
        let flat = RemoteIdPayload::from_raw(raw).flatten();
        assert_eq!(flat.get("id").and_then(|v| v.as_str()), Some("ABC123"));
        assert_eq!(flat.get("latitude").and_then(|v| v.as_f64()), Some(34.1));
    }

    #[test]
    fn flatten_passes_through_flat_dict_unchanged() {
        let raw = json!({"id": "ABC123", "latitude": 34.1});
        let flat = RemoteIdPayload::from_raw(raw).flatten();
        assert_eq!(flat.get("id").and_then(|v| v.as_str()), Some("ABC123"));
    }
}
