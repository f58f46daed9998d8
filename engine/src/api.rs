//! Read-only HTTP facade projecting the current registry/signal-store
//! state, plus a redacted config dump and a remote-head update check.

use crate::registry::TrackRegistry;
use crate::signals::SignalStore;
use crate::sinks::caching::CachingSink;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use dragonsync_formats::Track;
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<TrackRegistry>,
    pub signals: Arc<SignalStore>,
    pub adsb_cache: Option<Arc<CachingSink>>,
    pub last_system_status: Arc<Mutex<Option<Value>>>,
    pub redacted_config: Arc<Value>,
    pub repo_path: Option<String>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/drones", get(drones))
        .route("/signals", get(signals))
        .route("/config", get(config))
        .route("/update/check", get(update_check))
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> impl IntoResponse {
    StatusCode::NOT_FOUND
}

async fn status(State(state): State<ApiState>) -> impl IntoResponse {
    match state.last_system_status.lock().await.clone() {
        Some(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

fn track_dto(track: Track, track_type: &'static str) -> Value {
    let mut dto = serde_json::to_value(&track).unwrap_or_default();
    if let Value::Object(map) = &mut dto {
        map.insert("track_type".to_string(), json!(track_type));
    }
    dto
}

async fn drones(State(state): State<ApiState>) -> impl IntoResponse {
    let mut drones: Vec<Value> = state
        .registry
        .snapshot()
        .await
        .into_iter()
        .map(|t| {
            let kind = if matches!(t.kind, dragonsync_formats::ObservationKind::AircraftAdsb | dragonsync_formats::ObservationKind::AircraftUat) {
                "aircraft"
            } else {
                "drone"
            };
            track_dto(t, kind)
        })
        .collect();

    if let Some(cache) = &state.adsb_cache {
        for track in cache.snapshot() {
            drones.push(track_dto(track, "aircraft"));
        }
    }

    Json(json!({ "drones": drones }))
}

async fn signals(State(state): State<ApiState>) -> impl IntoResponse {
    Json(json!({ "signals": state.signals.snapshot().await }))
}

async fn config(State(state): State<ApiState>) -> impl IntoResponse {
    Json((*state.redacted_config).clone())
}

async fn update_check(State(state): State<ApiState>) -> impl IntoResponse {
    match run_update_check(state.repo_path.as_deref()).await {
        Ok(value) => Json(value),
        Err(err) => Json(json!({ "ok": false, "error": err.to_string() })),
    }
}

async fn run_git(repo: &str, args: &[&str], timeout: Duration) -> Result<String, String> {
    let output = tokio::time::timeout(
        timeout,
        tokio::process::Command::new("git")
            .arg("-C")
            .arg(repo)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output(),
    )
    .await
    .map_err(|_| format!("git {args:?} timed out"))?
    .map_err(|err| err.to_string())?;

    if !output.status.success() {
        return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

async fn run_update_check(repo_override: Option<&str>) -> Result<Value, String> {
    let repo = repo_override
        .map(str::to_string)
        .or_else(|| std::env::var("DRAGONSYNC_REPO").ok())
        .unwrap_or_else(|| ".".to_string());

    let toplevel = run_git(&repo, &["rev-parse", "--show-toplevel"], Duration::from_secs(3)).await?;
    let head = run_git(&toplevel, &["rev-parse", "HEAD"], Duration::from_secs(3)).await?;
    let branch = run_git(&toplevel, &["rev-parse", "--abbrev-ref", "HEAD"], Duration::from_secs(3)).await?;
    let remote = run_git(&toplevel, &["ls-remote", "origin", &branch], Duration::from_secs(5)).await?;
    let remote_head = remote.split_whitespace().next().unwrap_or_default().to_string();

    Ok(json!({
        "ok": true,
        "head": head,
        "branch": branch,
        "remote_head": remote_head,
        "up_to_date": remote_head == head,
    }))
}

/// Replaces every field the config model marks as secret with `"***"`,
/// leaving the key present so API consumers can see a credential is
/// configured without exposing it.
pub fn redact_secrets(mut value: Value, secret_keys: &[&str]) -> Value {
    fn walk(value: &mut Value, secret_keys: &[&str]) {
        match value {
            Value::Object(map) => {
                for (key, v) in map.iter_mut() {
                    if secret_keys.contains(&key.as_str()) && !v.is_null() {
                        *v = json!("***");
                    } else {
                        walk(v, secret_keys);
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    walk(item, secret_keys);
                }
            }
            _ => {}
        }
    }
    walk(&mut value, secret_keys);
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_secrets_replaces_named_fields_only() {
        let value = json!({
            "mqtt": { "password": "hunter2", "host": "broker" },
            "third_party_token": "abc123",
            "nested": [{ "pkcs12_password": "p12pass" }],
        });
        let redacted = redact_secrets(value, &["password", "third_party_token", "pkcs12_password"]);
        assert_eq!(redacted["mqtt"]["password"], json!("***"));
        assert_eq!(redacted["mqtt"]["host"], json!("broker"));
        assert_eq!(redacted["third_party_token"], json!("***"));
        assert_eq!(redacted["nested"][0]["pkcs12_password"], json!("***"));
    }
}
