//! Third-party/Lattice HTTP sink: rate-controlled independently for
//! drone tracks and system-status updates; excess publishes within the
//! rate window are dropped internally rather than queued.

use crate::error::SinkError;
use crate::sinks::{Sink, SinkCapabilities};
use async_trait::async_trait;
use dragonsync_formats::Track;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

pub struct ThirdPartySink {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    drone_interval: Duration,
    wardragon_interval: Duration,
    last_drone_sent: Mutex<Option<Instant>>,
    last_system_sent: Mutex<Option<Instant>>,
}

impl ThirdPartySink {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        token: Option<String>,
        drone_hz: f64,
        wardragon_hz: f64,
    ) -> Self {
        Self {
            name: name.into(),
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token,
            drone_interval: Duration::from_secs_f64(1.0 / drone_hz.max(0.001)),
            wardragon_interval: Duration::from_secs_f64(1.0 / wardragon_hz.max(0.001)),
            last_drone_sent: Mutex::new(None),
            last_system_sent: Mutex::new(None),
        }
    }

    async fn due(gate: &Mutex<Option<Instant>>, interval: Duration) -> bool {
        let mut last = gate.lock().await;
        let now = Instant::now();
        let due = match *last {
            Some(prev) => now.duration_since(prev) >= interval,
            None => true,
        };
        if due {
            *last = Some(now);
        }
        due
    }

    async fn post(&self, path: &str, body: serde_json::Value) {
        let mut req = self.client.post(format!("{}/{}", self.endpoint, path)).json(&body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        if let Err(err) = req.send().await {
            warn!(sink = %self.name, "third-party publish failed: {err}");
        }
    }
}

#[async_trait]
impl Sink for ThirdPartySink {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> SinkCapabilities {
        SinkCapabilities { track: true, pair: false, system: true, lifecycle: false }
    }

    async fn publish_track(&self, track: &Track, _xml: &str) -> Result<(), SinkError> {
        if !Self::due(&self.last_drone_sent, self.drone_interval).await {
            return Ok(());
        }
        let body = serde_json::to_value(track).unwrap_or_default();
        self.post("drones", body).await;
        Ok(())
    }

    async fn publish_system(&self, xml: &str) -> Result<(), SinkError> {
        if !Self::due(&self.last_system_sent, self.wardragon_interval).await {
            return Ok(());
        }
        self.post("system", serde_json::json!({ "cot": xml })).await;
        Ok(())
    }
}
