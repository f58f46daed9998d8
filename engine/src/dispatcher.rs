//! The Dispatcher: one tick loop driving track emission, plus an
//! ingest loop routing each `SourceEvent` to the registry, the signal
//! store, or straight to the system-status sinks.

use crate::enrichment::EnrichmentWorker;
use crate::registry::{TickAction, TrackRegistry};
use crate::signals::SignalStore;
use crate::sinks::Sink;
use chrono::Utc;
use dragonsync_formats::{cot_type_for, home_event, pilot_event, terminal_event, track_event, ObservationKind, Position};
use dragonsync_sources::SourceEvent;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

pub struct DispatcherConfig {
    pub tick_interval: Duration,
    pub rate_limit: Duration,
    pub inactivity_timeout: Duration,
    pub keep_alive_interval: Duration,
    pub kit_id: String,
}

pub struct Dispatcher {
    registry: Arc<TrackRegistry>,
    signal_store: Arc<SignalStore>,
    sinks: Vec<Arc<dyn Sink>>,
    config: DispatcherConfig,
    enrichment: Option<Arc<EnrichmentWorker>>,
    status_mirror: Option<Arc<Mutex<Option<Value>>>>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<TrackRegistry>,
        signal_store: Arc<SignalStore>,
        sinks: Vec<Arc<dyn Sink>>,
        config: DispatcherConfig,
    ) -> Self {
        Self { registry, signal_store, sinks, config, enrichment: None, status_mirror: None }
    }

    /// Attaches the serial-number enrichment worker; newly admitted
    /// drone tracks are then offered up for lookup as they arrive.
    pub fn with_enrichment(mut self, worker: Arc<EnrichmentWorker>) -> Self {
        self.enrichment = Some(worker);
        self
    }

    /// Attaches a slot the most recent raw system-status payload is
    /// mirrored into, for the ApiFacade's `/status` route to read.
    pub fn with_status_mirror(mut self, mirror: Arc<Mutex<Option<Value>>>) -> Self {
        self.status_mirror = Some(mirror);
        self
    }

    /// Drives the tick loop until `cancel` fires.
    pub async fn run_ticks(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,
                _ = cancel.cancelled() => break,
            }
        }
    }

    async fn tick(&self) {
        let now = Utc::now();
        self.signal_store.sweep_expired(now).await;

        let actions = self
            .registry
            .tick(
                now,
                self.config.inactivity_timeout,
                self.config.rate_limit,
                self.config.keep_alive_interval,
            )
            .await;

        for action in actions {
            match action {
                TickAction::Emit(track) => {
                    let xml = track_event(&track, self.config.inactivity_timeout.as_secs() as i64);
                    self.for_each_sink_track(&track, &xml).await;

                    if !track.partial {
                        if let Some(xml) = pilot_event(&track) {
                            self.for_each_sink_pilot(&xml).await;
                        }
                        if let Some(xml) = home_event(&track) {
                            self.for_each_sink_home(&xml).await;
                        }
                    }
                }
                TickAction::Terminal(track) => {
                    let cot_type = cot_type_for(&track);
                    let xml = terminal_event(&track.uid, cot_type);
                    self.for_each_sink_track(&track, &xml).await;
                    for sink in &self.sinks {
                        if sink.capabilities().lifecycle {
                            if let Err(err) = sink.mark_inactive(&track.uid).await {
                                warn!(sink = sink.name(), "mark_inactive failed: {err}");
                            }
                        }
                    }
                }
            }
        }
    }

    async fn for_each_sink_track(&self, track: &dragonsync_formats::Track, xml: &str) {
        for sink in &self.sinks {
            if sink.capabilities().track {
                if let Err(err) = sink.publish_track(track, xml).await {
                    error!(sink = sink.name(), "publish_track failed: {err}");
                }
            }
        }
    }

    async fn for_each_sink_pilot(&self, xml: &str) {
        for sink in &self.sinks {
            if sink.capabilities().pair {
                if let Err(err) = sink.publish_pilot(xml).await {
                    error!(sink = sink.name(), "publish_pilot failed: {err}");
                }
            }
        }
    }

    async fn for_each_sink_home(&self, xml: &str) {
        for sink in &self.sinks {
            if sink.capabilities().pair {
                if let Err(err) = sink.publish_home(xml).await {
                    error!(sink = sink.name(), "publish_home failed: {err}");
                }
            }
        }
    }

    async fn for_each_sink_system(&self, xml: &str) {
        for sink in &self.sinks {
            if sink.capabilities().system {
                if let Err(err) = sink.publish_system(xml).await {
                    error!(sink = sink.name(), "publish_system failed: {err}");
                }
            }
        }
    }

    /// Consumes normalized events until `cancel` fires or every source
    /// has dropped its sender.
    pub async fn run_ingest(&self, mut rx: UnboundedReceiver<SourceEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Some(SourceEvent::Observation(obs)) => {
                            let uid = obs.uid.clone();
                            self.registry.upsert(obs).await;
                            if let Some(uid) = uid {
                                self.maybe_request_enrichment(&uid).await;
                            }
                        }
                        Some(SourceEvent::Fpv { signal, observer }) => {
                            self.signal_store.add(signal, observer, Utc::now()).await;
                        }
                        Some(SourceEvent::SystemStatus(raw)) => self.handle_system_status(&raw).await,
                        None => break,
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    }

    /// Offers a freshly admitted/updated drone track's serial number to
    /// the enrichment worker, if one is attached and the track hasn't
    /// already been looked up.
    async fn maybe_request_enrichment(&self, uid: &str) {
        let Some(worker) = &self.enrichment else { return };
        let Some(track) = self.registry.get(uid).await else { return };
        if track.kind != ObservationKind::Drone || track.enrichment.attempted {
            return;
        }
        let Some(serial) = uid.strip_prefix("drone-") else { return };
        worker.request(uid, serial).await;
    }

    async fn handle_system_status(&self, raw: &Value) {
        if let Some(mirror) = &self.status_mirror {
            *mirror.lock().await = Some(raw.clone());
        }

        let gps = raw.get("gps_data");
        let lat = gps.and_then(|g| g.get("latitude")).and_then(Value::as_f64);
        let lon = gps.and_then(|g| g.get("longitude")).and_then(Value::as_f64);
        let (Some(lat), Some(lon)) = (lat, lon) else {
            warn!("system status payload missing gps_data.latitude/longitude, dropping");
            return;
        };
        let alt_m = gps.and_then(|g| g.get("altitude")).and_then(Value::as_f64).unwrap_or(0.0);
        let course = gps.and_then(|g| g.get("track")).and_then(Value::as_f64).unwrap_or(0.0);
        let speed = gps.and_then(|g| g.get("speed")).and_then(Value::as_f64).unwrap_or(0.0);

        let serial = raw.get("serial_number").and_then(Value::as_str).unwrap_or(&self.config.kit_id);
        let remarks = system_stats_remarks(serial, raw.get("system_stats"), raw.get("ant_sdr_temps"));

        let pos = Position { lat, lon, alt_m };
        let xml = dragonsync_formats::system_event(&self.config.kit_id, pos, course, speed, &remarks);
        self.for_each_sink_system(&xml).await;
    }
}

/// Folds the kit's `system_stats` (and optional SDR temperatures) into
/// a single CoT remarks line.
fn system_stats_remarks(serial: &str, stats: Option<&Value>, sdr_temps: Option<&Value>) -> String {
    let mut parts = vec![format!("serial={serial}")];

    if let Some(stats) = stats {
        if let Some(cpu) = stats.get("cpu_usage").and_then(Value::as_f64) {
            parts.push(format!("cpu={cpu:.1}%"));
        }
        if let Some(temp) = stats.get("temperature").and_then(Value::as_f64) {
            parts.push(format!("temp={temp:.1}C"));
        }
        if let Some(mem) = stats.get("memory") {
            if let (Some(total), Some(avail)) =
                (mem.get("total").and_then(Value::as_f64), mem.get("available").and_then(Value::as_f64))
            {
                parts.push(format!("mem={avail:.0}/{total:.0}"));
            }
        }
        if let Some(disk) = stats.get("disk") {
            if let (Some(total), Some(used)) =
                (disk.get("total").and_then(Value::as_f64), disk.get("used").and_then(Value::as_f64))
            {
                parts.push(format!("disk={used:.0}/{total:.0}"));
            }
        }
        if let Some(uptime) = stats.get("uptime").and_then(Value::as_f64) {
            parts.push(format!("uptime={uptime:.0}s"));
        }
    }

    if let Some(sdr) = sdr_temps {
        if let Some(pluto) = sdr.get("pluto_temp").and_then(Value::as_f64) {
            parts.push(format!("pluto={pluto:.1}C"));
        }
        if let Some(zynq) = sdr.get("zynq_temp").and_then(Value::as_f64) {
            parts.push(format!("zynq={zynq:.1}C"));
        }
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryLimits;
    use crate::signals::SignalStoreLimits;
    use crate::sinks::{SinkCapabilities};
    use async_trait::async_trait;
    use dragonsync_formats::{Auxiliary, Identity, Kinematics, Observation, ObservationKind, Position, Quality};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        tracks: AtomicUsize,
        terminals: AtomicUsize,
    }

    #[async_trait]
    impl Sink for CountingSink {
        fn name(&self) -> &str {
            "counting"
        }

        fn capabilities(&self) -> SinkCapabilities {
            SinkCapabilities { track: true, pair: false, system: false, lifecycle: true }
        }

        async fn publish_track(&self, _track: &dragonsync_formats::Track, _xml: &str) -> Result<(), crate::error::SinkError> {
            self.tracks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn mark_inactive(&self, _uid: &str) -> Result<(), crate::error::SinkError> {
            self.terminals.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

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
            seen_by: None,
            partial: false,
        }
    }

    #[tokio::test]
    async fn tick_emits_to_track_capable_sinks() {
        let registry = Arc::new(TrackRegistry::new(RegistryLimits::default()));
        let signals = Arc::new(SignalStore::new(SignalStoreLimits::default()));
        let sink = Arc::new(CountingSink { tracks: AtomicUsize::new(0), terminals: AtomicUsize::new(0) });
        registry.upsert(obs("drone-A")).await;

        let dispatcher = Dispatcher::new(
            registry,
            signals,
            vec![sink.clone()],
            DispatcherConfig {
                tick_interval: Duration::from_secs(1),
                rate_limit: Duration::from_secs(0),
                inactivity_timeout: Duration::from_secs(60),
                keep_alive_interval: Duration::from_secs(10),
                kit_id: "kit-1".into(),
            },
        );
        dispatcher.tick().await;

        assert_eq!(sink.tracks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn terminal_action_calls_mark_inactive() {
        let registry = Arc::new(TrackRegistry::new(RegistryLimits::default()));
        let signals = Arc::new(SignalStore::new(SignalStoreLimits::default()));
        let sink = Arc::new(CountingSink { tracks: AtomicUsize::new(0), terminals: AtomicUsize::new(0) });
        registry.upsert(obs("drone-A")).await;

        let dispatcher = Dispatcher::new(
            registry,
            signals,
            vec![sink.clone()],
            DispatcherConfig {
                tick_interval: Duration::from_secs(1),
                rate_limit: Duration::from_secs(1),
                inactivity_timeout: Duration::from_secs(0),
                keep_alive_interval: Duration::from_secs(10),
                kit_id: "kit-1".into(),
            },
        );
        dispatcher.tick().await;

        assert_eq!(sink.terminals.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stats_remarks_includes_serial_and_present_fields() {
        let stats = serde_json::json!({
            "cpu_usage": 12.5,
            "temperature": 44.0,
            "memory": { "total": 2048.0, "available": 1024.0 },
            "disk": { "total": 16000.0, "used": 4000.0 },
            "uptime": 3600.0,
        });
        let remarks = system_stats_remarks("WD-1234", Some(&stats), None);
        assert!(remarks.contains("serial=WD-1234"));
        assert!(remarks.contains("cpu=12.5%"));
        assert!(remarks.contains("temp=44.0C"));
        assert!(remarks.contains("mem=1024/2048"));
        assert!(remarks.contains("disk=4000/16000"));
        assert!(remarks.contains("uptime=3600s"));
    }

    #[test]
    fn stats_remarks_includes_sdr_temps_when_present() {
        let sdr = serde_json::json!({ "pluto_temp": 39.2, "zynq_temp": 41.8 });
        let remarks = system_stats_remarks("WD-1234", None, Some(&sdr));
        assert_eq!(remarks, "serial=WD-1234 pluto=39.2C zynq=41.8C");
    }

    #[tokio::test]
    async fn system_status_with_gps_data_emits_and_mirrors() {
        let registry = Arc::new(TrackRegistry::new(RegistryLimits::default()));
        let signals = Arc::new(SignalStore::new(SignalStoreLimits::default()));
        let sink = Arc::new(CountingSink { tracks: AtomicUsize::new(0), terminals: AtomicUsize::new(0) });
        let mirror = Arc::new(tokio::sync::Mutex::new(None));

        let dispatcher = Dispatcher::new(
            registry,
            signals,
            vec![sink],
            DispatcherConfig {
                tick_interval: Duration::from_secs(1),
                rate_limit: Duration::from_secs(1),
                inactivity_timeout: Duration::from_secs(60),
                keep_alive_interval: Duration::from_secs(10),
                kit_id: "kit-1".into(),
            },
        )
        .with_status_mirror(mirror.clone());

        let raw = serde_json::json!({
            "serial_number": "WD-9999",
            "gps_data": { "latitude": 1.0, "longitude": 2.0, "altitude": 10.0, "speed": 0.0, "track": 0.0 },
            "system_stats": { "cpu_usage": 5.0 },
        });
        dispatcher.handle_system_status(&raw).await;

        assert_eq!(mirror.lock().await.as_ref(), Some(&raw));
    }
}
