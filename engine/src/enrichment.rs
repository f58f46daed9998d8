//! FAA serial-number enrichment: a synchronous local-DB fast path plus
//! a single background worker that rate-limits the network fallback,
//! tracks persistent misses in a bounded FIFO, and disables itself on
//! repeated backend failure.

use crate::error::EnrichmentError;
use crate::registry::TrackRegistry;
use async_trait::async_trait;
use dragonsync_formats::Enrichment;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

#[derive(Clone, Copy, Debug)]
pub struct EnrichmentConfig {
    pub rid_rate_limit: Duration,
    pub queue_capacity: usize,
    pub near_capacity_threshold: usize,
    pub miss_cache_capacity: usize,
    pub consecutive_failure_limit: u32,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            rid_rate_limit: Duration::from_secs(1),
            queue_capacity: 256,
            near_capacity_threshold: 100,
            miss_cache_capacity: 1000,
            consecutive_failure_limit: 5,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LookupFields {
    pub tracking_id: Option<String>,
    pub status: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub source: Option<String>,
}

#[derive(Clone, Debug)]
pub enum LookupOutcome {
    Found(LookupFields),
    NotFound,
}

/// Backend for serial-to-registration lookups. `lookup_local` is the
/// synchronous fast path (local database only, no network); `resolve`
/// is the full lookup the background worker calls.
#[async_trait]
pub trait SerialLookup: Send + Sync {
    fn lookup_local(&self, serial: &str) -> Option<LookupOutcome>;

    async fn resolve(
        &self,
        serial: &str,
        use_api_fallback: bool,
        add_to_db: bool,
    ) -> Result<LookupOutcome, EnrichmentError>;
}

struct MissCache {
    order: VecDeque<String>,
    set: HashSet<String>,
    capacity: usize,
}

impl MissCache {
    fn new(capacity: usize) -> Self {
        Self { order: VecDeque::new(), set: HashSet::new(), capacity }
    }

    fn contains(&self, serial: &str) -> bool {
        self.set.contains(serial)
    }

    fn insert(&mut self, serial: String) {
        if self.set.contains(&serial) {
            return;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }
        self.set.insert(serial.clone());
        self.order.push_back(serial);
    }
}

struct EnrichmentJob {
    uid: String,
    serial: String,
}

pub struct EnrichmentWorker {
    tx: mpsc::Sender<EnrichmentJob>,
    lookup: Arc<dyn SerialLookup>,
    registry: Arc<TrackRegistry>,
    miss_cache: Mutex<MissCache>,
    disabled: AtomicBool,
    consecutive_failures: AtomicU32,
    config: EnrichmentConfig,
}

impl EnrichmentWorker {
    pub fn spawn(
        lookup: Arc<dyn SerialLookup>,
        registry: Arc<TrackRegistry>,
        config: EnrichmentConfig,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let worker = Arc::new(Self {
            tx,
            lookup,
            registry,
            miss_cache: Mutex::new(MissCache::new(config.miss_cache_capacity)),
            disabled: AtomicBool::new(false),
            consecutive_failures: AtomicU32::new(0),
            config,
        });
        let background = worker.clone();
        tokio::spawn(async move { background.run(rx, cancel).await });
        worker
    }

    /// Attempts the synchronous local-DB lookup; on a miss, queues the
    /// network fallback unless the queue is near capacity or the miss
    /// cache already remembers this serial as unresolvable.
    pub async fn request(&self, uid: &str, serial: &str) {
        if self.disabled.load(Ordering::Relaxed) {
            return;
        }
        if self.miss_cache.lock().await.contains(serial) {
            return;
        }
        if let Some(outcome) = self.lookup.lookup_local(serial) {
            self.apply(uid, serial, outcome).await;
            return;
        }

        let in_flight = self.config.queue_capacity.saturating_sub(self.tx.capacity());
        if in_flight >= self.config.near_capacity_threshold {
            warn!(uid, serial, "enrichment queue near capacity, dropping async fallback");
            return;
        }

        self.registry
            .apply_enrichment(uid, Enrichment { attempted: true, pending: true, ..Enrichment::default() })
            .await;

        if self.tx.try_send(EnrichmentJob { uid: uid.to_string(), serial: serial.to_string() }).is_err() {
            warn!(uid, serial, "enrichment queue full, dropping job");
        }
    }

    async fn apply(&self, uid: &str, serial: &str, outcome: LookupOutcome) {
        match outcome {
            LookupOutcome::Found(fields) => {
                self.registry
                    .apply_enrichment(
                        uid,
                        Enrichment {
                            attempted: true,
                            success: true,
                            pending: false,
                            tracking_id: fields.tracking_id,
                            status: fields.status,
                            make: fields.make,
                            model: fields.model,
                            source: fields.source,
                        },
                    )
                    .await;
            }
            LookupOutcome::NotFound => {
                self.miss_cache.lock().await.insert(serial.to_string());
                self.registry
                    .apply_enrichment(uid, Enrichment { attempted: true, pending: false, ..Enrichment::default() })
                    .await;
            }
        }
    }

    async fn run(&self, mut rx: mpsc::Receiver<EnrichmentJob>, cancel: CancellationToken) {
        let mut last_call: Option<Instant> = None;
        loop {
            let job = tokio::select! {
                job = rx.recv() => job,
                _ = cancel.cancelled() => break,
            };
            let Some(job) = job else { break };

            if self.disabled.load(Ordering::Relaxed) {
                continue;
            }

            if let Some(prev) = last_call {
                let elapsed = prev.elapsed();
                if elapsed < self.config.rid_rate_limit {
                    tokio::time::sleep(self.config.rid_rate_limit - elapsed).await;
                }
            }
            last_call = Some(Instant::now());

            match self.lookup.resolve(&job.serial, true, true).await {
                Ok(outcome) => {
                    self.consecutive_failures.store(0, Ordering::Relaxed);
                    self.apply(&job.uid, &job.serial, outcome).await;
                }
                Err(err) => {
                    debug!(uid = job.uid, serial = job.serial, "enrichment lookup failed: {err}");
                    let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                    if failures >= self.config.consecutive_failure_limit {
                        self.disabled.store(true, Ordering::Relaxed);
                        error!("enrichment backend failing repeatedly, disabling further lookups");
                    }
                }
            }
        }
    }
}

/// `SerialLookup` backed by a local JSON map (the "add_to_db" registry
/// a successful API resolution gets written into) plus an optional FAA
/// registry API fallback over HTTP.
pub struct FaaApiLookup {
    client: reqwest::Client,
    api_base_url: Option<String>,
    local_db: Mutex<std::collections::HashMap<String, LookupFields>>,
}

impl FaaApiLookup {
    pub fn new(api_base_url: Option<String>, seed_db: std::collections::HashMap<String, LookupFields>) -> Self {
        Self { client: reqwest::Client::new(), api_base_url, local_db: Mutex::new(seed_db) }
    }
}

#[async_trait]
impl SerialLookup for FaaApiLookup {
    fn lookup_local(&self, serial: &str) -> Option<LookupOutcome> {
        self.local_db.try_lock().ok()?.get(serial).cloned().map(LookupOutcome::Found)
    }

    async fn resolve(&self, serial: &str, use_api_fallback: bool, add_to_db: bool) -> Result<LookupOutcome, EnrichmentError> {
        if let Some(fields) = self.local_db.lock().await.get(serial).cloned() {
            return Ok(LookupOutcome::Found(fields));
        }

        let Some(base_url) = &self.api_base_url else {
            return Err(EnrichmentError::Disabled);
        };
        if !use_api_fallback {
            return Ok(LookupOutcome::NotFound);
        }

        let resp = self.client.get(format!("{base_url}/{serial}")).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(LookupOutcome::NotFound);
        }
        let body: Value = resp.error_for_status()?.json().await?;
        let Some(make) = body.get("make").and_then(Value::as_str) else {
            return Ok(LookupOutcome::NotFound);
        };

        let fields = LookupFields {
            tracking_id: body.get("tracking_id").and_then(Value::as_str).map(str::to_string),
            status: body.get("status").and_then(Value::as_str).map(str::to_string),
            make: Some(make.to_string()),
            model: body.get("model").and_then(Value::as_str).map(str::to_string),
            source: Some("faa-api".to_string()),
        };

        if add_to_db {
            self.local_db.lock().await.insert(serial.to_string(), fields.clone());
        }
        Ok(LookupOutcome::Found(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryLimits;
    use chrono::Utc;
    use dragonsync_formats::{Auxiliary, Identity, Kinematics, Observation, ObservationKind, Position, Quality};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration as StdDuration;

    struct StubLookup {
        local_hit: bool,
        network_calls: AtomicUsize,
    }

    #[async_trait]
    impl SerialLookup for StubLookup {
        fn lookup_local(&self, _serial: &str) -> Option<LookupOutcome> {
            if self.local_hit {
                Some(LookupOutcome::Found(LookupFields {
                    tracking_id: Some("T1".into()),
                    status: Some("registered".into()),
                    make: Some("Acme".into()),
                    model: Some("X1".into()),
                    source: Some("local".into()),
                }))
            } else {
                None
            }
        }

        async fn resolve(&self, _serial: &str, _use_api_fallback: bool, _add_to_db: bool) -> Result<LookupOutcome, EnrichmentError> {
            self.network_calls.fetch_add(1, Ordering::SeqCst);
            Ok(LookupOutcome::NotFound)
        }
    }

    async fn registry_with_track(uid: &str) -> Arc<TrackRegistry> {
        let reg = Arc::new(TrackRegistry::new(RegistryLimits::default()));
        reg.upsert(Observation {
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
        })
        .await;
        reg
    }

    #[tokio::test]
    async fn local_hit_resolves_without_queueing() {
        let registry = registry_with_track("drone-A").await;
        let lookup = Arc::new(StubLookup { local_hit: true, network_calls: AtomicUsize::new(0) });
        let worker = EnrichmentWorker::spawn(lookup.clone(), registry.clone(), EnrichmentConfig::default(), CancellationToken::new());

        worker.request("drone-A", "SERIAL1").await;

        let track = registry.get("drone-A").await.unwrap();
        assert!(track.enrichment.success);
        assert_eq!(track.enrichment.make.as_deref(), Some("Acme"));
        assert_eq!(lookup.network_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn local_miss_queues_and_marks_pending_then_resolves_via_worker() {
        let registry = registry_with_track("drone-B").await;
        let lookup = Arc::new(StubLookup { local_hit: false, network_calls: AtomicUsize::new(0) });
        let config = EnrichmentConfig { rid_rate_limit: Duration::from_millis(0), ..EnrichmentConfig::default() };
        let worker = EnrichmentWorker::spawn(lookup.clone(), registry.clone(), config, CancellationToken::new());

        worker.request("drone-B", "SERIAL2").await;
        let track = registry.get("drone-B").await.unwrap();
        assert!(track.enrichment.pending);

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert_eq!(lookup.network_calls.load(Ordering::SeqCst), 1);
        let track = registry.get("drone-B").await.unwrap();
        assert!(!track.enrichment.pending);
        assert!(!track.enrichment.success);
    }

    #[test]
    fn miss_cache_evicts_oldest_past_capacity() {
        let mut cache = MissCache::new(2);
        cache.insert("a".into());
        cache.insert("b".into());
        cache.insert("c".into());
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[tokio::test]
    async fn faa_lookup_seeded_db_resolves_without_api() {
        let mut seed = std::collections::HashMap::new();
        seed.insert(
            "SERIALX".to_string(),
            LookupFields {
                tracking_id: None,
                status: Some("registered".into()),
                make: Some("DJI".into()),
                model: Some("Mavic 3".into()),
                source: Some("local".into()),
            },
        );
        let lookup = FaaApiLookup::new(None, seed);
        let outcome = lookup.lookup_local("SERIALX").expect("seeded entry should resolve");
        assert!(matches!(outcome, LookupOutcome::Found(fields) if fields.make.as_deref() == Some("DJI")));
        assert!(lookup.lookup_local("UNKNOWN").is_none());
    }
}
