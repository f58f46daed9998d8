//! SignalStore: the FPV-alert side store. Holds short-lived
//! `SignalAlert` entries, capped and FIFO-evicted, queried by the
//! ApiFacade; never interacts with track admission.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dragonsync_common::offset_latlon;
use dragonsync_formats::normalize::fpv::FpvSignal;
use dragonsync_formats::{Position, SignalAlert};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;

pub struct SignalStoreLimits {
    pub ttl: Duration,
    pub capacity: usize,
    pub plot_radius_m: f64,
}

impl Default for SignalStoreLimits {
    fn default() -> Self {
        Self { ttl: Duration::from_secs(60), capacity: 200, plot_radius_m: 150.0 }
    }
}

struct Inner {
    alerts: HashMap<String, SignalAlert>,
    order: VecDeque<String>,
}

pub struct SignalStore {
    limits: SignalStoreLimits,
    inner: Mutex<Inner>,
}

impl SignalStore {
    pub fn new(limits: SignalStoreLimits) -> Self {
        Self { limits, inner: Mutex::new(Inner { alerts: HashMap::new(), order: VecDeque::new() }) }
    }

    /// Computes the deterministic plotted offset from `observer` and
    /// inserts (or refreshes) the alert, evicting the oldest entry by
    /// insertion order if the store is at capacity.
    pub async fn add(&self, signal: FpvSignal, observer: Position, now: DateTime<Utc>) {
        let (d_north_m, d_east_m) = offset_latlon(observer.lat, observer.lon, self.limits.plot_radius_m, &signal.uid);
        let position = apply_offset(observer, d_north_m, d_east_m);

        let alert = SignalAlert {
            uid: signal.uid.clone(),
            source: signal.source,
            position,
            radius_m: self.limits.plot_radius_m,
            frequency_hz: Some(signal.frequency_hz),
            bandwidth_hz: signal.bandwidth_hz,
            seen_by: None,
            observed_at: now,
            expires_at: now + ChronoDuration::from_std(self.limits.ttl).unwrap_or_default(),
        };

        let mut inner = self.inner.lock().await;
        if !inner.alerts.contains_key(&signal.uid) && inner.order.len() >= self.limits.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.alerts.remove(&oldest);
            }
        }
        if !inner.alerts.contains_key(&signal.uid) {
            inner.order.push_back(signal.uid.clone());
        }
        inner.alerts.insert(signal.uid, alert);
    }

    /// Drops every alert whose `expires_at` has passed.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.lock().await;
        let expired: Vec<String> =
            inner.alerts.iter().filter(|(_, a)| a.expires_at <= now).map(|(uid, _)| uid.clone()).collect();
        for uid in expired {
            inner.alerts.remove(&uid);
            inner.order.retain(|u| u != &uid);
        }
    }

    pub async fn snapshot(&self) -> Vec<SignalAlert> {
        self.inner.lock().await.alerts.values().cloned().collect()
    }
}

fn apply_offset(observer: Position, d_north_m: f64, d_east_m: f64) -> Position {
    const METERS_PER_DEG_LAT: f64 = 111_320.0;
    let lat_rad = observer.lat.to_radians();
    let meters_per_deg_lon = METERS_PER_DEG_LAT * lat_rad.cos().max(1e-6);
    Position {
        lat: observer.lat + d_north_m / METERS_PER_DEG_LAT,
        lon: observer.lon + d_east_m / meters_per_deg_lon,
        alt_m: observer.alt_m,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(uid: &str) -> FpvSignal {
        FpvSignal {
            uid: uid.to_string(),
            source: Some("confirm".into()),
            frequency_hz: 5_800_000_000.0,
            bandwidth_hz: None,
            confirmed: true,
        }
    }

    #[tokio::test]
    async fn add_and_snapshot_roundtrips() {
        let store = SignalStore::new(SignalStoreLimits::default());
        let observer = Position { lat: 34.0, lon: -117.0, alt_m: 0.0 };
        store.add(signal("fpv-1"), observer, Utc::now()).await;

        let snap = store.snapshot().await;
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].uid, "fpv-1");
    }

    #[tokio::test]
    async fn capacity_overflow_evicts_oldest() {
        let store = SignalStore::new(SignalStoreLimits { capacity: 1, ..SignalStoreLimits::default() });
        let observer = Position { lat: 34.0, lon: -117.0, alt_m: 0.0 };
        store.add(signal("fpv-1"), observer, Utc::now()).await;
        store.add(signal("fpv-2"), observer, Utc::now()).await;

        let snap = store.snapshot().await;
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].uid, "fpv-2");
    }

    #[tokio::test]
    async fn sweep_expired_removes_past_ttl_entries() {
        let store = SignalStore::new(SignalStoreLimits::default());
        let observer = Position { lat: 34.0, lon: -117.0, alt_m: 0.0 };
        let now = Utc::now();
        store.add(signal("fpv-1"), observer, now - ChronoDuration::seconds(120)).await;

        store.sweep_expired(now).await;
        assert!(store.snapshot().await.is_empty());
    }
}
