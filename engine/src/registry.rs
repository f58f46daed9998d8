//! The TrackRegistry: per-uid admission with a MAC-spam guard, two-pool
//! (trusted/opportunistic) capacity, and a mutation pass that updates
//! tracks in place rather than replacing them (see
//! `dragonsync_formats::Track::merge_observation`).

use chrono::{DateTime, Utc};
use dragonsync_formats::{Enrichment, Observation, Track, TrustLevel};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

/// Tunables the two-pool admission and MAC-spam guard are governed by.
#[derive(Clone, Copy, Debug)]
pub struct RegistryLimits {
    pub max_trusted: usize,
    pub max_opportunistic: usize,
    /// MAC-spam sliding window (`W` in the admission rules).
    pub mac_spam_window: Duration,
    /// Distinct-uid threshold within the window (`K`).
    pub mac_spam_threshold: usize,
    /// Backoff duration once the threshold is exceeded (`B`).
    pub mac_spam_backoff: Duration,
}

impl Default for RegistryLimits {
    fn default() -> Self {
        Self {
            max_trusted: 30,
            max_opportunistic: 30,
            mac_spam_window: Duration::from_secs(30),
            mac_spam_threshold: 5,
            mac_spam_backoff: Duration::from_secs(60),
        }
    }
}

/// Action the Dispatcher must take for a track this tick, produced by
/// [`TrackRegistry::tick`] while the registry lock is held so the
/// last-sent bookkeeping stays consistent with what's reported here.
#[derive(Clone, Debug)]
pub enum TickAction {
    /// A full update or keepalive refresh; `stale` is the caller's
    /// responsibility to compute from `inactivity_timeout`.
    Emit(Track),
    /// The track went inactive this tick and has already been removed
    /// from the registry.
    Terminal(Track),
}

struct Inner {
    tracks: HashMap<String, Track>,
    trusted_order: VecDeque<String>,
    opportunistic_order: VecDeque<String>,
    mac_window: HashMap<String, VecDeque<DateTime<Utc>>>,
    mac_backoff: HashMap<String, DateTime<Utc>>,
    next_seq: u64,
}

pub struct TrackRegistry {
    limits: RegistryLimits,
    inner: Mutex<Inner>,
}

impl TrackRegistry {
    pub fn new(limits: RegistryLimits) -> Self {
        Self {
            limits,
            inner: Mutex::new(Inner {
                tracks: HashMap::new(),
                trusted_order: VecDeque::new(),
                opportunistic_order: VecDeque::new(),
                mac_window: HashMap::new(),
                mac_backoff: HashMap::new(),
                next_seq: 0,
            }),
        }
    }

    /// Admits a new track or mutates an existing one. CAA-only
    /// observations (no `uid`, has `mac`) are matched against existing
    /// tracks by MAC and dropped unless exactly one match exists.
    pub async fn upsert(&self, obs: Observation) {
        let mut inner = self.inner.lock().await;

        let Some(uid) = obs.uid.clone() else {
            let Some(mac) = obs.identity.mac.clone() else {
                trace!("observation has neither uid nor mac, dropping");
                return;
            };
            let matches: Vec<String> = inner
                .tracks
                .values()
                .filter(|t| t.mac() == Some(mac.as_str()))
                .map(|t| t.uid.clone())
                .collect();
            if matches.len() == 1 {
                let uid = &matches[0];
                if let Some(track) = inner.tracks.get_mut(uid) {
                    track.merge_observation(obs);
                }
            } else {
                trace!(mac, matches = matches.len(), "CAA-only observation ambiguous or unmatched");
            }
            return;
        };

        if inner.tracks.contains_key(&uid) {
            if let Some(track) = inner.tracks.get_mut(&uid) {
                track.merge_observation(obs);
            }
            return;
        }

        if let Some(mac) = &obs.identity.mac {
            if Self::mac_in_backoff(&mut inner, mac, obs.observed_at) {
                debug!(mac, "rejecting new-uid admission: MAC in spam backoff");
                return;
            }
            Self::record_mac_sighting(
                &mut inner,
                mac.clone(),
                uid.clone(),
                obs.observed_at,
                self.limits.mac_spam_window,
                self.limits.mac_spam_threshold,
                self.limits.mac_spam_backoff,
            );
        }

        let pool_order_len = inner.opportunistic_order.len();
        if pool_order_len >= self.limits.max_opportunistic {
            let evicted = inner.opportunistic_order.pop_front();
            match evicted {
                Some(old_uid) => {
                    inner.tracks.remove(&old_uid);
                    debug!(evicted = old_uid, "evicted oldest opportunistic track to admit new one");
                }
                None => {
                    warn!("opportunistic pool full with no evictable member, dropping observation");
                    return;
                }
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let track = Track::from_observation(obs, seq);
        inner.opportunistic_order.push_back(uid.clone());
        inner.tracks.insert(uid, track);
    }

    fn mac_in_backoff(inner: &mut Inner, mac: &str, now: DateTime<Utc>) -> bool {
        match inner.mac_backoff.get(mac) {
            Some(until) if *until > now => true,
            Some(_) => {
                inner.mac_backoff.remove(mac);
                false
            }
            None => false,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record_mac_sighting(
        inner: &mut Inner,
        mac: String,
        uid: String,
        now: DateTime<Utc>,
        window: Duration,
        threshold: usize,
        backoff: Duration,
    ) {
        let entries = inner.mac_window.entry(mac.clone()).or_default();
        entries.push_back(now);
        let cutoff = now - chrono::Duration::from_std(window).unwrap_or_default();
        while entries.front().is_some_and(|t| *t < cutoff) {
            entries.pop_front();
        }
        let _ = &uid;
        if entries.len() > threshold {
            let until = now + chrono::Duration::from_std(backoff).unwrap_or_default();
            inner.mac_backoff.insert(mac, until);
        }
    }

    /// Promotes a track to the trusted pool, freeing its opportunistic
    /// slot, called by the enrichment worker on a successful lookup.
    pub async fn promote_to_trusted(&self, uid: &str) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner.tracks.contains_key(uid) {
            return false;
        }
        if inner.trusted_order.len() >= self.limits.max_trusted {
            trace!(uid, "trusted pool full, cannot promote");
            return false;
        }
        inner.opportunistic_order.retain(|u| u != uid);
        inner.trusted_order.push_back(uid.to_string());
        if let Some(track) = inner.tracks.get_mut(uid) {
            track.trust_level = TrustLevel::Trusted;
        }
        true
    }

    /// Sweeps every track: removes inactive ones (emitting a terminal
    /// action) and decides which survivors are due a full update or a
    /// keepalive refresh.
    pub async fn tick(
        &self,
        now: DateTime<Utc>,
        inactivity_timeout: Duration,
        rate_limit: Duration,
        keep_alive_interval: Duration,
    ) -> Vec<TickAction> {
        let mut inner = self.inner.lock().await;
        let mut actions = Vec::new();
        let mut terminal_uids = Vec::new();

        let inactivity = chrono::Duration::from_std(inactivity_timeout).unwrap_or_default();
        let rate = chrono::Duration::from_std(rate_limit).unwrap_or_default();
        let keep_alive = chrono::Duration::from_std(keep_alive_interval).unwrap_or_default();

        for (uid, track) in inner.tracks.iter_mut() {
            if now - track.last_update_time > inactivity {
                terminal_uids.push(uid.clone());
                continue;
            }

            let due_full = match track.last_sent_time {
                None => true,
                Some(last) => now - last >= rate,
            };
            let due_keepalive = match track.last_sent_time {
                Some(last) => now - last >= keep_alive,
                None => false,
            };

            if due_full || due_keepalive {
                track.last_sent_time = Some(now);
                track.last_sent_position = Some(track.position);
                actions.push(TickAction::Emit(track.clone()));
            }
        }

        for uid in terminal_uids {
            if let Some(track) = inner.tracks.remove(&uid) {
                inner.trusted_order.retain(|u| u != &uid);
                inner.opportunistic_order.retain(|u| u != &uid);
                actions.push(TickAction::Terminal(track));
            }
        }

        actions
    }

    /// Applies a completed enrichment lookup to a still-live track. A
    /// successful lookup also promotes the track to the trusted pool.
    pub async fn apply_enrichment(&self, uid: &str, enrichment: Enrichment) -> bool {
        let promote = enrichment.success;
        {
            let mut inner = self.inner.lock().await;
            let Some(track) = inner.tracks.get_mut(uid) else {
                return false;
            };
            track.enrichment = enrichment;
        }
        if promote {
            self.promote_to_trusted(uid).await;
        }
        true
    }

    /// Owned copies of every current track, for `/drones` and tests.
    pub async fn snapshot(&self) -> Vec<Track> {
        self.inner.lock().await.tracks.values().cloned().collect()
    }

    pub async fn get(&self, uid: &str) -> Option<Track> {
        self.inner.lock().await.tracks.get(uid).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.tracks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dragonsync_formats::{Auxiliary, Identity, Kinematics, ObservationKind, Position, Quality};

    fn obs(uid: &str, mac: Option<&str>) -> Observation {
        Observation {
            kind: ObservationKind::Drone,
            uid: Some(uid.to_string()),
            position: Position { lat: 1.0, lon: 2.0, alt_m: 3.0 },
            kinematics: Kinematics::default(),
            identity: Identity { mac: mac.map(str::to_string), ..Identity::default() },
            quality: Quality::default(),
            auxiliary: Auxiliary::default(),
            observed_at: Utc::now(),
            seen_by: None,
            partial: false,
        }
    }

    #[tokio::test]
    async fn new_uid_is_admitted_as_opportunistic() {
        let reg = TrackRegistry::new(RegistryLimits::default());
        reg.upsert(obs("drone-A", None)).await;
        let track = reg.get("drone-A").await.expect("should be admitted");
        assert_eq!(track.trust_level, TrustLevel::Opportunistic);
    }

    #[tokio::test]
    async fn opportunistic_pool_evicts_oldest_on_overflow() {
        let limits = RegistryLimits { max_opportunistic: 2, ..RegistryLimits::default() };
        let reg = TrackRegistry::new(limits);
        reg.upsert(obs("drone-A", None)).await;
        reg.upsert(obs("drone-B", None)).await;
        reg.upsert(obs("drone-C", None)).await;

        assert!(reg.get("drone-A").await.is_none());
        assert!(reg.get("drone-B").await.is_some());
        assert!(reg.get("drone-C").await.is_some());
    }

    #[tokio::test]
    async fn mac_spam_guard_blocks_after_threshold() {
        let limits = RegistryLimits {
            mac_spam_threshold: 2,
            mac_spam_window: Duration::from_secs(30),
            mac_spam_backoff: Duration::from_secs(60),
            ..RegistryLimits::default()
        };
        let reg = TrackRegistry::new(limits);
        reg.upsert(obs("drone-A", Some("AA:BB:CC:DD:EE:FF"))).await;
        reg.upsert(obs("drone-B", Some("AA:BB:CC:DD:EE:FF"))).await;
        reg.upsert(obs("drone-C", Some("AA:BB:CC:DD:EE:FF"))).await;

        assert!(reg.get("drone-A").await.is_some());
        assert!(reg.get("drone-B").await.is_some());
        assert!(reg.get("drone-C").await.is_none());
    }

    #[tokio::test]
    async fn caa_only_observation_mutates_exactly_one_match() {
        let reg = TrackRegistry::new(RegistryLimits::default());
        reg.upsert(obs("drone-A", Some("AA:BB:CC:DD:EE:FF"))).await;

        let mut caa = obs("drone-A", Some("AA:BB:CC:DD:EE:FF"));
        caa.uid = None;
        caa.identity.description = Some("updated".into());
        reg.upsert(caa).await;

        let track = reg.get("drone-A").await.unwrap();
        assert_eq!(track.identity.description.as_deref(), Some("updated"));
    }

    #[tokio::test]
    async fn tick_emits_terminal_after_inactivity_timeout() {
        let reg = TrackRegistry::new(RegistryLimits::default());
        reg.upsert(obs("drone-A", None)).await;

        let later = Utc::now() + chrono::Duration::seconds(120);
        let actions = reg
            .tick(later, Duration::from_secs(60), Duration::from_secs(1), Duration::from_secs(10))
            .await;

        assert!(matches!(actions.as_slice(), [TickAction::Terminal(t)] if t.uid == "drone-A"));
        assert!(reg.get("drone-A").await.is_none());
    }
}
