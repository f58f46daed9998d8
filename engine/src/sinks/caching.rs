//! CachingSink: mirrors normalized ADS-B tracks into a TTL-keyed map
//! that the ApiFacade serves, independent of CoT rendering.

use crate::error::SinkError;
use crate::sinks::{Sink, SinkCapabilities};
use async_trait::async_trait;
use dragonsync_formats::{ObservationKind, Track};
use mini_moka::sync::Cache;
use std::time::Duration;

pub const DEFAULT_TTL: Duration = Duration::from_secs(120);

pub struct CachingSink {
    name: String,
    cache: Cache<String, Track>,
}

impl CachingSink {
    pub fn new(name: impl Into<String>, ttl: Duration) -> Self {
        let cache = Cache::builder().time_to_live(ttl).build();
        Self { name: name.into(), cache }
    }

    pub fn get(&self, uid: &str) -> Option<Track> {
        self.cache.get(uid)
    }

    pub fn snapshot(&self) -> Vec<Track> {
        self.cache.iter().map(|(_, v)| v).collect()
    }
}

#[async_trait]
impl Sink for CachingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> SinkCapabilities {
        SinkCapabilities { track: true, pair: false, system: false, lifecycle: true }
    }

    async fn publish_track(&self, track: &Track, _xml: &str) -> Result<(), SinkError> {
        if matches!(track.kind, ObservationKind::AircraftAdsb) {
            self.cache.insert(track.uid.clone(), track.clone());
        }
        Ok(())
    }

    async fn mark_inactive(&self, uid: &str) -> Result<(), SinkError> {
        self.cache.invalidate(uid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dragonsync_formats::{Auxiliary, Identity, Kinematics, Observation, Position, Quality};

    fn adsb_track() -> Track {
        let obs = Observation {
            kind: ObservationKind::AircraftAdsb,
            uid: Some("adsb-a1b2c3".into()),
            position: Position { lat: 1.0, lon: 2.0, alt_m: 300.0 },
            kinematics: Kinematics::default(),
            identity: Identity::default(),
            quality: Quality::default(),
            auxiliary: Auxiliary::default(),
            observed_at: Utc::now(),
            seen_by: None,
            partial: false,
        };
        Track::from_observation(obs, 0)
    }

    #[tokio::test]
    async fn adsb_track_is_mirrored_and_evictable() {
        let sink = CachingSink::new("cache", DEFAULT_TTL);
        let track = adsb_track();
        sink.publish_track(&track, "").await.unwrap();
        assert!(sink.get("adsb-a1b2c3").is_some());

        sink.mark_inactive("adsb-a1b2c3").await.unwrap();
        assert!(sink.get("adsb-a1b2c3").is_none());
    }

    #[tokio::test]
    async fn non_adsb_track_is_not_mirrored() {
        let sink = CachingSink::new("cache", DEFAULT_TTL);
        let mut track = adsb_track();
        track.kind = ObservationKind::Drone;
        sink.publish_track(&track, "").await.unwrap();
        assert!(sink.get("adsb-a1b2c3").is_none());
    }
}
