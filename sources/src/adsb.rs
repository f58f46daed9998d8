//! ADS-B poller: reads a `dump1090`/`readsb`-style `aircraft.json` from
//! either an HTTP(S) URL or a local file path, on a fixed interval.

use crate::capability::SourceCapability;
use crate::error::SourceError;
use crate::event::SourceEvent;
use crate::poll::{sleep_or_cancel, RateLimitedLog};
use crate::Source;
use async_trait::async_trait;
use dragonsync_formats::normalize::adsb;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::trace;

pub struct AdsbSource {
    pub name: String,
    pub url: String,
    pub poll_interval: Duration,
    /// Aircraft below this altitude (meters) are dropped before emission.
    pub min_altitude_m: Option<f64>,
    /// Aircraft above this altitude (meters) are dropped before emission.
    pub max_altitude_m: Option<f64>,
}

impl AdsbSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            poll_interval,
            min_altitude_m: None,
            max_altitude_m: None,
        }
    }

    pub fn with_altitude_bounds(mut self, min_m: Option<f64>, max_m: Option<f64>) -> Self {
        self.min_altitude_m = min_m;
        self.max_altitude_m = max_m;
        self
    }

    fn in_altitude_bounds(&self, alt_m: f64) -> bool {
        if let Some(min) = self.min_altitude_m {
            if alt_m < min {
                return false;
            }
        }
        if let Some(max) = self.max_altitude_m {
            if alt_m > max {
                return false;
            }
        }
        true
    }

    async fn fetch(&self) -> Result<Value, SourceError> {
        if let Some(path) = self.url.strip_prefix("file://") {
            let text = tokio::fs::read_to_string(path).await?;
            Ok(serde_json::from_str(&text)?)
        } else {
            let text = reqwest::get(&self.url).await?.text().await?;
            Ok(serde_json::from_str(&text)?)
        }
    }
}

#[async_trait]
impl Source for AdsbSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> SourceCapability {
        SourceCapability::Poll
    }

    async fn run(
        &self,
        tx: UnboundedSender<SourceEvent>,
        cancel: CancellationToken,
    ) -> Result<(), SourceError> {
        let mut log = RateLimitedLog::new(Duration::from_secs(30));

        while !cancel.is_cancelled() {
            match self.fetch().await {
                Ok(doc) => {
                    let aircraft = doc.get("aircraft").and_then(Value::as_array).cloned().unwrap_or_default();
                    trace!(source = %self.name, count = aircraft.len(), "adsb poll");
                    for entry in aircraft {
                        let Some(obs) = adsb::normalize(&entry, Some(self.name.clone())) else {
                            continue;
                        };
                        if !self.in_altitude_bounds(obs.position.alt_m) {
                            continue;
                        }
                        if tx.send(SourceEvent::Observation(obs)).is_err() {
                            return Ok(());
                        }
                    }
                }
                Err(err) => log.log(&self.name, err),
            }

            if !sleep_or_cancel(self.poll_interval, &cancel).await {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> AdsbSource {
        AdsbSource::new("adsb", "file:///dev/null", Duration::from_secs(1))
    }

    #[test]
    fn no_bounds_accepts_everything() {
        let src = source();
        assert!(src.in_altitude_bounds(-50.0));
        assert!(src.in_altitude_bounds(15000.0));
    }

    #[test]
    fn below_min_is_rejected() {
        let src = source().with_altitude_bounds(Some(100.0), None);
        assert!(!src.in_altitude_bounds(50.0));
        assert!(src.in_altitude_bounds(100.0));
    }

    #[test]
    fn above_max_is_rejected() {
        let src = source().with_altitude_bounds(None, Some(5000.0));
        assert!(src.in_altitude_bounds(5000.0));
        assert!(!src.in_altitude_bounds(5000.1));
    }
}
