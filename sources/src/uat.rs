//! UAT poller: reads a `dump978`/`uat2json`-style document from an
//! HTTP(S) URL or a local file path, on a fixed interval.

use crate::capability::SourceCapability;
use crate::error::SourceError;
use crate::event::SourceEvent;
use crate::poll::{sleep_or_cancel, RateLimitedLog};
use crate::Source;
use async_trait::async_trait;
use dragonsync_formats::normalize::uat;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::trace;

pub struct UatSource {
    pub name: String,
    pub url: String,
    pub poll_interval: Duration,
}

impl UatSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>, poll_interval: Duration) -> Self {
        Self { name: name.into(), url: url.into(), poll_interval }
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
impl Source for UatSource {
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
                    let aircraft =
                        doc.get("aircraft").and_then(Value::as_array).cloned().unwrap_or_default();
                    trace!(source = %self.name, count = aircraft.len(), "uat poll");
                    for entry in aircraft {
                        if let Some(obs) = uat::normalize(&entry, Some(self.name.clone())) {
                            if tx.send(SourceEvent::Observation(obs)).is_err() {
                                return Ok(());
                            }
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
