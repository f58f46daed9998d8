//! Kismet REST poller: GETs the devices-summary endpoint on a fixed
//! interval and normalizes each device record that matches an allowed
//! physical layer.

use crate::capability::SourceCapability;
use crate::error::SourceError;
use crate::event::SourceEvent;
use crate::poll::{sleep_or_cancel, RateLimitedLog};
use crate::Source;
use async_trait::async_trait;
use dragonsync_formats::normalize::kismet;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

pub struct KismetSource {
    pub name: String,
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub poll_interval: Duration,
    client: reqwest::Client,
}

impl KismetSource {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        username: Option<String>,
        password: Option<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            username,
            password,
            poll_interval,
            client: reqwest::Client::new(),
        }
    }

    async fn fetch(&self) -> Result<Vec<Value>, SourceError> {
        let mut req = self.client.get(&self.url);
        if let Some(user) = &self.username {
            req = req.basic_auth(user, self.password.as_deref());
        }
        let text = req.send().await?.text().await?;
        let devices: Vec<Value> = serde_json::from_str(&text)?;
        Ok(devices)
    }
}

#[async_trait]
impl Source for KismetSource {
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
        let mut logged_sample = false;

        while !cancel.is_cancelled() {
            match self.fetch().await {
                Ok(devices) => {
                    if !logged_sample {
                        debug!(source = %self.name, count = devices.len(), "first kismet poll succeeded");
                        logged_sample = true;
                    } else {
                        trace!(source = %self.name, count = devices.len(), "kismet poll");
                    }
                    for device in &devices {
                        if let Some(obs) = kismet::normalize(device, Some(self.name.clone())) {
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
