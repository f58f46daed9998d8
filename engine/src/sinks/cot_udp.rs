//! Fire-and-forget CoT-over-UDP sink: one socket, created once, errors
//! logged and swallowed per send.

use crate::error::SinkError;
use crate::sinks::{Sink, SinkCapabilities};
use async_trait::async_trait;
use dragonsync_formats::Track;
use tokio::net::UdpSocket;
use tracing::warn;

pub struct UdpSink {
    name: String,
    target: String,
    socket: UdpSocket,
}

impl UdpSink {
    pub async fn bind(name: impl Into<String>, target: impl Into<String>) -> std::io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        Ok(Self { name: name.into(), target: target.into(), socket })
    }

    async fn send(&self, xml: &str) {
        if let Err(err) = self.socket.send_to(xml.as_bytes(), &self.target).await {
            warn!(sink = %self.name, "udp send failed: {err}");
        }
    }
}

#[async_trait]
impl Sink for UdpSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> SinkCapabilities {
        SinkCapabilities { track: true, pair: true, system: true, lifecycle: false }
    }

    async fn publish_track(&self, _track: &Track, xml: &str) -> Result<(), SinkError> {
        self.send(xml).await;
        Ok(())
    }

    async fn publish_pilot(&self, xml: &str) -> Result<(), SinkError> {
        self.send(xml).await;
        Ok(())
    }

    async fn publish_home(&self, xml: &str) -> Result<(), SinkError> {
        self.send(xml).await;
        Ok(())
    }

    async fn publish_system(&self, xml: &str) -> Result<(), SinkError> {
        self.send(xml).await;
        Ok(())
    }
}
