//! Multicast CoT sink: UDP to a multicast group with a configurable
//! TTL and optional interface binding. When `echo` is enabled, also
//! joins the group and pumps inbound datagrams onto a local channel so
//! a kit can see other kits' tracks.

use crate::error::SinkError;
use crate::sinks::{Sink, SinkCapabilities};
use async_trait::async_trait;
use dragonsync_formats::Track;
use std::net::Ipv4Addr;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

pub struct MulticastSink {
    name: String,
    group: Ipv4Addr,
    port: u16,
    socket: UdpSocket,
}

impl MulticastSink {
    pub async fn bind(
        name: impl Into<String>,
        group: Ipv4Addr,
        port: u16,
        interface: Ipv4Addr,
        ttl: u32,
        echo: Option<UnboundedSender<String>>,
    ) -> std::io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_multicast_ttl_v4(ttl)?;
        socket.set_multicast_loop_v4(true)?;

        if let Some(tx) = echo {
            let rx_socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
            rx_socket.join_multicast_v4(group, interface)?;
            tokio::spawn(async move {
                let mut buf = vec![0u8; 65536];
                loop {
                    match rx_socket.recv_from(&mut buf).await {
                        Ok((len, _from)) => {
                            if let Ok(text) = std::str::from_utf8(&buf[..len]) {
                                let _ = tx.send(text.to_string());
                            }
                        }
                        Err(err) => {
                            warn!("multicast recv error: {err}");
                            break;
                        }
                    }
                }
            });
        }

        Ok(Self { name: name.into(), group, port, socket })
    }

    async fn send(&self, xml: &str) {
        if let Err(err) = self.socket.send_to(xml.as_bytes(), (self.group, self.port)).await {
            warn!(sink = %self.name, "multicast send failed: {err}");
        }
    }
}

#[async_trait]
impl Sink for MulticastSink {
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
