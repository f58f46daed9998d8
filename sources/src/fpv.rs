//! FPV-video RF signal ZMQ SUB source. Bypasses the track registry
//! entirely: parsed signals are forwarded as `SourceEvent::Fpv` for the
//! engine's signal store to turn into `SignalAlert`s directly.

use crate::capability::SourceCapability;
use crate::error::SourceError;
use crate::event::SourceEvent;
use crate::Source;
use async_trait::async_trait;
use dragonsync_formats::normalize::fpv;
use dragonsync_formats::Position;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

const RECV_TIMEOUT_MS: i32 = 500;

pub struct FpvSource {
    pub name: String,
    pub endpoint: String,
    pub topic: String,
    /// Observer position the plotted offset is computed from.
    pub observer: Position,
    /// When true (the default), alerts whose `source != "confirm"` are
    /// dropped before they leave this adapter.
    pub confirm_only: bool,
}

impl FpvSource {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        topic: impl Into<String>,
        observer: Position,
        confirm_only: bool,
    ) -> Self {
        Self { name: name.into(), endpoint: endpoint.into(), topic: topic.into(), observer, confirm_only }
    }
}

#[async_trait]
impl Source for FpvSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> SourceCapability {
        SourceCapability::Stream
    }

    async fn run(
        &self,
        tx: UnboundedSender<SourceEvent>,
        cancel: CancellationToken,
    ) -> Result<(), SourceError> {
        let name = self.name.clone();
        let endpoint = self.endpoint.clone();
        let topic = self.topic.clone();
        let observer = self.observer;
        let confirm_only = self.confirm_only;

        tokio::task::spawn_blocking(move || {
            run_blocking(&name, &endpoint, &topic, observer, confirm_only, tx, cancel)
        })
        .await
        .expect("fpv source task panicked")
    }
}

fn run_blocking(
    name: &str,
    endpoint: &str,
    topic: &str,
    observer: Position,
    confirm_only: bool,
    tx: UnboundedSender<SourceEvent>,
    cancel: CancellationToken,
) -> Result<(), SourceError> {
    let ctx = zmq::Context::new();
    let socket = ctx.socket(zmq::SUB)?;
    socket.connect(endpoint)?;
    socket.set_subscribe(topic.as_bytes())?;
    socket.set_rcvtimeo(RECV_TIMEOUT_MS)?;

    debug!(source = name, endpoint, "fpv source connected");

    while !cancel.is_cancelled() {
        match socket.recv_msg(0) {
            Ok(msg) => {
                let text = match msg.as_str() {
                    Some(t) => t,
                    None => continue,
                };
                let body = text.strip_prefix(topic).unwrap_or(text).trim_start();
                let raw: serde_json::Value = match serde_json::from_str(body) {
                    Ok(v) => v,
                    Err(err) => {
                        warn!(source = name, "bad fpv payload: {err}");
                        continue;
                    }
                };
                let Some(signal) = fpv::normalize(&raw) else { continue };
                if confirm_only && !signal.confirmed {
                    continue;
                }
                if tx.send(SourceEvent::Fpv { signal, observer }).is_err() {
                    break;
                }
            }
            Err(zmq::Error::EAGAIN) => continue,
            Err(zmq::Error::ETERM) => return Err(SourceError::Terminated),
            Err(err) => {
                error!(source = name, "zmq recv error: {err}");
                std::thread::sleep(std::time::Duration::from_millis(500));
            }
        }
    }
    Ok(())
}
