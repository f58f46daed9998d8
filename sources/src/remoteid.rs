//! Remote-ID ZMQ SUB source: subscribes to a WarDragon/ZMQ bridge
//! publishing one Remote-ID JSON payload (fragment list or flat dict)
//! per message.

use crate::capability::SourceCapability;
use crate::error::SourceError;
use crate::event::SourceEvent;
use crate::Source;
use async_trait::async_trait;
use dragonsync_formats::normalize::remoteid;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Poll timeout on the underlying socket so the blocking receive loop
/// can periodically check for cancellation.
const RECV_TIMEOUT_MS: i32 = 500;

pub struct RemoteIdSource {
    pub name: String,
    pub endpoint: String,
    pub topic: String,
}

impl RemoteIdSource {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>, topic: impl Into<String>) -> Self {
        Self { name: name.into(), endpoint: endpoint.into(), topic: topic.into() }
    }
}

#[async_trait]
impl Source for RemoteIdSource {
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

        tokio::task::spawn_blocking(move || run_blocking(&name, &endpoint, &topic, tx, cancel))
            .await
            .expect("remote-id source task panicked")
    }
}

fn run_blocking(
    name: &str,
    endpoint: &str,
    topic: &str,
    tx: UnboundedSender<SourceEvent>,
    cancel: CancellationToken,
) -> Result<(), SourceError> {
    let ctx = zmq::Context::new();
    let socket = ctx.socket(zmq::SUB)?;
    socket.connect(endpoint)?;
    socket.set_subscribe(topic.as_bytes())?;
    socket.set_rcvtimeo(RECV_TIMEOUT_MS)?;

    debug!(source = name, endpoint, "remote-id source connected");

    while !cancel.is_cancelled() {
        match socket.recv_msg(0) {
            Ok(msg) => {
                let text = match msg.as_str() {
                    Some(t) => t,
                    None => continue,
                };
                // Messages are topic-prefixed; split off the leading
                // subscription tag before the JSON body.
                let body = text.strip_prefix(topic).unwrap_or(text).trim_start();
                let raw: serde_json::Value = match serde_json::from_str(body) {
                    Ok(v) => v,
                    Err(err) => {
                        warn!(source = name, "bad remote-id payload: {err}");
                        continue;
                    }
                };
                if let Some(obs) = remoteid::normalize(raw, Some(name.to_string())) {
                    if tx.send(SourceEvent::Observation(obs)).is_err() {
                        break;
                    }
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
