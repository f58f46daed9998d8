//! CoT-over-TCP/TLS sink: owns its reconnect loop with exponential
//! backoff capped at 60 s (`backoff_factor = 2`). If the socket is
//! absent at send time the send is a silent no-op; the reconnect loop
//! will recover it. The TLS context (if any) is supplied by the
//! caller — this sink never parses PKCS#12 itself.

use crate::error::SinkError;
use crate::sinks::{Sink, SinkCapabilities};
use async_trait::async_trait;
use dragonsync_formats::Track;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_native_tls::TlsConnector;
use tracing::{debug, warn};

type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

const MAX_BACKOFF: Duration = Duration::from_secs(60);
const BACKOFF_FACTOR: u32 = 2;

pub struct TcpSink {
    name: String,
    conn: Arc<Mutex<Option<BoxedWriter>>>,
}

impl TcpSink {
    /// Spawns the background reconnect loop and returns immediately;
    /// the first connection attempt happens asynchronously.
    pub fn spawn(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        tls: Option<TlsConnector>,
    ) -> Self {
        let name = name.into();
        let host = host.into();
        let conn: Arc<Mutex<Option<BoxedWriter>>> = Arc::new(Mutex::new(None));

        let conn_bg = conn.clone();
        let name_bg = name.clone();
        tokio::spawn(async move {
            let mut backoff = Duration::from_secs(1);
            loop {
                match connect(&host, port, tls.as_ref()).await {
                    Ok(stream) => {
                        debug!(sink = %name_bg, "tcp sink connected");
                        *conn_bg.lock().await = Some(stream);
                        backoff = Duration::from_secs(1);
                        // Stay connected until the writer is dropped by
                        // a failed send, signalled by setting it back
                        // to None; poll for that periodically.
                        loop {
                            tokio::time::sleep(Duration::from_secs(1)).await;
                            if conn_bg.lock().await.is_none() {
                                break;
                            }
                        }
                    }
                    Err(err) => {
                        warn!(sink = %name_bg, "tcp connect failed: {err}, retrying in {backoff:?}");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * BACKOFF_FACTOR).min(MAX_BACKOFF);
                    }
                }
            }
        });

        Self { name, conn }
    }

    async fn send(&self, xml: &str) {
        let mut guard = self.conn.lock().await;
        if let Some(writer) = guard.as_mut() {
            if let Err(err) = writer.write_all(xml.as_bytes()).await {
                warn!(sink = %self.name, "tcp send failed, dropping connection: {err}");
                *guard = None;
            }
        }
    }
}

async fn connect(host: &str, port: u16, tls: Option<&TlsConnector>) -> std::io::Result<BoxedWriter> {
    let stream = TcpStream::connect((host, port)).await?;
    match tls {
        Some(connector) => {
            let tls_stream = connector
                .connect(host, stream)
                .await
                .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;
            Ok(Box::new(tls_stream))
        }
        None => Ok(Box::new(stream)),
    }
}

#[async_trait]
impl Sink for TcpSink {
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
