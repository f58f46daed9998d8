use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("not connected")]
    NotConnected,
}

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("lookup backend disabled")]
    Disabled,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("not found")]
    NotFound,
}
