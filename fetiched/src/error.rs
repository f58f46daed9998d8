//! Daemon-level errors. Every variant here is fatal at startup: the
//! caller logs at `error!` and exits 1 rather than attempting recovery.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(#[from] eyre::Error),
    #[error("TLS identity error: {0}")]
    Tls(#[from] native_tls::Error),
    #[error("could not read PKCS#12 bundle {0}: {1}")]
    Pkcs12Read(String, std::io::Error),
    #[error("TAK sink requires tls.pkcs12_path and tls.pkcs12_password when protocol is tcp with TLS")]
    MissingPkcs12,
    #[error("bind error: {0}")]
    ApiBind(#[from] std::io::Error),
}
