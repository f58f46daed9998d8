use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("ZMQ context terminated")]
    Terminated,
    #[error("ZMQ error: {0}")]
    Zmq(#[from] zmq::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),
}
