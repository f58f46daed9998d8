//! Parse-transient error taxonomy: a Normalizer failure never propagates
//! past the one message that triggered it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` had an unexpected shape: {detail}")]
    BadShape { field: &'static str, detail: String },
    #[error("could not parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}
