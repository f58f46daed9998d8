//! Error taxonomy for configuration loading.
//!
//! Other components (sinks, sources, the normalizers, the enrichment
//! worker) define their own `thiserror` enums in their own crates; this
//! one is shared because every binary touches config loading first.

use thiserror::Error;

/// Config-fatal errors: invalid or missing configuration. The caller is
/// expected to log at `error!` level and exit 1.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(String),
    #[error("malformed configuration: {0}")]
    Malformed(#[from] hcl::Error),
    #[error("could not read configuration file")]
    Read(#[from] std::io::Error),
    #[error("unsupported configuration version {found}, expected {expected}")]
    VersionMismatch { found: usize, expected: usize },
}
