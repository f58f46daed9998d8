//! Ingest adapters. Each source normalizes its wire format into
//! [`Observation`](dragonsync_formats::Observation)s (or, for FPV,
//! [`FpvSignal`](dragonsync_formats::normalize::fpv::FpvSignal)s) and
//! pushes them onto a channel; the engine crate owns everything
//! downstream of that channel.

pub mod adsb;
pub mod capability;
pub mod error;
pub mod event;
pub mod fpv;
pub mod kismet;
pub mod poll;
pub mod remoteid;
pub mod system_status;
pub mod uat;

pub use capability::SourceCapability;
pub use error::SourceError;
pub use event::SourceEvent;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

/// Common interface every ingest adapter implements, mirroring the
/// `Fetchable`-style single-trait-per-concern seam this codebase already
/// uses for its access methods.
#[async_trait]
pub trait Source: Send + Sync {
    /// Short name used in logs and in the `/status` DTO.
    fn name(&self) -> &str;

    /// Whether this adapter subscribes to a push feed or polls on an
    /// interval; the engine uses this only for its `/status` reporting.
    fn capability(&self) -> SourceCapability;

    /// Runs until `cancel` fires or an unrecoverable error occurs.
    async fn run(
        &self,
        tx: UnboundedSender<SourceEvent>,
        cancel: CancellationToken,
    ) -> Result<(), SourceError>;
}
