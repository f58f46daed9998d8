//! The Sink capability family. A sink implements whichever of
//! track/pair/system/lifecycle publishing it supports; the Dispatcher
//! probes `capabilities()` once at startup and skips calls the sink
//! didn't advertise, so one slow/unsupported sink never blocks another.

pub mod caching;
pub mod cot_tcp;
pub mod cot_udp;
pub mod mqtt;
pub mod multicast;
pub mod thirdparty;

use crate::error::SinkError;
use async_trait::async_trait;
use dragonsync_formats::Track;

#[derive(Clone, Copy, Debug, Default)]
pub struct SinkCapabilities {
    pub track: bool,
    pub pair: bool,
    pub system: bool,
    pub lifecycle: bool,
}

/// Every method defaults to a no-op `Ok(())` so an adapter only
/// overrides the capabilities it actually advertises.
#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> SinkCapabilities {
        SinkCapabilities::default()
    }

    async fn publish_track(&self, _track: &Track, _xml: &str) -> Result<(), SinkError> {
        Ok(())
    }

    async fn publish_pilot(&self, _xml: &str) -> Result<(), SinkError> {
        Ok(())
    }

    async fn publish_home(&self, _xml: &str) -> Result<(), SinkError> {
        Ok(())
    }

    async fn publish_system(&self, _xml: &str) -> Result<(), SinkError> {
        Ok(())
    }

    async fn mark_inactive(&self, _uid: &str) -> Result<(), SinkError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
