//! What a [`Source`](crate::Source) sends upstream; the engine's ingest
//! loop matches on this to route into the track registry, the signal
//! store, or straight to the system-status sinks.

use dragonsync_formats::normalize::fpv::FpvSignal;
use dragonsync_formats::{Observation, Position};
use serde_json::Value;

#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// A fully normalized Remote-ID/ADS-B/UAT/Kismet observation, ready
    /// for registry admission.
    Observation(Observation),
    /// A parsed FPV RF signal plus the observer position the plotted
    /// offset should be computed from; the engine turns this into a
    /// `SignalAlert` and never routes it through the track registry.
    Fpv { signal: FpvSignal, observer: Position },
    /// A raw system-status payload, forwarded as-is to the dispatcher's
    /// system-status sinks.
    SystemStatus(Value),
}
