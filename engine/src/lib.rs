//! Runtime core: the track registry, the FPV signal store, the sink
//! family, the dispatcher tick/ingest loops, serial-number enrichment,
//! and the status/control HTTP facade.

pub mod api;
pub mod dispatcher;
pub mod enrichment;
pub mod error;
pub mod registry;
pub mod signals;
pub mod sinks;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use enrichment::{
    EnrichmentConfig, EnrichmentWorker, FaaApiLookup, LookupFields, LookupOutcome, SerialLookup,
};
pub use error::{EnrichmentError, SinkError};
pub use registry::{RegistryLimits, TickAction, TrackRegistry};
pub use signals::{SignalStore, SignalStoreLimits};
pub use sinks::{Sink, SinkCapabilities};

pub fn version() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
