//! Config, logging and geo helpers shared by every DragonSync crate.

mod config;
mod error;
mod geo;
mod logging;
mod time;

pub use config::*;
pub use error::*;
pub use geo::*;
pub use logging::*;
pub use time::*;

/// Simple macro to generate a `PathBuf` from a series of path components.
#[macro_export]
macro_rules! makepath {
    ($($item:expr),+) => {
        [
        $(std::path::PathBuf::from($item),)+
        ]
        .iter()
        .collect()
    };
}
