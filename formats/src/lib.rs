//! The shared data model (`Observation`, `Track`, `SignalAlert`), the CoT
//! XML encoder, and the per-source-kind normalizers that turn raw JSON
//! into an `Observation`.

mod cot;
mod error;
mod model;
pub mod normalize;

pub use cot::*;
pub use error::*;
pub use model::*;
