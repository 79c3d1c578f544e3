//! The SSE process model.
//!
//! - **Epochs**: piecewise-constant rate regimes through time
//! - **Rates**: state- and epoch-dependent event rates, vectorized per sample
//! - **Events**: waiting times and event choice for the live lineages

pub mod epochs;
pub mod events;
pub mod rates;

pub use epochs::{validate_epoch_ages, EpochIndex, EpochSchedule};
pub use events::{Draw, EventSelector, SseEvent};
pub use rates::{EpochRates, EventKind, Rate, RateModel, ReplicateRates, StateRates};
