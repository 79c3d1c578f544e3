//! # Analysis Crate
//!
//! Downstream analyses of simulated or inferred SSE trees. Currently the
//! reconstruction and summary of stochastic character maps read from
//! tab-separated inference logs.

pub mod errors;
pub mod stochastic_map;

pub use errors::StochasticMapError;
pub use stochastic_map::{Classifier, StochasticMap, StochasticMaps, Summaries};
