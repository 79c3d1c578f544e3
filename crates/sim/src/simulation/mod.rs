//! Simulation of SSE trees.
//!
//! The most commonly used types are re-exported here:
//!
//! - `DnSse`: a validated batch simulation; `simulate` returns a
//!   `SimulationBatch` of annotated trees.
//! - `DnSseBuilder`: fluent builder for `DnSse` with defaults and validation.
//! - `SimulationConfig`: serde record that can be loaded from JSON and
//!   turned into a builder.

pub mod builder;
pub mod driver;
pub mod engine;
pub mod lineages;
pub mod parameters;
pub mod stopping;

pub use builder::DnSseBuilder;
pub use driver::{DnSse, SimulationBatch};
pub use engine::{Replicate, ReplicateTask};
pub use lineages::{Lineage, LineageTreeBuilder};
pub use parameters::{EpochConfig, SimulationConfig, StopConfig};
pub use stopping::{Conditioning, Rejection, StopCondition, StopKind};
