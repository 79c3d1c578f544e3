//! # Simulation Crate
//!
//! The `sim` crate simulates phylogenetic trees under state-dependent
//! speciation-extinction (SSE) processes. It includes modules for the
//! rate model, the event-driven simulation engine, and the annotated trees
//! it produces (with Newick and Nexus I/O).

pub mod base;
pub mod errors;
pub mod evolution;
pub mod prelude;
pub mod simulation;
pub mod tree;

pub use simulation::{DnSse, DnSseBuilder, SimulationBatch};
pub use tree::AnnotatedTree;
