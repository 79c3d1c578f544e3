//! Commonly used imports for convenience.
//!
//! # Example
//!
//! ```
//! use phylosse_sim::prelude::*;
//!
//! let model = RateModel::single_epoch(1, vec![Rate::speciation(0, 1.0)]).unwrap();
//! let batch = DnSse::builder()
//!     .n_samples(1)
//!     .rate_model(model)
//!     .start_state(0)
//!     .stop_taxa(5.0)
//!     .origin(true)
//!     .seed(1)
//!     .build()
//!     .unwrap()
//!     .simulate()
//!     .unwrap();
//! assert_eq!(batch.trees()[0].n_extant(), 5);
//! ```

pub use crate::base::{CompoundStateEncoding, ValueGenerator, Vectorized};
pub use crate::errors;
pub use crate::evolution::{EpochIndex, EventKind, Rate, RateModel};
pub use crate::simulation::{
    Conditioning, DnSse, DnSseBuilder, SimulationBatch, SimulationConfig, StopCondition,
};
pub use crate::tree::{AnnotatedTree, NewickOptions, NodeId, TreeNode};
