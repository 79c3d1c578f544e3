//! Stochastic character maps.
//!
//! An inference run logs sampled character histories as two tab-separated
//! files: an event log with one row per state change and a node-state table
//! with the state of every node. This module reads both, rebuilds the
//! history of each branch against the trees the maps were drawn on, and
//! counts the changes by kind.

pub mod classify;
pub mod history;
pub mod reader;
pub mod summary;

pub use classify::{AnageneticClass, CladogeneticClass, Classifier, Direction};
pub use history::{
    AnageneticChange, BranchHistory, CladogeneticChange, StochasticMap, StochasticMaps,
};
pub use reader::{
    parse_event_log, parse_node_states, read_event_log, read_node_states, EventRecord,
    NodeStateRecord, TransitionType,
};
pub use summary::{percent, ChangeCounts, MapSummary, Summaries};

use crate::errors::StochasticMapError;
use phylosse_sim::tree::AnnotatedTree;
use std::path::Path;

impl StochasticMaps {
    /// Read both logs from disk and rebuild the maps.
    pub fn from_files(
        trees: &[AnnotatedTree],
        event_log: impl AsRef<Path>,
        node_states: impl AsRef<Path>,
        attribute: Option<&str>,
    ) -> Result<Self, StochasticMapError> {
        let events = read_event_log(event_log)?;
        let states = read_node_states(node_states)?;
        Self::reconstruct(trees, &events, &states, attribute)
    }
}
