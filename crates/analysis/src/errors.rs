use phylosse_sim::errors::StateEncodingError;
use thiserror::Error;

/// Errors reading or reconstructing stochastic character maps.
#[derive(Debug, Error)]
pub enum StochasticMapError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A row could not be read.
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A required column is missing from the header row.
    #[error("Missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("Unknown tree index {0}")]
    UnknownTree(usize),

    #[error("Node '{node}' not found in tree {tree}")]
    UnknownNode { tree: usize, node: String },

    /// Changes along a branch do not chain from its start to its end state.
    #[error("Inconsistent history in iteration {iteration}, tree {tree}, node '{node}': {message}")]
    InconsistentHistory {
        iteration: usize,
        tree: usize,
        node: String,
        message: String,
    },

    #[error(transparent)]
    StateEncoding(#[from] StateEncodingError),
}
