use std::time::Duration;
use thiserror::Error;

/// Errors raised while building or querying a [`RateModel`](crate::evolution::RateModel).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateModelError {
    /// Two collections that must agree in length do not.
    #[error("Dimension mismatch for {parameter}: expected {expected}, found {actual}")]
    DimensionMismatch {
        parameter: String,
        expected: usize,
        actual: usize,
    },

    /// A rate value was negative or not finite.
    #[error("Invalid rate for {parameter}: {value} (rates must be finite and non-negative)")]
    NegativeRate { parameter: String, value: f64 },

    /// Epoch index is zero or negative. Epoch indices start at 1.
    #[error("Invalid epoch index {0}: epoch indices start at 1")]
    InvalidEpochIndex(i64),

    /// Epoch index is a valid positive integer but exceeds the declared epoch count.
    #[error("Epoch index {index} out of range: only {n_epochs} epoch(s) declared")]
    EpochIndexOutOfRange { index: usize, n_epochs: usize },

    /// Epoch index could not be read as an integer.
    #[error("Could not parse epoch index from '{0}'")]
    EpochIndexParse(String),

    /// A state index is outside `[0, n_states)`.
    #[error("State {state} for {parameter} out of range: model has {n_states} state(s)")]
    StateOutOfRange {
        parameter: String,
        state: usize,
        n_states: usize,
    },

    /// Epoch boundary ages are not positive and strictly decreasing.
    #[error("Invalid epoch ages: {0}")]
    InvalidEpochAges(String),

    /// An anagenetic transition leaves and arrives at the same state.
    #[error("Anagenetic transition from state {state} to itself is not allowed")]
    InvalidTransition { state: usize },
}

/// Errors that can occur while building a [`DnSse`](crate::simulation::DnSse) driver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuilderError {
    /// A required parameter is missing
    #[error("Missing required parameter: {0}")]
    MissingRequired(&'static str),

    /// An invalid parameter value was provided
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A vectorized parameter does not match the number of samples.
    #[error("Dimension mismatch for {parameter}: expected 1 or {expected} value(s), found {actual}")]
    DimensionMismatch {
        parameter: String,
        expected: usize,
        actual: usize,
    },

    /// Two parameters that cannot be combined were both set.
    #[error("Parameters '{0}' and '{1}' are mutually exclusive")]
    MutuallyExclusive(&'static str, &'static str),

    #[error(transparent)]
    RateModel(#[from] RateModelError),

    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Structural problems found while constructing an [`AnnotatedTree`](crate::tree::AnnotatedTree).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnnotatedTreeError {
    /// A node's alive flag disagrees with its age.
    #[error("AnnotatedTreeLineageMissannotation: {0}")]
    LineageMissannotation(String),

    /// A sampled ancestor whose branch was never cut.
    #[error("Sampled ancestor '{label}' on lineage '{lineage}' was never resolved to its lineage node")]
    UnresolvedSampledAncestor { label: String, lineage: String },

    /// Parent/child links do not form a single rooted tree.
    #[error("Malformed tree: {0}")]
    Malformed(String),

    /// Newick or Nexus text could not be read.
    #[error("Tree parse error: {0}")]
    Parse(String),
}

/// Errors that abort a simulation replicate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    /// Conditioning could not be satisfied within the wall-clock budget.
    #[error(
        "Replicate {replicate} exceeded its runtime limit of {limit:?} after {attempts} attempt(s)"
    )]
    RuntimeLimitExceeded {
        replicate: usize,
        attempts: usize,
        limit: Duration,
    },

    /// No event can ever fire again but the stop condition was not reached.
    #[error("Replicate {replicate} stalled at time {time}: total event rate is zero")]
    Stalled { replicate: usize, time: f64 },

    /// The finished replicate produced an invalid tree.
    #[error("Replicate {replicate} produced an invalid tree: {source}")]
    Tree {
        replicate: usize,
        #[source]
        source: AnnotatedTreeError,
    },
}

/// Invalid value generator parameters or vectorized value shapes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("Invalid {distribution} parameter: {message}")]
    InvalidParameter {
        distribution: &'static str,
        message: String,
    },

    #[error("Value {value} for {parameter} is not a non-negative integer")]
    NotAnInteger { parameter: String, value: f64 },
}

/// Errors converting between integer state codes and bit patterns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateEncodingError {
    #[error("State code {code} out of range: {n_characters} character(s) encode {n_states} state(s)")]
    CodeOutOfRange {
        code: usize,
        n_characters: usize,
        n_states: usize,
    },

    #[error("Invalid bit pattern '{pattern}': expected {n_characters} characters of '0' or '1'")]
    InvalidPattern { pattern: String, n_characters: usize },

    #[error("Invalid character count {n_characters}: between 1 and {max} supported")]
    InvalidCharacterCount { n_characters: usize, max: usize },
}

/// Errors loading a [`SimulationConfig`](crate::simulation::SimulationConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Builder(#[from] BuilderError),
}
