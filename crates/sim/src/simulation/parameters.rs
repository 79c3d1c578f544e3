//! Serializable simulation configuration.
//!
//! The record is the static parameter schema of the `dn_sse` function:
//! unknown fields are rejected at load time.
//!
//! ```json
//! {
//!   "n_samples": 2,
//!   "n_repeats": 5,
//!   "seed": 42,
//!   "n_states": 2,
//!   "start_states": 0,
//!   "stop": { "condition": "age", "value": 4.0 },
//!   "origin": true,
//!   "conditioning": { "survival": true },
//!   "rates": [
//!     { "event": "speciation", "state": 0, "values": [1.0, 0.5] },
//!     { "event": "extinction", "state": 0, "values": [0.1] },
//!     { "event": "transition", "from": 0, "to": 1, "values": [0.2] }
//!   ]
//! }
//! ```

use crate::base::Vectorized;
use crate::errors::ConfigError;
use crate::evolution::Rate;
use crate::simulation::stopping::{Conditioning, StopKind};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

fn default_repeats() -> usize {
    1
}

fn default_epsilon() -> f64 {
    1e-12
}

fn default_runtime_limit() -> f64 {
    900.0
}

/// Stop condition as written in a configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StopConfig {
    pub condition: StopKind,
    /// Stop age or taxon count, per sample.
    pub value: Vectorized,
}

/// Epoch layout as written in a configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EpochConfig {
    /// Ages before the present at which epochs end, oldest first.
    pub age_ends: Vec<f64>,
    /// Age of the process start; required with a taxon-count stop and more
    /// than one epoch.
    pub seed_age: Option<f64>,
}

/// A complete, serializable `dn_sse` setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    pub n_samples: usize,
    #[serde(default = "default_repeats")]
    pub n_repeats: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    pub n_states: usize,
    pub start_states: Vectorized,
    pub stop: StopConfig,
    pub origin: bool,
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    #[serde(default = "default_runtime_limit")]
    pub runtime_limit_secs: f64,
    #[serde(default)]
    pub conditioning: Conditioning,
    #[serde(default)]
    pub epochs: EpochConfig,
    pub rates: Vec<Rate>,
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
