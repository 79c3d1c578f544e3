//! The dn_sse simulation driver: batches of independent replicates.

use crate::errors::SimulationError;
use crate::evolution::{EpochSchedule, RateModel, ReplicateRates};
use crate::simulation::builder::DnSseBuilder;
use crate::simulation::engine::{Replicate, ReplicateTask};
use crate::simulation::stopping::{Conditioning, StopCondition};
use crate::tree::{write_nexus_string, AnnotatedTree};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use std::time::{Duration, Instant};
use tracing::info;

/// A validated SSE simulation: `n_samples` parameter sets, each simulated
/// `n_repeats` times.
///
/// Construct with [`DnSseBuilder`].
///
/// Every replicate gets its own random stream, seeded from the master seed
/// in replicate order before any parallel work, so a batch is reproducible
/// for a given seed whatever the thread count.
#[derive(Debug, Clone)]
pub struct DnSse {
    pub(crate) n_samples: usize,
    pub(crate) n_repeats: usize,
    pub(crate) seed: u64,
    pub(crate) model: RateModel,
    pub(crate) start_states: Vec<usize>,
    pub(crate) stops: Vec<StopCondition>,
    pub(crate) seed_age: Option<f64>,
    pub(crate) with_origin: bool,
    pub(crate) epsilon: f64,
    pub(crate) runtime_limit: Duration,
    pub(crate) conditioning: Conditioning,
}

impl DnSse {
    pub fn builder() -> DnSseBuilder {
        DnSseBuilder::new()
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn n_repeats(&self) -> usize {
        self.n_repeats
    }

    /// Total number of trees a batch holds.
    pub fn n_replicates(&self) -> usize {
        self.n_samples * self.n_repeats
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn rate_model(&self) -> &RateModel {
        &self.model
    }

    pub fn start_states(&self) -> &[usize] {
        &self.start_states
    }

    pub fn stop_conditions(&self) -> &[StopCondition] {
        &self.stops
    }

    pub fn with_origin(&self) -> bool {
        self.with_origin
    }

    pub fn conditioning(&self) -> &Conditioning {
        &self.conditioning
    }

    /// Simulate every replicate.
    ///
    /// # Errors
    /// A failing replicate aborts the batch:
    /// `RuntimeLimitExceeded` if conditioning could not be met in time,
    /// `Stalled` if a taxon-count target became unreachable.
    pub fn simulate(&self) -> Result<SimulationBatch, SimulationError> {
        let started = Instant::now();
        let n_replicates = self.n_replicates();
        info!(
            n_samples = self.n_samples,
            n_repeats = self.n_repeats,
            n_states = self.model.n_states(),
            n_epochs = self.model.n_epochs(),
            seed = self.seed,
            "starting SSE simulation"
        );

        let mut master = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        // Parameter draws used the start of this stream
        master.long_jump();
        let seeds: Vec<u64> = (0..n_replicates).map(|_| master.random()).collect();

        let rates: Vec<ReplicateRates> = (0..self.n_samples)
            .map(|sample| self.model.for_sample(sample))
            .collect();
        let schedules: Vec<EpochSchedule> = self
            .stops
            .iter()
            .map(|stop| self.schedule(stop))
            .collect();

        let replicates = seeds
            .into_par_iter()
            .enumerate()
            .map(|(index, seed)| {
                let sample = index / self.n_repeats;
                ReplicateTask {
                    index,
                    rates: &rates[sample],
                    schedule: &schedules[sample],
                    start_state: self.start_states[sample],
                    stop: self.stops[sample],
                    with_origin: self.with_origin,
                    n_states: self.model.n_states(),
                    epsilon: self.epsilon,
                    conditioning: &self.conditioning,
                    runtime_limit: self.runtime_limit,
                }
                .run(seed)
            })
            .collect::<Result<Vec<Replicate>, _>>()?;

        let attempts = replicates.iter().map(|r| r.attempts).sum::<usize>();
        info!(
            trees = n_replicates,
            attempts,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "finished SSE simulation"
        );

        Ok(SimulationBatch {
            n_samples: self.n_samples,
            n_repeats: self.n_repeats,
            attempts: replicates.iter().map(|r| r.attempts).collect(),
            trees: replicates.into_iter().map(|r| r.tree).collect(),
        })
    }

    fn schedule(&self, stop: &StopCondition) -> EpochSchedule {
        let age_ends = self.model.epoch_age_ends();
        if age_ends.is_empty() {
            return EpochSchedule::single(self.epsilon);
        }
        let seed_age = match stop {
            StopCondition::Age(age) => *age,
            // Checked at build time
            StopCondition::TaxonCount(_) => self.seed_age.unwrap_or_default(),
        };
        EpochSchedule::new(age_ends, seed_age, self.epsilon)
    }
}

/// Trees of one simulation, ordered sample-major:
/// `index = sample * n_repeats + repeat`.
#[derive(Debug, Clone)]
pub struct SimulationBatch {
    n_samples: usize,
    n_repeats: usize,
    trees: Vec<AnnotatedTree>,
    attempts: Vec<usize>,
}

impl SimulationBatch {
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn n_repeats(&self) -> usize {
        self.n_repeats
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn trees(&self) -> &[AnnotatedTree] {
        &self.trees
    }

    pub fn into_trees(self) -> Vec<AnnotatedTree> {
        self.trees
    }

    /// All repeats of one parameter sample.
    pub fn sample(&self, sample: usize) -> Option<&[AnnotatedTree]> {
        if sample >= self.n_samples {
            return None;
        }
        let start = sample * self.n_repeats;
        Some(&self.trees[start..start + self.n_repeats])
    }

    pub fn get(&self, sample: usize, repeat: usize) -> Option<&AnnotatedTree> {
        if repeat >= self.n_repeats {
            return None;
        }
        self.sample(sample).map(|trees| &trees[repeat])
    }

    /// Attempts used by each replicate, in batch order.
    pub fn attempts(&self) -> &[usize] {
        &self.attempts
    }

    /// `died` flag of every tree in batch order.
    pub fn died(&self) -> Vec<bool> {
        self.trees.iter().map(AnnotatedTree::died).collect()
    }

    /// Newick strings of every tree in batch order.
    pub fn newick(&self) -> Vec<&str> {
        self.trees.iter().map(AnnotatedTree::newick).collect()
    }

    /// All trees as one Nexus document.
    pub fn to_nexus(&self) -> String {
        write_nexus_string(&self.trees)
    }
}

impl<'a> IntoIterator for &'a SimulationBatch {
    type Item = &'a AnnotatedTree;
    type IntoIter = std::slice::Iter<'a, AnnotatedTree>;

    fn into_iter(self) -> Self::IntoIter {
        self.trees.iter()
    }
}
