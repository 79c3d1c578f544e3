//! Simulation of a single replicate with rejection sampling.

use crate::errors::SimulationError;
use crate::evolution::{Draw, EpochSchedule, EventSelector, ReplicateRates};
use crate::simulation::lineages::LineageTreeBuilder;
use crate::simulation::stopping::{Conditioning, Rejection, StopCondition};
use crate::tree::AnnotatedTree;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Events between wall-clock checks inside one attempt.
const CLOCK_CHECK_INTERVAL: u64 = 1024;

/// Everything one replicate needs, borrowed from the driver.
#[derive(Debug, Clone, Copy)]
pub struct ReplicateTask<'a> {
    /// Position of the replicate in the batch.
    pub index: usize,
    pub rates: &'a ReplicateRates,
    pub schedule: &'a EpochSchedule,
    pub start_state: usize,
    pub stop: StopCondition,
    pub with_origin: bool,
    pub n_states: usize,
    pub epsilon: f64,
    pub conditioning: &'a Conditioning,
    pub runtime_limit: Duration,
}

/// An accepted replicate.
#[derive(Debug, Clone)]
pub struct Replicate {
    pub tree: AnnotatedTree,
    /// Attempts used, the accepted one included.
    pub attempts: usize,
}

enum Attempt {
    Accepted(AnnotatedTree),
    Rejected(Rejection),
    OutOfTime,
}

impl ReplicateTask<'_> {
    /// Simulate until an attempt satisfies the conditioning or the runtime
    /// limit is spent.
    pub fn run(&self, seed: u64) -> Result<Replicate, SimulationError> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let started = Instant::now();
        let mut attempts = 0;

        loop {
            if started.elapsed() > self.runtime_limit {
                return Err(self.out_of_time(attempts));
            }
            attempts += 1;

            match self.attempt(&mut rng, started)? {
                Attempt::Accepted(tree) => return Ok(Replicate { tree, attempts }),
                Attempt::Rejected(reason) => {
                    debug!(
                        replicate = self.index,
                        attempt = attempts,
                        %reason,
                        "rejected simulation attempt"
                    );
                }
                Attempt::OutOfTime => return Err(self.out_of_time(attempts)),
            }
        }
    }

    fn out_of_time(&self, attempts: usize) -> SimulationError {
        warn!(
            replicate = self.index,
            attempts,
            limit_secs = self.runtime_limit.as_secs_f64(),
            "replicate exceeded its runtime limit"
        );
        SimulationError::RuntimeLimitExceeded {
            replicate: self.index,
            attempts,
            limit: self.runtime_limit,
        }
    }

    fn attempt(
        &self,
        rng: &mut Xoshiro256PlusPlus,
        started: Instant,
    ) -> Result<Attempt, SimulationError> {
        let mut builder = LineageTreeBuilder::new(
            self.start_state,
            self.with_origin,
            self.n_states,
            self.epsilon,
        );
        let selector = EventSelector::new(self.rates, self.schedule, self.epsilon);
        let horizon = self.stop.horizon();
        let mut now = 0.0;
        let mut steps: u64 = 0;

        let stop_time = loop {
            if builder.n_alive() == 0 {
                break horizon.unwrap_or(now);
            }

            steps += 1;
            if steps % CLOCK_CHECK_INTERVAL == 0 && started.elapsed() > self.runtime_limit {
                return Ok(Attempt::OutOfTime);
            }

            match selector.next(now, horizon, builder.lineages(), rng) {
                Draw::Horizon { time } => break time,
                Draw::Boundary { time } => now = time,
                Draw::Stalled => {
                    return Err(SimulationError::Stalled {
                        replicate: self.index,
                        time: now,
                    })
                }
                Draw::Event { time, event } => {
                    now = time;
                    builder.apply(event, time);
                    if let Err(reason) = self.conditioning.check_alive(builder.n_alive()) {
                        return Ok(Attempt::Rejected(reason));
                    }
                    if self.stop.reached(builder.n_alive()) {
                        break time;
                    }
                }
            }
        };

        let n_speciations = builder.n_speciations();
        let tree = builder
            .finish(stop_time)
            .map_err(|source| SimulationError::Tree {
                replicate: self.index,
                source,
            })?;

        Ok(match self.conditioning.evaluate(&tree, n_speciations) {
            Ok(()) => Attempt::Accepted(tree),
            Err(reason) => Attempt::Rejected(reason),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::{Rate, RateModel};

    fn task<'a>(
        rates: &'a ReplicateRates,
        schedule: &'a EpochSchedule,
        conditioning: &'a Conditioning,
        stop: StopCondition,
    ) -> ReplicateTask<'a> {
        ReplicateTask {
            index: 0,
            rates,
            schedule,
            start_state: 0,
            stop,
            with_origin: true,
            n_states: 1,
            epsilon: 1e-12,
            conditioning,
            runtime_limit: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_age_stop_tree_height() {
        let model = RateModel::single_epoch(1, vec![Rate::speciation(0, 1.0)]).unwrap();
        let rates = model.for_sample(0);
        let schedule = EpochSchedule::single(1e-12);
        let conditioning = Conditioning::none();
        let replicate = task(&rates, &schedule, &conditioning, StopCondition::Age(2.0))
            .run(7)
            .unwrap();

        assert_eq!(replicate.attempts, 1);
        assert_eq!(replicate.tree.max_age(), 2.0);
        assert!(replicate.tree.n_extant() >= 1);
        assert_eq!(replicate.tree.n_extinct(), 0);
    }

    #[test]
    fn test_taxon_stop() {
        let model = RateModel::single_epoch(1, vec![Rate::speciation(0, 1.0)]).unwrap();
        let rates = model.for_sample(0);
        let schedule = EpochSchedule::single(1e-12);
        let conditioning = Conditioning::none();
        let tree = task(&rates, &schedule, &conditioning, StopCondition::TaxonCount(8))
            .run(1)
            .unwrap()
            .tree;
        assert_eq!(tree.n_extant(), 8);
        assert_eq!(tree.n_speciations(), 7);
    }

    #[test]
    fn test_stalled_under_taxon_stop() {
        let model = RateModel::single_epoch(2, vec![Rate::speciation(1, 1.0)]).unwrap();
        let rates = model.for_sample(0);
        let schedule = EpochSchedule::single(1e-12);
        let conditioning = Conditioning::none();
        let result = task(&rates, &schedule, &conditioning, StopCondition::TaxonCount(3)).run(1);
        assert!(matches!(result, Err(SimulationError::Stalled { replicate: 0, .. })));
    }

    #[test]
    fn test_impossible_conditioning_times_out() {
        let model = RateModel::single_epoch(1, vec![Rate::extinction(0, 5.0)]).unwrap();
        let rates = model.for_sample(0);
        let schedule = EpochSchedule::single(1e-12);
        let conditioning = Conditioning::on_survival();
        let mut task = task(&rates, &schedule, &conditioning, StopCondition::Age(10.0));
        task.runtime_limit = Duration::from_millis(20);

        match task.run(3) {
            Err(SimulationError::RuntimeLimitExceeded {
                replicate,
                attempts,
                ..
            }) => {
                assert_eq!(replicate, 0);
                assert!(attempts > 0);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }
}
