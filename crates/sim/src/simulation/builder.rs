//! Builder pattern for the `dn_sse` driver.
//!
//! Provides a fluent API with defaults. Every configuration error is raised
//! by [`DnSseBuilder::build`], before any simulation work starts.

use crate::base::{broadcast, to_integers, Vectorized};
pub use crate::errors::BuilderError;
use crate::errors::RateModelError;
use crate::evolution::RateModel;
use crate::simulation::driver::DnSse;
use crate::simulation::parameters::SimulationConfig;
use crate::simulation::stopping::{Conditioning, StopCondition, StopKind};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::time::Duration;

const DEFAULT_EPSILON: f64 = 1e-12;
const DEFAULT_RUNTIME_LIMIT: Duration = Duration::from_secs(900);

/// Builder for constructing [`DnSse`] instances with a fluent API.
///
/// # Examples
///
/// ```
/// use phylosse_sim::evolution::{Rate, RateModel};
/// use phylosse_sim::simulation::DnSseBuilder;
///
/// let model = RateModel::single_epoch(
///     2,
///     vec![
///         Rate::speciation(0, 1.0),
///         Rate::extinction(0, 0.2),
///         Rate::transition(0, 1, 0.1),
///     ],
/// )
/// .unwrap();
///
/// let sim = DnSseBuilder::new()
///     .n_samples(1)
///     .n_repeats(3)
///     .rate_model(model)
///     .start_state(0)
///     .stop_age(2.0)
///     .origin(true)
///     .seed(42)
///     .build()
///     .unwrap();
///
/// let batch = sim.simulate().unwrap();
/// assert_eq!(batch.len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct DnSseBuilder {
    // Required parameters
    n_samples: Option<usize>,
    model: Option<RateModel>,
    start_states: Option<Vectorized>,
    stop_age: Option<Vectorized>,
    stop_taxa: Option<Vectorized>,

    // Optional parameters (with defaults)
    n_repeats: usize,                 // Default: 1
    seed: Option<u64>,                // Default: None (random)
    seed_age: Option<f64>,            // Default: None
    with_origin: bool,                // Default: false (root)
    epsilon: f64,                     // Default: 1e-12
    runtime_limit: Duration,          // Default: 900 s
    conditioning: Conditioning,       // Default: none
}

impl Default for DnSseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DnSseBuilder {
    pub fn new() -> Self {
        Self {
            n_samples: None,
            model: None,
            start_states: None,
            stop_age: None,
            stop_taxa: None,
            n_repeats: 1,
            seed: None,
            seed_age: None,
            with_origin: false,
            epsilon: DEFAULT_EPSILON,
            runtime_limit: DEFAULT_RUNTIME_LIMIT,
            conditioning: Conditioning::default(),
        }
    }

    /// Bridge a deserialized configuration to the builder.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, BuilderError> {
        if !config.runtime_limit_secs.is_finite() || config.runtime_limit_secs <= 0.0 {
            return Err(BuilderError::InvalidParameter(format!(
                "runtime_limit_secs must be positive, got {}",
                config.runtime_limit_secs
            )));
        }

        let model = RateModel::new(
            config.n_states,
            config.epochs.age_ends.clone(),
            config.rates.clone(),
        )?;

        let mut builder = Self::new()
            .n_samples(config.n_samples)
            .n_repeats(config.n_repeats)
            .rate_model(model)
            .start_states(config.start_states.clone())
            .origin(config.origin)
            .epsilon(config.epsilon)
            .runtime_limit(Duration::from_secs_f64(config.runtime_limit_secs))
            .conditioning(config.conditioning.clone());

        builder = match config.stop.condition {
            StopKind::Age => builder.stop_age(config.stop.value.clone()),
            StopKind::TaxonCount => builder.stop_taxa(config.stop.value.clone()),
        };
        if let Some(seed) = config.seed {
            builder = builder.seed(seed);
        }
        if let Some(age) = config.epochs.seed_age {
            builder = builder.seed_age(age);
        }
        Ok(builder)
    }

    /// Number of parameter samples (required).
    pub fn n_samples(mut self, n: usize) -> Self {
        self.n_samples = Some(n);
        self
    }

    /// Replicates simulated per parameter sample.
    pub fn n_repeats(mut self, n: usize) -> Self {
        self.n_repeats = n;
        self
    }

    /// The rate model (required). Its vectorized rates must have 1 or
    /// `n_samples` values.
    pub fn rate_model(mut self, model: RateModel) -> Self {
        self.model = Some(model);
        self
    }

    /// Starting state shared by every sample.
    pub fn start_state(self, state: usize) -> Self {
        self.start_states(state as f64)
    }

    /// Starting state per sample (required).
    pub fn start_states(mut self, states: impl Into<Vectorized>) -> Self {
        self.start_states = Some(states.into());
        self
    }

    /// Stop every replicate at this age. Mutually exclusive with
    /// [`stop_taxa`](Self::stop_taxa).
    pub fn stop_age(mut self, age: impl Into<Vectorized>) -> Self {
        self.stop_age = Some(age.into());
        self
    }

    /// Stop every replicate when this many lineages are alive.
    pub fn stop_taxa(mut self, count: impl Into<Vectorized>) -> Self {
        self.stop_taxa = Some(count.into());
        self
    }

    /// Start at an origin (one lineage) instead of a root (two lineages).
    pub fn origin(mut self, with_origin: bool) -> Self {
        self.with_origin = with_origin;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Age of the process start, placing epoch boundaries under a
    /// taxon-count stop.
    pub fn seed_age(mut self, age: f64) -> Self {
        self.seed_age = Some(age);
        self
    }

    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Wall-clock budget of each replicate, rejected attempts included.
    pub fn runtime_limit(mut self, limit: Duration) -> Self {
        self.runtime_limit = limit;
        self
    }

    pub fn conditioning(mut self, conditioning: Conditioning) -> Self {
        self.conditioning = conditioning;
        self
    }

    pub fn condition_on_survival(mut self, on: bool) -> Self {
        self.conditioning.survival = on;
        self
    }

    pub fn condition_on_speciation(mut self, on: bool) -> Self {
        self.conditioning.speciation = on;
        self
    }

    pub fn condition_on_both_sides_of_root(mut self, on: bool) -> Self {
        self.conditioning.both_sides_of_root = on;
        self
    }

    pub fn min_taxa(mut self, n: usize) -> Self {
        self.conditioning.min_taxa = Some(n);
        self
    }

    pub fn max_taxa(mut self, n: usize) -> Self {
        self.conditioning.max_taxa = Some(n);
        self
    }

    pub fn abort_at_alive_count(mut self, n: usize) -> Self {
        self.conditioning.abort_at_alive_count = Some(n);
        self
    }

    /// Build and validate the simulation.
    pub fn build(self) -> Result<DnSse, BuilderError> {
        let n_samples = self
            .n_samples
            .ok_or(BuilderError::MissingRequired("n_samples"))?;
        if n_samples == 0 {
            return Err(BuilderError::InvalidParameter(
                "n_samples must be at least 1".into(),
            ));
        }
        if self.n_repeats == 0 {
            return Err(BuilderError::InvalidParameter(
                "n_repeats must be at least 1".into(),
            ));
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(BuilderError::InvalidParameter(format!(
                "epsilon must be positive, got {}",
                self.epsilon
            )));
        }
        if self.runtime_limit.is_zero() {
            return Err(BuilderError::InvalidParameter(
                "runtime_limit must be positive".into(),
            ));
        }

        let model = self.model.ok_or(BuilderError::MissingRequired("rate_model"))?;
        model.check_samples(n_samples)?;
        let n_states = model.n_states();

        let start_states = self
            .start_states
            .ok_or(BuilderError::MissingRequired("start_states"))?;
        let (stop_kind, stop_values) = match (self.stop_age, self.stop_taxa) {
            (Some(_), Some(_)) => {
                return Err(BuilderError::MutuallyExclusive("stop_age", "stop_taxa"))
            }
            (Some(age), None) => (StopKind::Age, age),
            (None, Some(taxa)) => (StopKind::TaxonCount, taxa),
            (None, None) => return Err(BuilderError::MissingRequired("stop_age or stop_taxa")),
        };

        self.conditioning.validate(self.with_origin)?;

        if stop_kind == StopKind::TaxonCount && model.n_epochs() > 1 {
            match self.seed_age {
                None => return Err(BuilderError::MissingRequired("seed_age")),
                Some(age) if !age.is_finite() || age <= 0.0 => {
                    return Err(BuilderError::InvalidParameter(format!(
                        "seed_age must be positive, got {age}"
                    )))
                }
                Some(_) => {}
            }
        }

        // Draws of vectorized parameters come first in the seed's stream;
        // the driver jumps ahead before seeding replicates.
        let seed = self.seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

        let start_states = to_integers("start_states", &start_states.resolve(n_samples, &mut rng)?)?;
        let start_states = broadcast("start_states", start_states, n_samples)?;
        if let Some(&state) = start_states.iter().find(|&&s| s >= n_states) {
            return Err(RateModelError::StateOutOfRange {
                parameter: "start_states".into(),
                state,
                n_states,
            }
            .into());
        }

        let stop_values = stop_values.resolve(n_samples, &mut rng)?;
        let stops: Vec<StopCondition> = match stop_kind {
            StopKind::Age => {
                if let Some(&age) = stop_values.iter().find(|a| !a.is_finite() || **a <= 0.0) {
                    return Err(BuilderError::InvalidParameter(format!(
                        "stop age must be positive, got {age}"
                    )));
                }
                stop_values.into_iter().map(StopCondition::Age).collect()
            }
            StopKind::TaxonCount => {
                let start_count = if self.with_origin { 1 } else { 2 };
                let counts = to_integers("stop_taxa", &stop_values)?;
                if let Some(&count) = counts.iter().find(|&&c| c <= start_count) {
                    return Err(BuilderError::InvalidParameter(format!(
                        "taxon-count target {count} must exceed the {start_count} starting lineage(s)"
                    )));
                }
                counts.into_iter().map(StopCondition::TaxonCount).collect()
            }
        };
        let stops = broadcast("stop value", stops, n_samples)?;

        Ok(DnSse {
            n_samples,
            n_repeats: self.n_repeats,
            seed,
            model,
            start_states,
            stops,
            seed_age: self.seed_age,
            with_origin: self.with_origin,
            epsilon: self.epsilon,
            runtime_limit: self.runtime_limit,
            conditioning: self.conditioning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::ValueGenerator;
    use crate::evolution::Rate;

    fn yule() -> RateModel {
        RateModel::single_epoch(2, vec![Rate::speciation(0, 1.0)]).unwrap()
    }

    fn base() -> DnSseBuilder {
        DnSseBuilder::new()
            .n_samples(2)
            .rate_model(yule())
            .start_state(0)
            .stop_age(3.0)
    }

    #[test]
    fn test_builder_defaults() {
        let sim = base().build().unwrap();
        assert_eq!(sim.n_repeats(), 1);
        assert_eq!(sim.start_states(), &[0, 0]);
        assert_eq!(
            sim.stop_conditions(),
            &[StopCondition::Age(3.0), StopCondition::Age(3.0)]
        );
        assert!(!sim.with_origin());
    }

    #[test]
    fn test_missing_required() {
        assert_eq!(
            DnSseBuilder::new().build().unwrap_err(),
            BuilderError::MissingRequired("n_samples")
        );
        let err = DnSseBuilder::new()
            .n_samples(1)
            .rate_model(yule())
            .start_state(0)
            .build()
            .unwrap_err();
        assert_eq!(err, BuilderError::MissingRequired("stop_age or stop_taxa"));
    }

    #[test]
    fn test_stop_conditions_exclusive() {
        assert!(matches!(
            base().stop_taxa(5.0).build(),
            Err(BuilderError::MutuallyExclusive("stop_age", "stop_taxa"))
        ));
    }

    #[test]
    fn test_vector_length_mismatch() {
        let err = base().start_states(vec![0.0, 1.0, 0.0]).build().unwrap_err();
        assert_eq!(
            err,
            BuilderError::DimensionMismatch {
                parameter: "start_states".into(),
                expected: 2,
                actual: 3
            }
        );

        let model = RateModel::single_epoch(
            1,
            vec![Rate::vectorized(
                crate::evolution::EventKind::Speciation { state: 0 },
                vec![1.0, 2.0, 3.0],
            )],
        )
        .unwrap();
        assert!(matches!(
            base().rate_model(model).build(),
            Err(BuilderError::RateModel(RateModelError::DimensionMismatch { .. }))
        ));
    }

    #[test]
    fn test_start_state_out_of_range() {
        assert!(matches!(
            base().start_state(2).build(),
            Err(BuilderError::RateModel(RateModelError::StateOutOfRange { state: 2, .. }))
        ));
    }

    #[test]
    fn test_taxon_target_must_exceed_start() {
        let builder = DnSseBuilder::new()
            .n_samples(1)
            .rate_model(yule())
            .start_state(0)
            .stop_taxa(2.0);
        assert!(builder.clone().origin(true).build().is_ok());
        assert!(matches!(
            builder.origin(false).build(),
            Err(BuilderError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_taxon_stop_with_epochs_needs_seed_age() {
        let model = RateModel::new(2, vec![1.0], vec![Rate::speciation(0, 1.0)]).unwrap();
        let builder = DnSseBuilder::new()
            .n_samples(1)
            .rate_model(model)
            .start_state(0)
            .stop_taxa(10.0);
        assert_eq!(
            builder.clone().build().unwrap_err(),
            BuilderError::MissingRequired("seed_age")
        );
        assert!(builder.seed_age(2.0).build().is_ok());
    }

    #[test]
    fn test_drawn_stop_ages() {
        let sim = base()
            .seed(9)
            .stop_age(Vectorized::Draw(ValueGenerator::Uniform { min: 1.0, max: 2.0 }))
            .build()
            .unwrap();
        for stop in sim.stop_conditions() {
            match *stop {
                StopCondition::Age(age) => assert!((1.0..2.0).contains(&age)),
                other => panic!("unexpected stop {other:?}"),
            }
        }
        let again = base()
            .seed(9)
            .stop_age(Vectorized::Draw(ValueGenerator::Uniform { min: 1.0, max: 2.0 }))
            .build()
            .unwrap();
        assert_eq!(sim.stop_conditions(), again.stop_conditions());
    }

    #[test]
    fn test_invalid_conditioning() {
        assert!(matches!(
            base().origin(true).condition_on_both_sides_of_root(true).build(),
            Err(BuilderError::MutuallyExclusive(..))
        ));
    }
}
