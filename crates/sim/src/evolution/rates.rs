//! State- and epoch-dependent rates of the SSE process.
//!
//! A [`RateModel`] is an immutable collection of [`Rate`]s. Every rate names
//! its event (with the departing and, where relevant, arriving states), the
//! epoch it applies to, and one value per parameter sample. Once validated,
//! the model is shared read-only by every replicate; each replicate resolves
//! its own dense lookup table with [`RateModel::for_sample`].

use crate::errors::RateModelError;
use crate::evolution::epochs::{validate_epoch_ages, EpochIndex};
use serde::{Deserialize, Serialize};

/// The kind of event a rate drives, together with the states involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    /// Speciation where both daughters keep the parent's state.
    Speciation { state: usize },
    /// State-changing (cladogenetic) speciation: `from -> (left, right)`.
    Cladogenesis {
        from: usize,
        left: usize,
        right: usize,
    },
    Extinction { state: usize },
    /// Anagenetic state change along a branch.
    Transition { from: usize, to: usize },
    /// Sampling of a lineage that keeps evolving (a sampled ancestor).
    AncestorSampling { state: usize },
}

impl EventKind {
    /// State of the lineage the event acts on.
    pub fn departing_state(&self) -> usize {
        match *self {
            Self::Speciation { state }
            | Self::Extinction { state }
            | Self::AncestorSampling { state } => state,
            Self::Cladogenesis { from, .. } | Self::Transition { from, .. } => from,
        }
    }

    fn states(&self) -> Vec<(&'static str, usize)> {
        match *self {
            Self::Speciation { state }
            | Self::Extinction { state }
            | Self::AncestorSampling { state } => vec![("state", state)],
            Self::Cladogenesis { from, left, right } => {
                vec![("from", from), ("left", left), ("right", right)]
            }
            Self::Transition { from, to } => vec![("from", from), ("to", to)],
        }
    }

    /// Within-state speciation written as cladogenesis is the same event.
    fn canonical(self) -> Self {
        match self {
            Self::Cladogenesis { from, left, right } if left == from && right == from => {
                Self::Speciation { state: from }
            }
            other => other,
        }
    }
}

/// One rate parameter: an event, the epoch it applies to, and one value per
/// parameter sample (or a single value shared by all samples).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    #[serde(flatten)]
    pub kind: EventKind,
    pub values: Vec<f64>,
    #[serde(default)]
    pub epoch: EpochIndex,
}

impl Rate {
    /// A rate shared by every sample, in the present-day epoch.
    pub fn new(kind: EventKind, value: f64) -> Self {
        Self {
            kind,
            values: vec![value],
            epoch: EpochIndex::PRESENT,
        }
    }

    /// A rate with one value per parameter sample.
    pub fn vectorized(kind: EventKind, values: Vec<f64>) -> Self {
        Self {
            kind,
            values,
            epoch: EpochIndex::PRESENT,
        }
    }

    pub fn in_epoch(mut self, epoch: EpochIndex) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn speciation(state: usize, value: f64) -> Self {
        Self::new(EventKind::Speciation { state }, value)
    }

    pub fn cladogenesis(from: usize, left: usize, right: usize, value: f64) -> Self {
        Self::new(EventKind::Cladogenesis { from, left, right }, value)
    }

    pub fn extinction(state: usize, value: f64) -> Self {
        Self::new(EventKind::Extinction { state }, value)
    }

    pub fn transition(from: usize, to: usize, value: f64) -> Self {
        Self::new(EventKind::Transition { from, to }, value)
    }

    pub fn ancestor_sampling(state: usize, value: f64) -> Self {
        Self::new(EventKind::AncestorSampling { state }, value)
    }

    /// Value for a given sample; single values are shared by all samples.
    pub fn value(&self, sample: usize) -> f64 {
        if self.values.len() == 1 {
            self.values[0]
        } else {
            self.values[sample]
        }
    }
}

/// Validated collection of rates across states and epochs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateModel {
    n_states: usize,
    epoch_age_ends: Vec<f64>,
    rates: Vec<Rate>,
    /// Common length of the vectorized rate values (1 if none is vectorized).
    n_values: usize,
}

impl RateModel {
    /// Build and validate a rate model.
    ///
    /// The number of epochs is `epoch_age_ends.len() + 1`; use
    /// [`RateModel::with_epochs`] to declare it explicitly.
    pub fn new(
        n_states: usize,
        epoch_age_ends: Vec<f64>,
        rates: Vec<Rate>,
    ) -> Result<Self, RateModelError> {
        let n_epochs = epoch_age_ends.len() + 1;
        Self::with_epochs(n_states, n_epochs, epoch_age_ends, rates)
    }

    /// Build a model with a single (present-day) epoch.
    pub fn single_epoch(n_states: usize, rates: Vec<Rate>) -> Result<Self, RateModelError> {
        Self::new(n_states, Vec::new(), rates)
    }

    /// Build and validate a rate model with an explicitly declared epoch count.
    ///
    /// # Errors
    /// - `DimensionMismatch` if `n_epochs != epoch_age_ends.len() + 1`, or if
    ///   two vectorized rates have different lengths
    /// - `InvalidEpochAges` if boundary ages are not positive and strictly decreasing
    /// - `EpochIndexOutOfRange` if a rate names an epoch beyond `n_epochs`
    /// - `StateOutOfRange` if a rate names a state outside `[0, n_states)`
    /// - `NegativeRate` if a value is negative or not finite
    /// - `InvalidTransition` for an anagenetic change into the same state
    pub fn with_epochs(
        n_states: usize,
        n_epochs: usize,
        epoch_age_ends: Vec<f64>,
        rates: Vec<Rate>,
    ) -> Result<Self, RateModelError> {
        validate_epoch_ages(n_epochs, &epoch_age_ends)?;

        let mut n_values = 1;
        for (i, rate) in rates.iter().enumerate() {
            let parameter = format!("rates[{i}]");

            rate.epoch.check(n_epochs)?;

            for (role, state) in rate.kind.states() {
                if state >= n_states {
                    return Err(RateModelError::StateOutOfRange {
                        parameter: format!("{parameter}.{role}"),
                        state,
                        n_states,
                    });
                }
            }

            if let EventKind::Transition { from, to } = rate.kind {
                if from == to {
                    return Err(RateModelError::InvalidTransition { state: from });
                }
            }

            if rate.values.is_empty() {
                return Err(RateModelError::DimensionMismatch {
                    parameter,
                    expected: n_values,
                    actual: 0,
                });
            }
            if let Some(&value) = rate.values.iter().find(|v| !v.is_finite() || **v < 0.0) {
                return Err(RateModelError::NegativeRate { parameter, value });
            }

            match rate.values.len() {
                1 => {}
                len if n_values == 1 => n_values = len,
                len if len != n_values => {
                    return Err(RateModelError::DimensionMismatch {
                        parameter,
                        expected: n_values,
                        actual: len,
                    });
                }
                _ => {}
            }
        }

        Ok(Self {
            n_states,
            epoch_age_ends,
            rates,
            n_values,
        })
    }

    pub fn n_states(&self) -> usize {
        self.n_states
    }

    pub fn n_epochs(&self) -> usize {
        self.epoch_age_ends.len() + 1
    }

    /// Epoch boundary ages, oldest first.
    pub fn epoch_age_ends(&self) -> &[f64] {
        &self.epoch_age_ends
    }

    pub fn rates(&self) -> &[Rate] {
        &self.rates
    }

    /// Number of parameter samples the vectorized rates describe (1 if the
    /// model has no vectorized rate).
    pub fn n_values(&self) -> usize {
        self.n_values
    }

    /// Check that the model can parameterize `n_samples` samples.
    pub fn check_samples(&self, n_samples: usize) -> Result<(), RateModelError> {
        if self.n_values != 1 && self.n_values != n_samples {
            return Err(RateModelError::DimensionMismatch {
                parameter: "rate values".into(),
                expected: n_samples,
                actual: self.n_values,
            });
        }
        Ok(())
    }

    /// Instantaneous rate of `kind` in `epoch` for parameter sample `sample`.
    ///
    /// Rates not declared for that event and epoch are zero.
    pub fn rate(
        &self,
        kind: EventKind,
        epoch: EpochIndex,
        sample: usize,
    ) -> Result<f64, RateModelError> {
        epoch.check(self.n_epochs())?;
        let kind = kind.canonical();
        Ok(self
            .rates
            .iter()
            .filter(|r| r.epoch == epoch && r.kind.canonical() == kind)
            .map(|r| r.value(sample))
            .sum())
    }

    /// Resolve the dense per-state tables of one parameter sample.
    pub fn for_sample(&self, sample: usize) -> ReplicateRates {
        let mut epochs: Vec<EpochRates> = (0..self.n_epochs())
            .map(|_| EpochRates {
                states: vec![StateRates::default(); self.n_states],
            })
            .collect();

        for rate in &self.rates {
            let value = rate.value(sample);
            let table = &mut epochs[rate.epoch.get() - 1];
            match rate.kind.canonical() {
                EventKind::Speciation { state } => table.states[state].speciation += value,
                EventKind::Cladogenesis { from, left, right } => table.states[from]
                    .cladogenesis
                    .push((left, right, value)),
                EventKind::Extinction { state } => table.states[state].extinction += value,
                EventKind::Transition { from, to } => {
                    table.states[from].transitions.push((to, value))
                }
                EventKind::AncestorSampling { state } => {
                    table.states[state].ancestor_sampling += value
                }
            }
        }

        for table in &mut epochs {
            for state in &mut table.states {
                state.total = state.speciation
                    + state.cladogenesis.iter().map(|c| c.2).sum::<f64>()
                    + state.extinction
                    + state.transitions.iter().map(|t| t.1).sum::<f64>()
                    + state.ancestor_sampling;
            }
        }

        ReplicateRates { epochs }
    }
}

/// Rates leaving one state in one epoch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateRates {
    pub speciation: f64,
    /// `(left, right, rate)`
    pub cladogenesis: Vec<(usize, usize, f64)>,
    pub extinction: f64,
    /// `(to, rate)`
    pub transitions: Vec<(usize, f64)>,
    pub ancestor_sampling: f64,
    total: f64,
}

impl StateRates {
    /// Sum of every event rate for a lineage in this state.
    pub fn total(&self) -> f64 {
        self.total
    }
}

/// Per-state rates of one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochRates {
    states: Vec<StateRates>,
}

impl EpochRates {
    pub fn state(&self, state: usize) -> &StateRates {
        &self.states[state]
    }

    pub fn n_states(&self) -> usize {
        self.states.len()
    }
}

/// Dense rate tables of one parameter sample, for every epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicateRates {
    /// `epochs[0]` is epoch 1 (the present).
    epochs: Vec<EpochRates>,
}

impl ReplicateRates {
    pub fn epoch(&self, epoch: EpochIndex) -> &EpochRates {
        &self.epochs[epoch.get() - 1]
    }

    pub fn n_epochs(&self) -> usize {
        self.epochs.len()
    }

    /// Whether any epoch allows ancestor sampling.
    pub fn samples_ancestors(&self) -> bool {
        self.epochs
            .iter()
            .any(|e| e.states.iter().any(|s| s.ancestor_sampling > 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bisse_rates() -> Vec<Rate> {
        vec![
            Rate::speciation(0, 1.0),
            Rate::speciation(1, 2.0),
            Rate::extinction(0, 0.5),
            Rate::transition(0, 1, 0.1),
            Rate::transition(1, 0, 0.2),
        ]
    }

    #[test]
    fn test_rate_lookup() {
        let model = RateModel::single_epoch(2, bisse_rates()).unwrap();
        let present = EpochIndex::PRESENT;

        assert_eq!(
            model
                .rate(EventKind::Speciation { state: 1 }, present, 0)
                .unwrap(),
            2.0
        );
        assert_eq!(
            model
                .rate(EventKind::Extinction { state: 1 }, present, 0)
                .unwrap(),
            0.0
        );
        // Cladogenesis into the same state is within-state speciation
        assert_eq!(
            model
                .rate(
                    EventKind::Cladogenesis {
                        from: 0,
                        left: 0,
                        right: 0
                    },
                    present,
                    0
                )
                .unwrap(),
            1.0
        );
    }

    #[test]
    fn test_rate_lookup_bad_epoch() {
        let model = RateModel::single_epoch(2, bisse_rates()).unwrap();
        let epoch = EpochIndex::new(2).unwrap();
        assert_eq!(
            model.rate(EventKind::Speciation { state: 0 }, epoch, 0),
            Err(RateModelError::EpochIndexOutOfRange {
                index: 2,
                n_epochs: 1
            })
        );
    }

    #[test]
    fn test_negative_rate_rejected() {
        let err = RateModel::single_epoch(2, vec![Rate::speciation(0, -1.0)]).unwrap_err();
        assert!(matches!(err, RateModelError::NegativeRate { value, .. } if value == -1.0));
    }

    #[test]
    fn test_state_out_of_range() {
        let err = RateModel::single_epoch(2, vec![Rate::transition(0, 2, 1.0)]).unwrap_err();
        assert!(matches!(
            err,
            RateModelError::StateOutOfRange { state: 2, n_states: 2, .. }
        ));
    }

    #[test]
    fn test_self_transition_rejected() {
        let err = RateModel::single_epoch(2, vec![Rate::transition(1, 1, 1.0)]).unwrap_err();
        assert_eq!(err, RateModelError::InvalidTransition { state: 1 });
    }

    #[test]
    fn test_epoch_count_must_match_ages() {
        let err = RateModel::with_epochs(2, 3, vec![1.0], bisse_rates()).unwrap_err();
        assert!(matches!(
            err,
            RateModelError::DimensionMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_rate_epoch_out_of_declared_range() {
        let rate = Rate::speciation(0, 1.0).in_epoch(EpochIndex::new(3).unwrap());
        let err = RateModel::new(1, vec![1.0], vec![rate]).unwrap_err();
        assert_eq!(
            err,
            RateModelError::EpochIndexOutOfRange {
                index: 3,
                n_epochs: 2
            }
        );
    }

    #[test]
    fn test_vectorized_lengths_must_agree() {
        let rates = vec![
            Rate::vectorized(EventKind::Speciation { state: 0 }, vec![1.0, 2.0, 3.0]),
            Rate::vectorized(EventKind::Extinction { state: 0 }, vec![0.1, 0.2]),
        ];
        let err = RateModel::single_epoch(1, rates).unwrap_err();
        assert!(matches!(
            err,
            RateModelError::DimensionMismatch {
                expected: 3,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_check_samples() {
        let rates = vec![Rate::vectorized(
            EventKind::Speciation { state: 0 },
            vec![1.0, 2.0],
        )];
        let model = RateModel::single_epoch(1, rates).unwrap();
        assert_eq!(model.n_values(), 2);
        assert!(model.check_samples(2).is_ok());
        assert!(model.check_samples(3).is_err());

        let shared = RateModel::single_epoch(1, vec![Rate::speciation(0, 1.0)]).unwrap();
        assert!(shared.check_samples(7).is_ok());
    }

    #[test]
    fn test_for_sample_tables() {
        let rates = vec![
            Rate::vectorized(EventKind::Speciation { state: 0 }, vec![1.0, 3.0]),
            Rate::cladogenesis(0, 0, 1, 0.5),
            Rate::transition(0, 1, 0.25),
            Rate::extinction(1, 2.0).in_epoch(EpochIndex::new(2).unwrap()),
        ];
        let model = RateModel::new(2, vec![1.0], rates).unwrap();

        let table = model.for_sample(1);
        let present = table.epoch(EpochIndex::PRESENT);
        assert_eq!(present.state(0).speciation, 3.0);
        assert_eq!(present.state(0).cladogenesis, vec![(0, 1, 0.5)]);
        assert_eq!(present.state(0).total(), 3.75);
        assert_eq!(present.state(1).total(), 0.0);

        let past = table.epoch(EpochIndex::new(2).unwrap());
        assert_eq!(past.state(1).extinction, 2.0);
        assert_eq!(past.state(0).total(), 0.0);
    }

    #[test]
    fn test_rate_deserialize() {
        let rate: Rate = serde_json::from_str(
            r#"{"event": "transition", "from": 0, "to": 1, "values": [0.1], "epoch": 1}"#,
        )
        .unwrap();
        assert_eq!(rate.kind, EventKind::Transition { from: 0, to: 1 });
        assert_eq!(rate.epoch, EpochIndex::PRESENT);
    }
}
