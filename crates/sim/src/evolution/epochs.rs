//! Epochs: piecewise-constant rate regimes through time.
//!
//! Epochs are numbered from the present backwards: epoch 1 is the youngest,
//! epoch `n` the oldest. Boundaries are given as ages before the present,
//! oldest first. The simulation itself runs in forward time starting at 0,
//! so a boundary at age `a` sits at forward time `seed_age - a`.

use crate::errors::RateModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated, 1-based epoch index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct EpochIndex(usize);

impl EpochIndex {
    /// The present-day epoch.
    pub const PRESENT: Self = Self(1);

    /// Create an epoch index. Zero and negative values are rejected.
    pub fn new(index: i64) -> Result<Self, RateModelError> {
        if index < 1 {
            return Err(RateModelError::InvalidEpochIndex(index));
        }
        Ok(Self(index as usize))
    }

    /// Parse an epoch index from text.
    ///
    /// Text that is not an integer fails with
    /// [`RateModelError::EpochIndexParse`]; an integer below 1 fails with
    /// [`RateModelError::InvalidEpochIndex`].
    pub fn parse(text: &str) -> Result<Self, RateModelError> {
        let index = text
            .trim()
            .parse::<i64>()
            .map_err(|_| RateModelError::EpochIndexParse(text.to_string()))?;
        Self::new(index)
    }

    /// Check this index against the declared number of epochs.
    pub fn check(self, n_epochs: usize) -> Result<Self, RateModelError> {
        if self.0 > n_epochs {
            return Err(RateModelError::EpochIndexOutOfRange {
                index: self.0,
                n_epochs,
            });
        }
        Ok(self)
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for EpochIndex {
    fn default() -> Self {
        Self::PRESENT
    }
}

impl TryFrom<i64> for EpochIndex {
    type Error = RateModelError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EpochIndex> for i64 {
    fn from(index: EpochIndex) -> Self {
        index.0 as i64
    }
}

impl FromStr for EpochIndex {
    type Err = RateModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for EpochIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate epoch boundary ages against the declared epoch count.
pub fn validate_epoch_ages(n_epochs: usize, age_ends: &[f64]) -> Result<(), RateModelError> {
    if n_epochs == 0 {
        return Err(RateModelError::InvalidEpochAges(
            "at least one epoch must be declared".into(),
        ));
    }
    if n_epochs != age_ends.len() + 1 {
        return Err(RateModelError::DimensionMismatch {
            parameter: "epoch_age_ends".into(),
            expected: n_epochs - 1,
            actual: age_ends.len(),
        });
    }
    if let Some(age) = age_ends.iter().find(|a| !a.is_finite() || **a <= 0.0) {
        return Err(RateModelError::InvalidEpochAges(format!(
            "boundary age {age} must be finite and positive"
        )));
    }
    if age_ends.windows(2).any(|w| w[0] <= w[1]) {
        return Err(RateModelError::InvalidEpochAges(format!(
            "boundary ages {age_ends:?} must be strictly decreasing (oldest first)"
        )));
    }
    Ok(())
}

/// Epoch boundaries of one replicate in forward time.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSchedule {
    n_epochs: usize,
    /// Forward times of the boundaries, ascending.
    boundaries: Vec<f64>,
    epsilon: f64,
}

impl EpochSchedule {
    /// Place the boundaries for a process that started `seed_age` time units
    /// before the present.
    pub fn new(age_ends: &[f64], seed_age: f64, epsilon: f64) -> Self {
        Self {
            n_epochs: age_ends.len() + 1,
            boundaries: age_ends.iter().map(|age| seed_age - age).collect(),
            epsilon,
        }
    }

    /// A schedule with a single epoch and no boundaries.
    pub fn single(epsilon: f64) -> Self {
        Self {
            n_epochs: 1,
            boundaries: Vec::new(),
            epsilon,
        }
    }

    pub fn n_epochs(&self) -> usize {
        self.n_epochs
    }

    /// Epoch in effect at forward time `time`.
    ///
    /// A time within `epsilon` of a boundary counts as having reached it, so
    /// the younger epoch applies.
    pub fn epoch_at(&self, time: f64) -> EpochIndex {
        let passed = self
            .boundaries
            .iter()
            .filter(|&&b| b <= time + self.epsilon)
            .count();
        EpochIndex(self.n_epochs - passed)
    }

    /// The first boundary strictly after `time` (beyond `epsilon`).
    pub fn next_boundary(&self, time: f64) -> Option<f64> {
        self.boundaries
            .iter()
            .copied()
            .find(|&b| b > time + self.epsilon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_index_zero_rejected() {
        assert_eq!(
            EpochIndex::new(0),
            Err(RateModelError::InvalidEpochIndex(0))
        );
        assert_eq!(
            EpochIndex::new(-2),
            Err(RateModelError::InvalidEpochIndex(-2))
        );
    }

    #[test]
    fn test_epoch_index_out_of_range() {
        let idx = EpochIndex::new(3).unwrap();
        assert_eq!(
            idx.check(2),
            Err(RateModelError::EpochIndexOutOfRange {
                index: 3,
                n_epochs: 2
            })
        );
        assert!(idx.check(3).is_ok());
    }

    #[test]
    fn test_epoch_index_parse_errors_are_distinct() {
        assert!(matches!(
            EpochIndex::parse("one"),
            Err(RateModelError::EpochIndexParse(_))
        ));
        assert!(matches!(
            EpochIndex::parse("0"),
            Err(RateModelError::InvalidEpochIndex(0))
        ));
        assert_eq!("2".parse::<EpochIndex>().unwrap().get(), 2);
    }

    #[test]
    fn test_epoch_index_deserialize() {
        let idx: EpochIndex = serde_json::from_str("2").unwrap();
        assert_eq!(idx.get(), 2);
        assert!(serde_json::from_str::<EpochIndex>("0").is_err());
    }

    #[test]
    fn test_validate_epoch_ages() {
        assert!(validate_epoch_ages(1, &[]).is_ok());
        assert!(validate_epoch_ages(3, &[2.0, 1.0]).is_ok());
        assert!(matches!(
            validate_epoch_ages(3, &[2.0]),
            Err(RateModelError::DimensionMismatch {
                expected: 2,
                actual: 1,
                ..
            })
        ));
        assert!(matches!(
            validate_epoch_ages(2, &[2.0, 1.0]),
            Err(RateModelError::DimensionMismatch { .. })
        ));
        assert!(validate_epoch_ages(3, &[1.0, 2.0]).is_err());
        assert!(validate_epoch_ages(2, &[-1.0]).is_err());
    }

    #[test]
    fn test_schedule_epoch_at() {
        // Seed age 3: boundaries at ages 2 and 1 sit at forward times 1 and 2
        let schedule = EpochSchedule::new(&[2.0, 1.0], 3.0, 1e-9);
        assert_eq!(schedule.epoch_at(0.0).get(), 3);
        assert_eq!(schedule.epoch_at(0.5).get(), 3);
        assert_eq!(schedule.epoch_at(1.0).get(), 2);
        assert_eq!(schedule.epoch_at(1.0 - 1e-12).get(), 2);
        assert_eq!(schedule.epoch_at(2.5).get(), 1);
    }

    #[test]
    fn test_schedule_next_boundary() {
        let schedule = EpochSchedule::new(&[2.0, 1.0], 3.0, 1e-9);
        assert_eq!(schedule.next_boundary(0.0), Some(1.0));
        assert_eq!(schedule.next_boundary(1.0), Some(2.0));
        assert_eq!(schedule.next_boundary(2.0), None);
    }

    #[test]
    fn test_schedule_boundary_before_start() {
        // Boundary age older than the seed age: process starts in epoch 1
        let schedule = EpochSchedule::new(&[5.0], 3.0, 1e-9);
        assert_eq!(schedule.epoch_at(0.0).get(), 1);
        assert_eq!(schedule.next_boundary(0.0), None);
    }
}
