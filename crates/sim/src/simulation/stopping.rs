//! Stop conditions and rejection-sampling conditions.

use crate::errors::BuilderError;
use crate::tree::AnnotatedTree;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which quantity ends a replicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    /// Elapsed time since the start of the process.
    Age,
    /// Number of live lineages.
    TaxonCount,
}

impl fmt::Display for StopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Age => write!(f, "age"),
            Self::TaxonCount => write!(f, "taxon_count"),
        }
    }
}

/// Resolved stop condition of one parameter sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopCondition {
    /// Every lineage alive at this time is an extant tip.
    Age(f64),
    /// Stop at the event that brings the live count to this value.
    TaxonCount(usize),
}

impl StopCondition {
    pub fn kind(&self) -> StopKind {
        match self {
            Self::Age(_) => StopKind::Age,
            Self::TaxonCount(_) => StopKind::TaxonCount,
        }
    }

    /// Forward time at which an age-stopped process ends.
    pub fn horizon(&self) -> Option<f64> {
        match *self {
            Self::Age(age) => Some(age),
            Self::TaxonCount(_) => None,
        }
    }

    /// Whether `n_alive` live lineages end the process.
    pub fn reached(&self, n_alive: usize) -> bool {
        matches!(*self, Self::TaxonCount(target) if n_alive >= target)
    }
}

/// Conditions an accepted replicate must satisfy. Failing attempts are
/// discarded and the replicate is simulated again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Conditioning {
    /// At least one lineage alive at the stop time.
    pub survival: bool,
    /// At least one speciation event (the initial root split excluded).
    pub speciation: bool,
    /// Both subtrees of the root hold an observed taxon. Root mode only.
    pub both_sides_of_root: bool,
    /// Minimum number of observed taxa (extant tips plus sampled ancestors).
    pub min_taxa: Option<usize>,
    /// Maximum number of observed taxa.
    pub max_taxa: Option<usize>,
    /// Abandon an attempt as soon as more lineages than this are alive.
    pub abort_at_alive_count: Option<usize>,
}

/// Why an attempt was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Extinct,
    NoSpeciation,
    RootSideUnobserved,
    TooFewTaxa { observed: usize, min: usize },
    TooManyTaxa { observed: usize, max: usize },
    AliveCountExceeded { alive: usize, limit: usize },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extinct => write!(f, "no lineage survived"),
            Self::NoSpeciation => write!(f, "no speciation event"),
            Self::RootSideUnobserved => write!(f, "a side of the root has no observed taxon"),
            Self::TooFewTaxa { observed, min } => {
                write!(f, "{observed} observed taxa, at least {min} required")
            }
            Self::TooManyTaxa { observed, max } => {
                write!(f, "{observed} observed taxa, at most {max} allowed")
            }
            Self::AliveCountExceeded { alive, limit } => {
                write!(f, "{alive} live lineages exceed the limit of {limit}")
            }
        }
    }
}

impl Conditioning {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn on_survival() -> Self {
        Self {
            survival: true,
            ..Self::default()
        }
    }

    /// Reject conditioning combinations that can never be met.
    pub fn validate(&self, with_origin: bool) -> Result<(), BuilderError> {
        if self.both_sides_of_root && with_origin {
            return Err(BuilderError::MutuallyExclusive("both_sides_of_root", "origin"));
        }
        if let (Some(min), Some(max)) = (self.min_taxa, self.max_taxa) {
            if min > max {
                return Err(BuilderError::InvalidParameter(format!(
                    "min_taxa ({min}) exceeds max_taxa ({max})"
                )));
            }
        }
        if self.abort_at_alive_count == Some(0) {
            return Err(BuilderError::InvalidParameter(
                "abort_at_alive_count must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Live-count check applied after every event.
    pub fn check_alive(&self, n_alive: usize) -> Result<(), Rejection> {
        match self.abort_at_alive_count {
            Some(limit) if n_alive > limit => Err(Rejection::AliveCountExceeded {
                alive: n_alive,
                limit,
            }),
            _ => Ok(()),
        }
    }

    /// Check a finished attempt.
    pub fn evaluate(&self, tree: &AnnotatedTree, n_speciations: usize) -> Result<(), Rejection> {
        if self.survival && tree.died() {
            return Err(Rejection::Extinct);
        }
        if self.speciation && n_speciations == 0 {
            return Err(Rejection::NoSpeciation);
        }
        if self.both_sides_of_root && !tree.observed_both_sides_of_root() {
            return Err(Rejection::RootSideUnobserved);
        }
        let observed = tree.n_observed();
        if let Some(min) = self.min_taxa {
            if observed < min {
                return Err(Rejection::TooFewTaxa { observed, min });
            }
        }
        if let Some(max) = self.max_taxa {
            if observed > max {
                return Err(Rejection::TooManyTaxa { observed, max });
            }
        }
        Ok(())
    }
}
