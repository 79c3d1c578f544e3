//! Change counts per stochastic map.

use super::classify::{AnageneticClass, CladogeneticClass, Classifier, Direction};
use super::history::{StochasticMap, StochasticMaps};
use crate::errors::StochasticMapError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::AddAssign;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeCounts {
    pub anagenetic: usize,
    pub single_step: usize,
    pub higher_order: usize,
    pub gains: usize,
    pub losses: usize,
    pub cladogenetic: usize,
    pub identical: usize,
    pub range_contraction: usize,
    pub range_expansion: usize,
    pub other_cladogenetic: usize,
}

impl ChangeCounts {
    pub fn from_map(
        map: &StochasticMap,
        classifier: &Classifier,
    ) -> Result<Self, StochasticMapError> {
        let mut counts = Self::default();

        for change in map.anagenetic() {
            counts.anagenetic += 1;
            let (class, direction) = classifier.anagenetic(change.from, change.to)?;
            match class {
                AnageneticClass::SingleStep => counts.single_step += 1,
                AnageneticClass::HigherOrder => counts.higher_order += 1,
            }
            match direction {
                Direction::Gain => counts.gains += 1,
                Direction::Loss => counts.losses += 1,
                Direction::Neutral => {}
            }
        }

        for change in map.cladogenetic() {
            counts.cladogenetic += 1;
            match classifier.cladogenetic(change.from, change.to)? {
                CladogeneticClass::Identical => counts.identical += 1,
                CladogeneticClass::RangeContraction => counts.range_contraction += 1,
                CladogeneticClass::RangeExpansion => counts.range_expansion += 1,
                CladogeneticClass::Other => counts.other_cladogenetic += 1,
            }
        }

        Ok(counts)
    }
}

impl AddAssign for ChangeCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.anagenetic += rhs.anagenetic;
        self.single_step += rhs.single_step;
        self.higher_order += rhs.higher_order;
        self.gains += rhs.gains;
        self.losses += rhs.losses;
        self.cladogenetic += rhs.cladogenetic;
        self.identical += rhs.identical;
        self.range_contraction += rhs.range_contraction;
        self.range_expansion += rhs.range_expansion;
        self.other_cladogenetic += rhs.other_cladogenetic;
    }
}

/// Percentage of `part` in `whole`, zero for an empty whole.
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}

fn line(f: &mut fmt::Formatter<'_>, name: &str, n: usize, of: usize) -> fmt::Result {
    writeln!(f, "    {name}: {n} ({:.2}%)", percent(n, of))
}

impl fmt::Display for ChangeCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  anagenetic changes: {}", self.anagenetic)?;
        line(f, "single-step", self.single_step, self.anagenetic)?;
        line(f, "higher-order", self.higher_order, self.anagenetic)?;
        line(f, "gains", self.gains, self.anagenetic)?;
        line(f, "losses", self.losses, self.anagenetic)?;
        writeln!(f, "  cladogenetic changes: {}", self.cladogenetic)?;
        line(f, "identical", self.identical, self.cladogenetic)?;
        line(f, "range contraction", self.range_contraction, self.cladogenetic)?;
        line(f, "range expansion", self.range_expansion, self.cladogenetic)?;
        line(f, "other", self.other_cladogenetic, self.cladogenetic)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapSummary {
    pub tree_index: usize,
    pub iteration: usize,
    pub counts: ChangeCounts,
}

impl fmt::Display for MapSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tree {}, iteration {}", self.tree_index, self.iteration)?;
        write!(f, "{}", self.counts)
    }
}

/// Summaries of every map, keyed by `(tree_index, iteration)`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summaries {
    by_key: BTreeMap<(usize, usize), MapSummary>,
}

impl Summaries {
    pub fn get(&self, tree_index: usize, iteration: usize) -> Option<&MapSummary> {
        self.by_key.get(&(tree_index, iteration))
    }

    pub fn iter(&self) -> impl Iterator<Item = &MapSummary> {
        self.by_key.values()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Counts summed over every iteration of one tree.
    pub fn totals(&self, tree_index: usize) -> ChangeCounts {
        let mut total = ChangeCounts::default();
        for summary in self.iter().filter(|s| s.tree_index == tree_index) {
            total += summary.counts;
        }
        total
    }
}

impl fmt::Display for Summaries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for summary in self.iter() {
            write!(f, "{summary}")?;
        }
        Ok(())
    }
}

impl StochasticMaps {
    /// Classify and count the changes of every map.
    pub fn summarize(&self, classifier: &Classifier) -> Result<Summaries, StochasticMapError> {
        let by_key = self
            .iter()
            .map(|map| {
                let summary = MapSummary {
                    tree_index: map.tree_index,
                    iteration: map.iteration,
                    counts: ChangeCounts::from_map(map, classifier)?,
                };
                Ok(((map.tree_index, map.iteration), summary))
            })
            .collect::<Result<BTreeMap<_, _>, StochasticMapError>>()?;

        info!(maps = by_key.len(), "Summarized stochastic maps");
        Ok(Summaries { by_key })
    }
}
