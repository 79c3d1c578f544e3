//! Classification of mapped state changes.

use crate::errors::StochasticMapError;
use phylosse_sim::base::CompoundStateEncoding;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnageneticClass {
    /// One character changed.
    SingleStep,
    /// Several characters changed at once.
    HigherOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Gain,
    Loss,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CladogeneticClass {
    /// Daughter inherits the parent state unchanged.
    Identical,
    /// Daughter keeps a strict subset of the parent's characters.
    RangeContraction,
    /// Daughter gains characters and keeps all of the parent's.
    RangeExpansion,
    Other,
}

/// Classifies changes between plain integer states, or between compound
/// states when an encoding is given.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    encoding: Option<CompoundStateEncoding>,
}

impl Classifier {
    pub fn plain() -> Self {
        Self { encoding: None }
    }

    pub fn compound(encoding: CompoundStateEncoding) -> Self {
        Self {
            encoding: Some(encoding),
        }
    }

    pub fn encoding(&self) -> Option<&CompoundStateEncoding> {
        self.encoding.as_ref()
    }

    pub fn anagenetic(
        &self,
        from: usize,
        to: usize,
    ) -> Result<(AnageneticClass, Direction), StochasticMapError> {
        let Some(enc) = &self.encoding else {
            return Ok((AnageneticClass::SingleStep, Direction::Neutral));
        };

        let class = if enc.hamming_distance(from, to)? > 1 {
            AnageneticClass::HigherOrder
        } else {
            AnageneticClass::SingleStep
        };
        let direction = match enc.n_set(to)?.cmp(&enc.n_set(from)?) {
            std::cmp::Ordering::Greater => Direction::Gain,
            std::cmp::Ordering::Less => Direction::Loss,
            std::cmp::Ordering::Equal => Direction::Neutral,
        };
        Ok((class, direction))
    }

    pub fn cladogenetic(
        &self,
        parent: usize,
        daughter: usize,
    ) -> Result<CladogeneticClass, StochasticMapError> {
        if parent == daughter {
            return Ok(CladogeneticClass::Identical);
        }
        let Some(enc) = &self.encoding else {
            return Ok(CladogeneticClass::Other);
        };

        if enc.is_subset(daughter, parent)? {
            Ok(CladogeneticClass::RangeContraction)
        } else if enc.is_subset(parent, daughter)? {
            Ok(CladogeneticClass::RangeExpansion)
        } else {
            Ok(CladogeneticClass::Other)
        }
    }
}
