//! Per-branch character histories rebuilt from an event log and a
//! node-state table.

use super::reader::{EventRecord, NodeStateRecord, TransitionType};
use crate::errors::StochasticMapError;
use phylosse_sim::tree::{AnnotatedTree, NodeId};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Slack allowed when checking that a change lies on its branch.
const AGE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnageneticChange {
    pub age: f64,
    pub from: usize,
    pub to: usize,
}

/// State change at a speciation, inherited by one daughter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CladogeneticChange {
    pub age: f64,
    pub parent: String,
    pub daughter: String,
    pub from: usize,
    pub to: usize,
}

/// History along the branch above one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchHistory {
    pub node: String,
    /// State at the top of the branch, when known.
    pub start_state: Option<usize>,
    /// Tabulated state of the node itself.
    pub end_state: Option<usize>,
    /// Changes ordered oldest first.
    pub changes: Vec<AnageneticChange>,
}

impl BranchHistory {
    fn new(node: &str) -> Self {
        Self {
            node: node.to_string(),
            start_state: None,
            end_state: None,
            changes: Vec::new(),
        }
    }

    /// State at a given age along the branch, if the branch start is known
    /// or at least one change happened above that age.
    pub fn state_at(&self, age: f64) -> Option<usize> {
        let mut state = self.start_state;
        for change in &self.changes {
            if change.age < age {
                break;
            }
            state = Some(change.to);
        }
        state
    }
}

/// One sampled history of one tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StochasticMap {
    pub tree_index: usize,
    pub iteration: usize,
    branches: BTreeMap<String, BranchHistory>,
    cladogenetic: Vec<CladogeneticChange>,
}

impl StochasticMap {
    fn new(tree_index: usize, iteration: usize) -> Self {
        Self {
            tree_index,
            iteration,
            branches: BTreeMap::new(),
            cladogenetic: Vec::new(),
        }
    }

    pub fn branch(&self, node: &str) -> Option<&BranchHistory> {
        self.branches.get(node)
    }

    /// Branch histories keyed by node label.
    pub fn branches(&self) -> impl Iterator<Item = &BranchHistory> {
        self.branches.values()
    }

    pub fn cladogenetic(&self) -> &[CladogeneticChange] {
        &self.cladogenetic
    }

    pub fn anagenetic(&self) -> impl Iterator<Item = &AnageneticChange> {
        self.branches.values().flat_map(|b| b.changes.iter())
    }

    pub fn n_anagenetic(&self) -> usize {
        self.branches.values().map(|b| b.changes.len()).sum()
    }

    fn inconsistent(&self, node: &str, message: String) -> StochasticMapError {
        StochasticMapError::InconsistentHistory {
            iteration: self.iteration,
            tree: self.tree_index,
            node: node.to_string(),
            message,
        }
    }

    /// Fill in branch end points from the tabulated states and check that
    /// every branch chains from its start to its end.
    fn resolve(
        &mut self,
        tree: &AnnotatedTree,
        states: &HashMap<&str, usize>,
    ) -> Result<(), StochasticMapError> {
        let clado_starts: HashMap<&str, usize> = self
            .cladogenetic
            .iter()
            .map(|c| (c.daughter.as_str(), c.to))
            .collect();

        for node in tree.nodes() {
            let label = node.label.as_str();
            if !self.branches.contains_key(label) && !states.contains_key(label) {
                continue;
            }

            let parent_state = node
                .parent
                .and_then(|p| states.get(tree[p].label.as_str()).copied());
            let start = clado_starts.get(label).copied().or(parent_state);
            let end = states.get(label).copied();

            let branch = self
                .branches
                .entry(label.to_string())
                .or_insert_with(|| BranchHistory::new(label));
            branch.start_state = start;
            branch.end_state = end;
            branch
                .changes
                .sort_by(|a, b| b.age.total_cmp(&a.age));
        }

        for branch in self.branches.values() {
            self.check_branch(branch)?;
        }

        for change in &self.cladogenetic {
            if let Some(&state) = states.get(change.parent.as_str()) {
                if state != change.from {
                    return Err(self.inconsistent(
                        &change.daughter,
                        format!(
                            "cladogenetic change starts from {} but '{}' is in state {state}",
                            change.from, change.parent
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_branch(&self, branch: &BranchHistory) -> Result<(), StochasticMapError> {
        let mut current = branch.start_state;
        for change in &branch.changes {
            if let Some(state) = current {
                if state != change.from {
                    return Err(self.inconsistent(
                        &branch.node,
                        format!(
                            "change at age {} leaves state {} but the branch is in state {state}",
                            change.age, change.from
                        ),
                    ));
                }
            }
            current = Some(change.to);
        }

        match (current, branch.end_state) {
            (Some(last), Some(end)) if last != end => Err(self.inconsistent(
                &branch.node,
                format!("branch ends in state {last} but the node is in state {end}"),
            )),
            _ => Ok(()),
        }
    }
}

/// Every stochastic map in a log, keyed by `(tree_index, iteration)`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StochasticMaps {
    maps: BTreeMap<(usize, usize), StochasticMap>,
}

impl StochasticMaps {
    /// Rebuild the maps of `events` and `node_states` against `trees`.
    ///
    /// With `attribute` set, only event rows tagged with that attribute are
    /// used.
    pub fn reconstruct(
        trees: &[AnnotatedTree],
        events: &[EventRecord],
        node_states: &[NodeStateRecord],
        attribute: Option<&str>,
    ) -> Result<Self, StochasticMapError> {
        let mut states: HashMap<(usize, usize), HashMap<&str, usize>> = HashMap::new();
        for record in node_states {
            let tree = tree_at(trees, record.tree_index)?;
            node_id(tree, record.tree_index, &record.node)?;
            states
                .entry((record.tree_index, record.iteration))
                .or_default()
                .insert(record.node.as_str(), record.state);
        }

        let mut maps: BTreeMap<(usize, usize), StochasticMap> = BTreeMap::new();
        for &(tree_index, iteration) in states.keys() {
            maps.insert(
                (tree_index, iteration),
                StochasticMap::new(tree_index, iteration),
            );
        }

        let selected = events
            .iter()
            .filter(|e| attribute.is_none() || e.attribute.as_deref() == attribute);
        for event in selected {
            let tree = tree_at(trees, event.tree_index)?;
            let id = node_id(tree, event.tree_index, &event.node)?;
            let map = maps
                .entry((event.tree_index, event.iteration))
                .or_insert_with(|| StochasticMap::new(event.tree_index, event.iteration));

            match event.transition_type {
                TransitionType::Anagenetic => {
                    check_on_branch(tree, id, event.age).map_err(|m| map.inconsistent(&event.node, m))?;
                    map.branches
                        .entry(event.node.clone())
                        .or_insert_with(|| BranchHistory::new(&event.node))
                        .changes
                        .push(AnageneticChange {
                            age: event.age,
                            from: event.from_state,
                            to: event.to_state,
                        });
                }
                TransitionType::Cladogenetic => {
                    let daughter = event.daughter.as_deref().unwrap_or_default();
                    let daughter_id = node_id(tree, event.tree_index, daughter)?;
                    if tree[daughter_id].parent != Some(id) {
                        return Err(map.inconsistent(
                            daughter,
                            format!("'{daughter}' is not a daughter of '{}'", event.node),
                        ));
                    }
                    map.cladogenetic.push(CladogeneticChange {
                        age: event.age,
                        parent: event.node.clone(),
                        daughter: daughter.to_string(),
                        from: event.from_state,
                        to: event.to_state,
                    });
                }
            }
        }

        let empty = HashMap::new();
        for (&(tree_index, iteration), map) in maps.iter_mut() {
            let tree = tree_at(trees, tree_index)?;
            let tabulated = states.get(&(tree_index, iteration)).unwrap_or(&empty);
            map.resolve(tree, tabulated)?;
            debug!(
                tree_index,
                iteration,
                anagenetic = map.n_anagenetic(),
                cladogenetic = map.cladogenetic.len(),
                "Reconstructed stochastic map"
            );
        }

        Ok(Self { maps })
    }

    pub fn get(&self, tree_index: usize, iteration: usize) -> Option<&StochasticMap> {
        self.maps.get(&(tree_index, iteration))
    }

    pub fn iter(&self) -> impl Iterator<Item = &StochasticMap> {
        self.maps.values()
    }

    /// Sampled iterations of one tree, in increasing order.
    pub fn iterations(&self, tree_index: usize) -> Vec<usize> {
        self.maps
            .keys()
            .filter(|(t, _)| *t == tree_index)
            .map(|&(_, i)| i)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

fn tree_at(trees: &[AnnotatedTree], index: usize) -> Result<&AnnotatedTree, StochasticMapError> {
    trees.get(index).ok_or(StochasticMapError::UnknownTree(index))
}

fn node_id(tree: &AnnotatedTree, index: usize, label: &str) -> Result<NodeId, StochasticMapError> {
    tree.find(label).ok_or_else(|| StochasticMapError::UnknownNode {
        tree: index,
        node: label.to_string(),
    })
}

/// A change on the branch above `id` must fall between the node's age and
/// its parent's age.
fn check_on_branch(tree: &AnnotatedTree, id: NodeId, age: f64) -> Result<(), String> {
    let bottom = tree.age(id);
    let top = tree[id].parent.map(|p| tree.age(p)).unwrap_or(bottom);
    if age < bottom - AGE_TOLERANCE || age > top + AGE_TOLERANCE {
        return Err(format!(
            "change at age {age} lies outside the branch ({bottom}, {top})"
        ));
    }
    Ok(())
}
