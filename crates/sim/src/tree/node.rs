use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a node in a tree's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position of a node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    /// Start of the process above the first real node (one child).
    Origin,
    /// First bifurcating node of the process.
    Root,
    Internal,
    Tip,
}

/// An anagenetic state change along the branch subtending a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: usize,
    pub to: usize,
    /// Forward time since the start of the process.
    pub time: f64,
}

/// A node of an output tree together with its subtending branch.
///
/// Links are arena indices; the arena owns every node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub label: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Time since the parent node; `None` for the first node of the tree.
    pub edge_length: Option<f64>,
    /// Extant at the stop time.
    pub alive: bool,
    /// State at the top of the subtending branch.
    pub start_state: Option<usize>,
    /// State at the node itself (bottom of the subtending branch).
    pub state: Option<usize>,
    /// Anagenetic changes along the subtending branch, oldest first.
    pub transitions: Vec<StateTransition>,
    pub sampled_ancestor: bool,
    /// Inserted only to host a sampled ancestor.
    pub dummy: bool,
}

impl TreeNode {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            parent: None,
            children: Vec::new(),
            edge_length: None,
            alive: false,
            start_state: None,
            state: None,
            transitions: Vec::new(),
            sampled_ancestor: false,
            dummy: false,
        }
    }

    pub fn with_edge_length(mut self, length: f64) -> Self {
        self.edge_length = Some(length);
        self
    }

    pub fn with_state(mut self, state: usize) -> Self {
        self.start_state = Some(state);
        self.state = Some(state);
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// States along the branch, oldest first: the start state followed by
    /// the arriving state of every transition.
    pub fn state_history(&self) -> Vec<usize> {
        self.start_state
            .into_iter()
            .chain(self.transitions.iter().map(|t| t.to))
            .collect()
    }
}

/// A lineage observed at a point in time while it kept evolving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledAncestor {
    pub label: String,
    /// Label of the lineage node whose branch carries the sample.
    pub lineage: String,
    /// Forward time of the sampling event.
    pub time: f64,
    /// Time from the sample down to the lineage node, known once the
    /// lineage's branch is cut.
    pub time_to_lineage_node: Option<f64>,
}

impl SampledAncestor {
    pub fn new(label: impl Into<String>, lineage: impl Into<String>, time: f64) -> Self {
        Self {
            label: label.into(),
            lineage: lineage.into(),
            time,
            time_to_lineage_node: None,
        }
    }
}
