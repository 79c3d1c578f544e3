//! Live lineages and the tree they grow.
//!
//! The builder owns the node arena of one attempt. Each live lineage points
//! at the node of the branch it is currently extending; that branch is cut
//! (its length fixed) when the lineage splits, dies, or the process stops.

use crate::errors::AnnotatedTreeError;
use crate::evolution::SseEvent;
use crate::tree::{AnnotatedTree, NodeId, SampledAncestor, StateTransition, TreeNode, TreeSettings};

/// A lineage alive in the running process.
#[derive(Debug, Clone, PartialEq)]
pub struct Lineage {
    id: usize,
    state: usize,
    birth_time: f64,
    node: NodeId,
}

impl Lineage {
    pub fn new(id: usize, state: usize, birth_time: f64, node: NodeId) -> Self {
        Self {
            id,
            state,
            birth_time,
            node,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> usize {
        self.state
    }

    pub fn birth_time(&self) -> f64 {
        self.birth_time
    }

    /// Node of the branch this lineage is extending.
    pub fn node(&self) -> NodeId {
        self.node
    }
}

/// A sampling event waiting for its branch to be cut.
#[derive(Debug, Clone)]
struct PendingSample {
    label: String,
    node: NodeId,
    time: f64,
    state: usize,
}

/// Grows the tree of one simulation attempt.
#[derive(Debug)]
pub struct LineageTreeBuilder {
    nodes: Vec<TreeNode>,
    /// Forward time at the top of each node's branch.
    top_times: Vec<f64>,
    /// Forward time of each node, fixed when its branch is cut.
    node_times: Vec<f64>,
    lineages: Vec<Lineage>,
    samples: Vec<PendingSample>,
    with_origin: bool,
    n_states: usize,
    epsilon: f64,
    next_lineage: usize,
    n_speciations: usize,
}

impl LineageTreeBuilder {
    /// Start a process in `state` at time 0.
    ///
    /// With an origin there is one lineage below the origin node; otherwise
    /// the root has already split into two lineages.
    pub fn new(state: usize, with_origin: bool, n_states: usize, epsilon: f64) -> Self {
        let mut builder = Self {
            nodes: Vec::new(),
            top_times: Vec::new(),
            node_times: Vec::new(),
            lineages: Vec::new(),
            samples: Vec::new(),
            with_origin,
            n_states,
            epsilon,
            next_lineage: 1,
            n_speciations: 0,
        };

        let seed_label = if with_origin { "origin" } else { "root" };
        let seed = builder.push_node(TreeNode::new(seed_label).with_state(state), 0.0);
        builder.spawn(seed, state, 0.0);
        if !with_origin {
            builder.spawn(seed, state, 0.0);
        }
        builder
    }

    pub fn lineages(&self) -> &[Lineage] {
        &self.lineages
    }

    pub fn n_alive(&self) -> usize {
        self.lineages.len()
    }

    /// Speciation events so far (the initial split in root mode excluded).
    pub fn n_speciations(&self) -> usize {
        self.n_speciations
    }

    pub fn n_sampled_ancestors(&self) -> usize {
        self.samples.len()
    }

    /// Apply an event drawn by the event selector at forward time `time`.
    pub fn apply(&mut self, event: SseEvent, time: f64) {
        match event {
            SseEvent::Speciation {
                lineage,
                left,
                right,
            } => self.split(lineage, left, right, time),
            SseEvent::Extinction { lineage } => self.extinct(lineage, time),
            SseEvent::Transition { lineage, to } => self.transition(lineage, to, time),
            SseEvent::AncestorSampling { lineage } => self.sample_ancestor(lineage, time),
        }
    }

    /// Replace a lineage by two daughters starting in `left` and `right`.
    pub fn split(&mut self, index: usize, left: usize, right: usize, time: f64) {
        let lineage = self.lineages.swap_remove(index);
        self.cut(&lineage, time);

        let node = lineage.node;
        if self.with_origin && self.nodes[node.0].parent == Some(NodeId(0)) {
            self.nodes[node.0].label = "root".to_string();
        }

        self.spawn(node, left, time);
        self.spawn(node, right, time);
        self.n_speciations += 1;
    }

    /// Terminate a lineage at `time`.
    pub fn extinct(&mut self, index: usize, time: f64) {
        let lineage = self.lineages.swap_remove(index);
        self.cut(&lineage, time);
    }

    /// Anagenetic change of a lineage's state; the topology is unchanged.
    pub fn transition(&mut self, index: usize, to: usize, time: f64) {
        let lineage = &mut self.lineages[index];
        let node = &mut self.nodes[lineage.node.0];
        node.transitions.push(StateTransition {
            from: lineage.state,
            to,
            time,
        });
        node.state = Some(to);
        lineage.state = to;
    }

    /// Record a sampled ancestor on a lineage, which keeps evolving.
    pub fn sample_ancestor(&mut self, index: usize, time: f64) {
        let lineage = &self.lineages[index];
        let label = format!("sa{}", self.samples.len() + 1);
        self.samples.push(PendingSample {
            label,
            node: lineage.node,
            time,
            state: lineage.state,
        });
    }

    /// Stop the process at `stop_time`: every live lineage becomes an alive
    /// tip, sampled ancestors are attached and the tree is validated.
    pub fn finish(mut self, stop_time: f64) -> Result<AnnotatedTree, AnnotatedTreeError> {
        for lineage in std::mem::take(&mut self.lineages) {
            self.cut(&lineage, stop_time);
            self.nodes[lineage.node.0].alive = true;
        }

        let mut samples = std::mem::take(&mut self.samples);
        samples.sort_by(|a, b| a.time.total_cmp(&b.time));
        let sampled_ancestors = samples
            .into_iter()
            .map(|sample| self.attach_sample(sample))
            .collect::<Result<Vec<_>, _>>()?;

        let settings =
            TreeSettings::new(self.n_states, self.with_origin, self.epsilon).with_max_age(stop_time);
        let ages = self.node_times.iter().map(|t| stop_time - t).collect();
        AnnotatedTree::with_ages(self.nodes, sampled_ancestors, settings, ages)
    }

    fn push_node(&mut self, node: TreeNode, top_time: f64) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.top_times.push(top_time);
        self.node_times.push(top_time);
        id
    }

    /// Open a new branch below `parent` carried by a new lineage.
    fn spawn(&mut self, parent: NodeId, state: usize, time: f64) {
        let label = format!("nd{}", self.next_lineage);
        let mut node = TreeNode::new(label).with_state(state);
        node.parent = Some(parent);
        let id = self.push_node(node, time);
        self.nodes[parent.0].children.push(id);
        self.lineages
            .push(Lineage::new(self.next_lineage, state, time, id));
        self.next_lineage += 1;
    }

    fn cut(&mut self, lineage: &Lineage, time: f64) {
        let node = &mut self.nodes[lineage.node.0];
        node.edge_length = Some((time - lineage.birth_time).max(0.0));
        node.state = Some(lineage.state);
        self.node_times[lineage.node.0] = time;
    }

    /// Insert a dummy node at the sampling time between the lineage node and
    /// its parent, hosting the sampled-ancestor leaf on a zero-length edge.
    ///
    /// Samples on one branch must be attached oldest first.
    fn attach_sample(&mut self, sample: PendingSample) -> Result<SampledAncestor, AnnotatedTreeError> {
        let node = sample.node;
        let unresolved = || AnnotatedTreeError::UnresolvedSampledAncestor {
            label: sample.label.clone(),
            lineage: self.nodes[node.0].label.clone(),
        };

        let top = self.top_times[node.0];
        if self.nodes[node.0].edge_length.is_none() {
            return Err(unresolved());
        }
        let parent = self.nodes[node.0].parent.ok_or_else(unresolved)?;
        let bottom = self.node_times[node.0];

        let (above, below): (Vec<_>, Vec<_>) = self.nodes[node.0]
            .transitions
            .iter()
            .copied()
            .partition(|t| t.time < sample.time);

        let dummy = NodeId(self.nodes.len());
        let mut host = TreeNode::new(format!("dummy{}", sample.label.trim_start_matches("sa")));
        host.parent = Some(parent);
        host.children = vec![NodeId(dummy.0 + 1), node];
        host.edge_length = Some((sample.time - top).max(0.0));
        host.start_state = self.nodes[node.0].start_state;
        host.state = Some(sample.state);
        host.transitions = above;
        host.dummy = true;
        self.push_node(host, top);
        self.node_times[dummy.0] = sample.time;

        let mut leaf = TreeNode::new(sample.label.clone())
            .with_state(sample.state)
            .with_edge_length(0.0);
        leaf.parent = Some(dummy);
        leaf.sampled_ancestor = true;
        self.push_node(leaf, sample.time);

        for child in &mut self.nodes[parent.0].children {
            if *child == node {
                *child = dummy;
            }
        }
        let lineage_node = &mut self.nodes[node.0];
        lineage_node.parent = Some(dummy);
        lineage_node.edge_length = Some((bottom - sample.time).max(0.0));
        lineage_node.start_state = Some(sample.state);
        lineage_node.transitions = below;
        self.top_times[node.0] = sample.time;

        let mut sampled = SampledAncestor::new(sample.label, lineage_node.label.clone(), sample.time);
        sampled.time_to_lineage_node = Some(bottom - sample.time);
        Ok(sampled)
    }
}
