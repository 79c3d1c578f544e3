//! The annotated output tree.
//!
//! An [`AnnotatedTree`] is validated once at construction and immutable
//! afterwards. Only derived caches (the Newick string) are filled lazily.

use crate::errors::AnnotatedTreeError;
use crate::tree::newick::{write_newick, NewickOptions};
use crate::tree::nexus::write_nexus_string;
use crate::tree::node::{NodeId, NodeRole, SampledAncestor, TreeNode};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Index;
use std::sync::OnceLock;

/// Settings shared by every tree of a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TreeSettings {
    /// Number of discrete (compound) states of the process.
    pub n_states: usize,
    /// The process starts at an origin (an edge above the first node)
    /// rather than at a bifurcating root.
    pub with_origin: bool,
    /// Time from the start of the process to the present. Defaults to the
    /// height of the tree.
    pub max_age: Option<f64>,
    /// Tolerance for age comparisons.
    pub epsilon: f64,
}

impl TreeSettings {
    pub fn new(n_states: usize, with_origin: bool, epsilon: f64) -> Self {
        Self {
            n_states,
            with_origin,
            max_age: None,
            epsilon,
        }
    }

    pub fn with_max_age(mut self, max_age: f64) -> Self {
        self.max_age = Some(max_age);
        self
    }
}

/// A phylogenetic tree produced by (or read for) an SSE process.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedTree {
    nodes: Vec<TreeNode>,
    seed: NodeId,
    n_states: usize,
    with_origin: bool,
    max_age: f64,
    epsilon: f64,
    /// Age (time before present) of every node.
    ages: Vec<f64>,
    /// Sampled ancestors keyed by the label of the lineage carrying them.
    sampled_ancestors: BTreeMap<String, Vec<SampledAncestor>>,
    n_extant: usize,
    n_extinct: usize,
    n_sampled: usize,
    #[serde(skip)]
    newick: OnceLock<String>,
}

impl AnnotatedTree {
    /// Validate and wrap a node arena.
    ///
    /// # Errors
    /// - `Malformed` if the parent/child links do not form one rooted tree, a
    ///   branch has no (or a negative) length, an origin does not have exactly
    ///   one child, or a node lies deeper than `max_age`
    /// - `LineageMissannotation` if a node flagged alive is not a tip at the
    ///   present (age 0 within [`AnnotatedTree::age_tolerance`])
    /// - `UnresolvedSampledAncestor` if a sampled ancestor was never tied
    ///   to its lineage node
    pub fn new(
        nodes: Vec<TreeNode>,
        sampled_ancestors: Vec<SampledAncestor>,
        settings: TreeSettings,
    ) -> Result<Self, AnnotatedTreeError> {
        Self::assemble(nodes, sampled_ancestors, settings, None)
    }

    /// Validate and wrap a node arena whose node ages are already known.
    ///
    /// Ages are taken as given instead of being rebuilt from edge lengths,
    /// so nodes cut at the stop time have age exactly 0. `max_age` defaults
    /// to the age of the first node. Validation is the same as for
    /// [`AnnotatedTree::new`], and an age vector of the wrong length is
    /// `Malformed`.
    pub fn with_ages(
        nodes: Vec<TreeNode>,
        sampled_ancestors: Vec<SampledAncestor>,
        settings: TreeSettings,
        ages: Vec<f64>,
    ) -> Result<Self, AnnotatedTreeError> {
        if ages.len() != nodes.len() {
            return Err(AnnotatedTreeError::Malformed(format!(
                "{} node age(s) given for {} node(s)",
                ages.len(),
                nodes.len()
            )));
        }
        Self::assemble(nodes, sampled_ancestors, settings, Some(ages))
    }

    fn assemble(
        nodes: Vec<TreeNode>,
        sampled_ancestors: Vec<SampledAncestor>,
        settings: TreeSettings,
        known_ages: Option<Vec<f64>>,
    ) -> Result<Self, AnnotatedTreeError> {
        let seed = check_structure(&nodes)?;
        let epsilon = settings.epsilon;

        if settings.with_origin && nodes[seed.0].children.len() != 1 {
            return Err(AnnotatedTreeError::Malformed(format!(
                "origin '{}' must have exactly one child, found {}",
                nodes[seed.0].label,
                nodes[seed.0].children.len()
            )));
        }

        let depths = node_depths(&nodes, seed, epsilon)?;
        let max_age = match (settings.max_age, &known_ages) {
            (Some(max_age), _) => max_age,
            (None, Some(ages)) => ages[seed.0],
            (None, None) => depths.iter().copied().fold(0.0, f64::max),
        };
        let tolerance = age_tolerance(epsilon, max_age);

        let ages: Vec<f64> = match known_ages {
            Some(ages) => {
                if ages[seed.0] > max_age + tolerance {
                    return Err(AnnotatedTreeError::Malformed(format!(
                        "first node age {} exceeds its maximum age {max_age}",
                        ages[seed.0]
                    )));
                }
                if let Some((node, age)) = nodes
                    .iter()
                    .zip(&ages)
                    .find(|(_, age)| **age < -tolerance)
                {
                    return Err(AnnotatedTreeError::Malformed(format!(
                        "node '{}' has negative age {age}",
                        node.label
                    )));
                }
                ages
            }
            None => {
                let height = depths.iter().copied().fold(0.0, f64::max);
                if height > max_age + tolerance {
                    return Err(AnnotatedTreeError::Malformed(format!(
                        "tree height {height} exceeds its maximum age {max_age}"
                    )));
                }
                depths.iter().map(|d| max_age - d).collect()
            }
        };

        for (node, &age) in nodes.iter().zip(&ages) {
            if !node.alive {
                continue;
            }
            if !node.is_leaf() {
                return Err(AnnotatedTreeError::LineageMissannotation(format!(
                    "node '{}' has {} child node(s) but is flagged alive",
                    node.label,
                    node.children.len()
                )));
            }
            if age.abs() > tolerance {
                return Err(AnnotatedTreeError::LineageMissannotation(format!(
                    "node '{}' is flagged alive but its age {age} is not maximal \
                     (alive nodes must have age 0 at max age {max_age}, epsilon {epsilon})",
                    node.label
                )));
            }
        }

        let mut by_lineage: BTreeMap<String, Vec<SampledAncestor>> = BTreeMap::new();
        for sa in sampled_ancestors {
            if sa.time_to_lineage_node.is_none() {
                return Err(AnnotatedTreeError::UnresolvedSampledAncestor {
                    label: sa.label,
                    lineage: sa.lineage,
                });
            }
            by_lineage.entry(sa.lineage.clone()).or_default().push(sa);
        }

        let leaves = || nodes.iter().filter(|n| n.is_leaf());
        let n_extant = leaves().filter(|n| n.alive).count();
        let n_sampled = leaves().filter(|n| n.sampled_ancestor).count();
        let n_extinct = leaves()
            .filter(|n| !n.alive && !n.sampled_ancestor)
            .count();

        Ok(Self {
            nodes,
            seed,
            n_states: settings.n_states,
            with_origin: settings.with_origin,
            max_age,
            epsilon,
            ages,
            sampled_ancestors: by_lineage,
            n_extant,
            n_extinct,
            n_sampled,
            newick: OnceLock::new(),
        })
    }

    /// Settings this tree was built with (`max_age` resolved).
    pub fn settings(&self) -> TreeSettings {
        TreeSettings {
            n_states: self.n_states,
            with_origin: self.with_origin,
            max_age: Some(self.max_age),
            epsilon: self.epsilon,
        }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// The first node of the tree: the origin, or the root without origin.
    pub fn seed(&self) -> NodeId {
        self.seed
    }

    /// The first bifurcating node (below the origin if there is one).
    pub fn root(&self) -> NodeId {
        if self.with_origin {
            self.nodes[self.seed.0].children[0]
        } else {
            self.seed
        }
    }

    pub fn n_states(&self) -> usize {
        self.n_states
    }

    pub fn with_origin(&self) -> bool {
        self.with_origin
    }

    /// Time from the start of the process to the present.
    pub fn max_age(&self) -> f64 {
        self.max_age
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Tolerance for age comparisons: `epsilon`, widened to the rounding
    /// error of ages as large as `max_age`.
    pub fn age_tolerance(&self) -> f64 {
        age_tolerance(self.epsilon, self.max_age)
    }

    /// Age (time before the present) of a node.
    pub fn age(&self, id: NodeId) -> f64 {
        self.ages[id.0]
    }

    /// Forward time of a node since the start of the process.
    pub fn time(&self, id: NodeId) -> f64 {
        self.max_age - self.ages[id.0]
    }

    pub fn role(&self, id: NodeId) -> NodeRole {
        let node = &self[id];
        if id == self.seed {
            if self.with_origin {
                NodeRole::Origin
            } else {
                NodeRole::Root
            }
        } else if node.is_leaf() {
            NodeRole::Tip
        } else if self.with_origin && node.parent == Some(self.seed) {
            NodeRole::Root
        } else {
            NodeRole::Internal
        }
    }

    /// Find a node by label.
    pub fn find(&self, label: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.label == label)
            .map(NodeId)
    }

    /// Leaf nodes in insertion order.
    pub fn leaves(&self) -> impl Iterator<Item = (NodeId, &TreeNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_leaf())
            .map(|(i, n)| (NodeId(i), n))
    }

    /// Labels of every leaf (extant, extinct and sampled) in insertion order.
    pub fn taxa(&self) -> Vec<&str> {
        self.leaves().map(|(_, n)| n.label.as_str()).collect()
    }

    /// Labels of the tips alive at the present, in insertion order.
    pub fn extant_taxa(&self) -> Vec<&str> {
        self.leaves()
            .filter(|(_, n)| n.alive)
            .map(|(_, n)| n.label.as_str())
            .collect()
    }

    pub fn n_extant(&self) -> usize {
        self.n_extant
    }

    pub fn n_extinct(&self) -> usize {
        self.n_extinct
    }

    pub fn n_sampled_ancestors(&self) -> usize {
        self.n_sampled
    }

    /// Number of taxa in the reconstructed tree: extant tips plus sampled ancestors.
    pub fn n_observed(&self) -> usize {
        self.n_extant + self.n_sampled
    }

    /// Number of speciation events.
    ///
    /// Nodes hosting a sampled ancestor are not speciations, and neither is
    /// the root of a tree without origin: such a process starts already
    /// split. This is the count speciation conditioning is checked against.
    pub fn n_speciations(&self) -> usize {
        self.nodes
            .iter()
            .enumerate()
            .filter(|&(i, n)| {
                n.children.len() == 2 && !n.dummy && (self.with_origin || i != self.seed.0)
            })
            .count()
    }

    /// No lineage was alive at the present.
    pub fn died(&self) -> bool {
        self.n_extant == 0
    }

    pub fn sampled_ancestors(&self) -> &BTreeMap<String, Vec<SampledAncestor>> {
        &self.sampled_ancestors
    }

    /// Sampled ancestors on the lineage with the given label.
    pub fn sampled_ancestors_on(&self, lineage: &str) -> &[SampledAncestor] {
        self.sampled_ancestors
            .get(lineage)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether both subtrees of the root carry at least one observed taxon.
    pub fn observed_both_sides_of_root(&self) -> bool {
        let root = &self[self.root()];
        root.children.len() == 2
            && root
                .children
                .iter()
                .all(|&child| self.subtree_has_observed(child))
    }

    fn subtree_has_observed(&self, id: NodeId) -> bool {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let node = &self[id];
            if node.is_leaf() && (node.alive || node.sampled_ancestor) {
                return true;
            }
            stack.extend(node.children.iter().copied());
        }
        false
    }

    /// Newick string with origin, internal labels and branch lengths (cached).
    pub fn newick(&self) -> &str {
        self.newick
            .get_or_init(|| write_newick(self, &NewickOptions::default()))
    }

    /// Newick string with custom options.
    pub fn to_newick(&self, options: &NewickOptions) -> String {
        write_newick(self, options)
    }

    /// Single-tree Nexus document.
    pub fn to_nexus(&self) -> String {
        write_nexus_string(std::slice::from_ref(self))
    }
}

impl Index<NodeId> for AnnotatedTree {
    type Output = TreeNode;

    fn index(&self, id: NodeId) -> &Self::Output {
        &self.nodes[id.0]
    }
}

impl PartialEq for AnnotatedTree {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
            && self.seed == other.seed
            && self.n_states == other.n_states
            && self.with_origin == other.with_origin
            && self.max_age == other.max_age
            && self.sampled_ancestors == other.sampled_ancestors
    }
}

/// Check parent/child consistency and that every node hangs off a single
/// parentless node. Returns that node.
fn check_structure(nodes: &[TreeNode]) -> Result<NodeId, AnnotatedTreeError> {
    let malformed = |msg: String| AnnotatedTreeError::Malformed(msg);

    if nodes.is_empty() {
        return Err(malformed("tree has no nodes".into()));
    }

    let mut seed = None;
    for (i, node) in nodes.iter().enumerate() {
        let id = NodeId(i);
        match node.parent {
            None => {
                if let Some(other) = seed.replace(id) {
                    return Err(malformed(format!(
                        "nodes '{}' and '{}' both lack a parent",
                        nodes[other.0].label, node.label
                    )));
                }
            }
            Some(parent) => {
                let parent_node = nodes.get(parent.0).ok_or_else(|| {
                    malformed(format!("node '{}' points to missing parent {parent}", node.label))
                })?;
                if !parent_node.children.contains(&id) {
                    return Err(malformed(format!(
                        "node '{}' is not listed as a child of its parent '{}'",
                        node.label, parent_node.label
                    )));
                }
            }
        }
        for &child in &node.children {
            let child_node = nodes.get(child.0).ok_or_else(|| {
                malformed(format!("node '{}' points to missing child {child}", node.label))
            })?;
            if child_node.parent != Some(id) {
                return Err(malformed(format!(
                    "node '{}' lists '{}' as a child but is not its parent",
                    node.label, child_node.label
                )));
            }
        }
    }

    let seed = seed.ok_or_else(|| malformed("every node has a parent".into()))?;

    let mut visited = vec![false; nodes.len()];
    let mut stack = vec![seed];
    while let Some(id) = stack.pop() {
        if visited[id.0] {
            return Err(malformed(format!("node '{}' is reached twice", nodes[id.0].label)));
        }
        visited[id.0] = true;
        stack.extend(nodes[id.0].children.iter().copied());
    }
    let unreachable = visited.iter().filter(|v| !**v).count();
    if unreachable > 0 {
        return Err(malformed(format!(
            "{unreachable} node(s) unreachable from '{}'",
            nodes[seed.0].label
        )));
    }

    Ok(seed)
}

/// Relative rounding allowed on ages, a few hundred ulps.
const AGE_ROUNDING: f64 = 1024.0 * f64::EPSILON;

fn age_tolerance(epsilon: f64, max_age: f64) -> f64 {
    epsilon.max(max_age.abs() * AGE_ROUNDING)
}

/// Distance of every node from the seed.
fn node_depths(
    nodes: &[TreeNode],
    seed: NodeId,
    epsilon: f64,
) -> Result<Vec<f64>, AnnotatedTreeError> {
    let mut depths = vec![0.0; nodes.len()];
    let mut stack = vec![seed];
    while let Some(id) = stack.pop() {
        for &child in &nodes[id.0].children {
            let node = &nodes[child.0];
            let length = match node.edge_length {
                Some(length) if length.is_finite() && length >= -epsilon => length.max(0.0),
                Some(length) => {
                    return Err(AnnotatedTreeError::Malformed(format!(
                        "node '{}' has invalid edge length {length}",
                        node.label
                    )));
                }
                None => {
                    return Err(AnnotatedTreeError::Malformed(format!(
                        "node '{}' has no edge length",
                        node.label
                    )));
                }
            };
            depths[child.0] = depths[id.0] + length;
            stack.push(child);
        }
    }
    Ok(depths)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// origin -> root -> (nd1 alive, nd2 extinct)
    fn small_nodes(nd1_alive: bool) -> Vec<TreeNode> {
        let mut origin = TreeNode::new("origin").with_state(0);
        origin.children = vec![NodeId(1)];

        let mut root = TreeNode::new("root").with_state(0).with_edge_length(1.0);
        root.parent = Some(NodeId(0));
        root.children = vec![NodeId(2), NodeId(3)];

        let mut nd1 = TreeNode::new("nd1").with_state(0).with_edge_length(2.0);
        nd1.parent = Some(NodeId(1));
        nd1.alive = nd1_alive;

        let mut nd2 = TreeNode::new("nd2").with_state(0).with_edge_length(0.5);
        nd2.parent = Some(NodeId(1));

        vec![origin, root, nd1, nd2]
    }

    fn settings() -> TreeSettings {
        TreeSettings::new(2, true, 1e-9).with_max_age(3.0)
    }

    #[test]
    fn test_valid_tree() {
        let tree = AnnotatedTree::new(small_nodes(true), vec![], settings()).unwrap();
        assert_eq!(tree.n_extant(), 1);
        assert_eq!(tree.n_extinct(), 1);
        assert!(!tree.died());
        assert_eq!(tree.root(), NodeId(1));
        assert_eq!(tree.role(NodeId(0)), NodeRole::Origin);
        assert_eq!(tree.role(NodeId(1)), NodeRole::Root);
        assert_eq!(tree.role(NodeId(3)), NodeRole::Tip);
        assert!((tree.age(NodeId(3)) - 1.5).abs() < 1e-12);
        assert!(tree.age(NodeId(2)).abs() < 1e-12);
        assert_eq!(tree.taxa(), vec!["nd1", "nd2"]);
        assert_eq!(tree.extant_taxa(), vec!["nd1"]);
        assert_eq!(tree.n_speciations(), 1);
    }

    #[test]
    fn test_alive_non_maximal_is_missannotation() {
        let mut nodes = small_nodes(true);
        nodes[3].alive = true;
        let err = AnnotatedTree::new(nodes, vec![], settings()).unwrap_err();
        match err {
            AnnotatedTreeError::LineageMissannotation(msg) => {
                assert!(msg.contains("nd2"));
                assert!(msg.contains("not maximal"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_alive_internal_is_missannotation() {
        let mut nodes = small_nodes(true);
        nodes[1].alive = true;
        assert!(matches!(
            AnnotatedTree::new(nodes, vec![], settings()),
            Err(AnnotatedTreeError::LineageMissannotation(_))
        ));
    }

    #[test]
    fn test_height_beyond_max_age() {
        let nodes = small_nodes(false);
        let settings = TreeSettings::new(2, true, 1e-9).with_max_age(2.0);
        assert!(matches!(
            AnnotatedTree::new(nodes, vec![], settings),
            Err(AnnotatedTreeError::Malformed(_))
        ));
    }

    #[test]
    fn test_died_tree() {
        let tree = AnnotatedTree::new(small_nodes(false), vec![], settings()).unwrap();
        assert!(tree.died());
        assert_eq!(tree.n_observed(), 0);
        assert!(!tree.observed_both_sides_of_root());
    }

    #[test]
    fn test_unresolved_sampled_ancestor() {
        let sa = SampledAncestor::new("sa1", "nd1", 1.5);
        assert!(matches!(
            AnnotatedTree::new(small_nodes(true), vec![sa], settings()),
            Err(AnnotatedTreeError::UnresolvedSampledAncestor { .. })
        ));
    }

    #[test]
    fn test_broken_links() {
        let mut nodes = small_nodes(true);
        nodes[1].children.pop();
        assert!(matches!(
            AnnotatedTree::new(nodes, vec![], settings()),
            Err(AnnotatedTreeError::Malformed(_))
        ));

        let mut nodes = small_nodes(true);
        nodes[3].parent = None;
        assert!(matches!(
            AnnotatedTree::new(nodes, vec![], settings()),
            Err(AnnotatedTreeError::Malformed(_))
        ));
    }

    #[test]
    fn test_origin_needs_single_child() {
        let nodes = small_nodes(true);
        let settings = TreeSettings::new(2, false, 1e-9).with_max_age(3.0);
        // Without origin the same arena is fine
        assert!(AnnotatedTree::new(nodes.clone(), vec![], settings).is_ok());

        let mut nodes = nodes;
        nodes[0].children.push(NodeId(4));
        let mut extra = TreeNode::new("nd3").with_edge_length(1.0);
        extra.parent = Some(NodeId(0));
        nodes.push(extra);
        assert!(matches!(
            AnnotatedTree::new(nodes, vec![], self::settings()),
            Err(AnnotatedTreeError::Malformed(_))
        ));
    }
    #[test]
    fn test_known_ages_are_kept() {
        let ages = vec![3.0, 2.0, 0.0, 1.5];
        let tree =
            AnnotatedTree::with_ages(small_nodes(true), vec![], settings(), ages).unwrap();
        assert_eq!(tree.age(NodeId(2)), 0.0);
        assert_eq!(tree.age(NodeId(3)), 1.5);
        assert_eq!(tree.max_age(), 3.0);

        let err = AnnotatedTree::with_ages(small_nodes(true), vec![], settings(), vec![3.0])
            .unwrap_err();
        assert!(matches!(err, AnnotatedTreeError::Malformed(_)));

        let err = AnnotatedTree::with_ages(
            small_nodes(false),
            vec![],
            settings(),
            vec![3.0, 2.0, -0.5, 1.5],
        )
        .unwrap_err();
        assert!(matches!(err, AnnotatedTreeError::Malformed(_)));
    }

    #[test]
    fn test_alive_check_scales_with_tree_age() {
        // Tips reached through different sums of edges differ by rounding
        let tree = AnnotatedTree::from_newick(
            "((a:0.3,(b:0.1,c:0.1)x:0.2)root:10000)origin;",
            1,
            1e-12,
        )
        .unwrap();
        assert_eq!(tree.n_extant(), 3);
        assert!(tree.age_tolerance() > tree.epsilon());

        // A tip 0.1 above the present is still rejected at this scale
        let tree =
            AnnotatedTree::from_newick("((a:0.3,b:0.2)root:10000)origin;", 1, 1e-12).unwrap();
        let mut nodes = tree.nodes().to_vec();
        let b = tree.find("b").unwrap();
        nodes[b.0].alive = true;
        let err = AnnotatedTree::new(nodes, vec![], tree.settings()).unwrap_err();
        assert!(matches!(err, AnnotatedTreeError::LineageMissannotation(_)));
    }

    #[test]
    fn test_root_split_is_not_a_speciation() {
        let tree = AnnotatedTree::from_newick("((a:1,b:1)nd1:1,c:2)root;", 1, 1e-9).unwrap();
        assert_eq!(tree.n_speciations(), 1);

        let tree = AnnotatedTree::from_newick("((a:1,b:1)root:1)origin;", 1, 1e-9).unwrap();
        assert_eq!(tree.n_speciations(), 1);
    }
}
