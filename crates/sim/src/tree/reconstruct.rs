//! Reconstructed trees: only lineages observed at the present or as
//! sampled ancestors, with unifurcations suppressed.

use crate::errors::AnnotatedTreeError;
use crate::tree::annotated::{AnnotatedTree, TreeSettings};
use crate::tree::node::{NodeId, SampledAncestor, StateTransition, TreeNode};

impl AnnotatedTree {
    /// Prune unobserved lineages. Returns `None` if nothing was observed.
    ///
    /// Merged branches keep the state at their top, the state at their
    /// bottom node, and every transition along the way. An origin is kept
    /// as the only unifurcation. Sampled ancestors are keyed by the node
    /// that ends their lineage in the pruned tree.
    pub fn reconstructed(&self) -> Result<Option<AnnotatedTree>, AnnotatedTreeError> {
        if self.n_observed() == 0 {
            return Ok(None);
        }

        let observed = self.observed_mask();
        let mut nodes = Vec::new();
        let mut ages = Vec::new();
        self.copy_branch(self.seed(), None, &observed, &mut nodes, &mut ages);

        let max_age = if self.with_origin() {
            self.max_age()
        } else {
            ages[0]
        };

        let sampled: Vec<SampledAncestor> = self
            .sampled_ancestors()
            .values()
            .flatten()
            .filter_map(|sa| self.relocate_sample(sa, &observed))
            .collect();

        let settings = TreeSettings {
            max_age: Some(max_age),
            ..self.settings()
        };
        AnnotatedTree::with_ages(nodes, sampled, settings, ages).map(Some)
    }

    /// Re-key a sampled ancestor to the first non-dummy node below it in
    /// the pruned tree. A sample whose lineage left no observed descendant
    /// ends its own branch and is keyed by its own label.
    fn relocate_sample(&self, sa: &SampledAncestor, observed: &[bool]) -> Option<SampledAncestor> {
        let leaf = self.find(&sa.label)?;
        let host = self[leaf].parent?;
        let mut next = self[host]
            .children
            .iter()
            .copied()
            .find(|&c| c != leaf && observed[c.0]);

        let mut end = leaf;
        while let Some(id) = next {
            let (bottom, _, _) = self.collapse(id, observed);
            end = bottom;
            next = if self[bottom].dummy {
                self[bottom]
                    .children
                    .iter()
                    .copied()
                    .find(|&c| !self[c].sampled_ancestor && observed[c.0])
            } else {
                None
            };
        }

        let mut moved = sa.clone();
        moved.lineage = self[end].label.clone();
        moved.time_to_lineage_node = Some(self.age(leaf) - self.age(end));
        Some(moved)
    }

    /// `true` for every node with an observed leaf below it.
    fn observed_mask(&self) -> Vec<bool> {
        let mut order = Vec::with_capacity(self.num_nodes());
        let mut stack = vec![self.seed()];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self[id].children.iter().copied());
        }

        let mut observed = vec![false; self.num_nodes()];
        for &id in order.iter().rev() {
            let node = &self[id];
            observed[id.0] = if node.is_leaf() {
                node.alive || node.sampled_ancestor
            } else {
                node.children.iter().any(|c| observed[c.0])
            };
        }
        observed
    }

    fn kept_children(&self, id: NodeId, observed: &[bool]) -> Vec<NodeId> {
        self[id]
            .children
            .iter()
            .copied()
            .filter(|c| observed[c.0])
            .collect()
    }

    /// Follow single observed children down from `id`. Returns the bottom
    /// node, the merged branch length and the merged transitions.
    fn collapse(&self, id: NodeId, observed: &[bool]) -> (NodeId, f64, Vec<StateTransition>) {
        let mut edge = self[id].edge_length.unwrap_or(0.0);
        let mut transitions = self[id].transitions.clone();
        let mut bottom = id;
        if id == self.seed() && self.with_origin() {
            return (bottom, edge, transitions);
        }
        loop {
            let kept = self.kept_children(bottom, observed);
            if kept.len() != 1 {
                break;
            }
            bottom = kept[0];
            edge += self[bottom].edge_length.unwrap_or(0.0);
            transitions.extend(self[bottom].transitions.iter().copied());
        }
        (bottom, edge, transitions)
    }

    fn copy_branch(
        &self,
        id: NodeId,
        parent: Option<NodeId>,
        observed: &[bool],
        nodes: &mut Vec<TreeNode>,
        ages: &mut Vec<f64>,
    ) -> NodeId {
        let (bottom, edge, transitions) = self.collapse(id, observed);

        let mut node = self[bottom].clone();
        node.parent = parent;
        node.children = Vec::new();
        node.edge_length = parent.map(|_| edge);
        node.transitions = transitions;
        node.start_state = self[id].start_state;

        let new_id = NodeId(nodes.len());
        nodes.push(node);
        ages.push(self.age(bottom));
        for child in self.kept_children(bottom, observed) {
            let child = self.copy_branch(child, Some(new_id), observed, nodes, ages);
            nodes[new_id.0].children.push(child);
        }
        new_id
    }
}
