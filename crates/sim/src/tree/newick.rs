//! Newick writer for annotated trees.

use crate::tree::annotated::AnnotatedTree;
use crate::tree::node::NodeId;

/// Rough characters per node (label, branch length, punctuation).
const CHARS_PER_NODE: usize = 24;

/// Controls what [`write_newick`] emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewickOptions {
    /// Emit the origin as a unifurcation above the root.
    pub include_origin: bool,
    /// Emit labels of internal nodes (root and origin included).
    pub internal_labels: bool,
    pub branch_lengths: bool,
}

impl Default for NewickOptions {
    fn default() -> Self {
        Self {
            include_origin: true,
            internal_labels: true,
            branch_lengths: true,
        }
    }
}

impl NewickOptions {
    pub fn without_origin() -> Self {
        Self {
            include_origin: false,
            ..Self::default()
        }
    }

    /// Leaf labels and branch lengths only.
    pub fn topology() -> Self {
        Self {
            include_origin: false,
            internal_labels: false,
            branch_lengths: true,
        }
    }
}

/// Newick string of a tree, terminated by `;`.
///
/// For example `((nd1:1,nd2:1)root:0.5)origin;` for a tree with origin.
pub fn write_newick(tree: &AnnotatedTree, options: &NewickOptions) -> String {
    let mut newick = String::with_capacity(tree.num_nodes() * CHARS_PER_NODE);
    let start = if options.include_origin {
        tree.seed()
    } else {
        tree.root()
    };
    build_newick(tree, start, start, options, &mut newick);
    newick.push(';');
    newick
}

fn build_newick(
    tree: &AnnotatedTree,
    index: NodeId,
    start: NodeId,
    options: &NewickOptions,
    newick: &mut String,
) {
    let node = &tree[index];

    if !node.is_leaf() {
        newick.push('(');
        for (i, &child) in node.children.iter().enumerate() {
            if i > 0 {
                newick.push(',');
            }
            build_newick(tree, child, start, options, newick);
        }
        newick.push(')');
    }

    if node.is_leaf() || options.internal_labels {
        newick.push_str(&escape_label(&node.label));
    }

    if options.branch_lengths && index != start {
        if let Some(length) = node.edge_length {
            newick.push(':');
            newick.push_str(&length.to_string());
        }
    }
}

/// Quote a label if it contains Newick punctuation or whitespace.
pub(crate) fn escape_label(label: &str) -> String {
    let needs_quotes = label.chars().any(|c| {
        matches!(
            c,
            ' ' | ',' | ';' | '\t' | '\n' | '\r' | '(' | ')' | ':' | '[' | ']' | '\''
        )
    });
    if needs_quotes {
        format!("'{}'", label.replace('\'', "''"))
    } else {
        label.to_string()
    }
}
