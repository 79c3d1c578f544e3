//! Output trees: node arena, validation, Newick/Nexus I/O.

pub mod annotated;
pub mod newick;
pub mod nexus;
pub mod node;
mod parser;
mod reconstruct;

pub use annotated::{AnnotatedTree, TreeSettings};
pub use newick::{write_newick, NewickOptions};
pub use nexus::{write_nexus, write_nexus_file, write_nexus_string};
pub use node::{NodeId, NodeRole, SampledAncestor, StateTransition, TreeNode};
