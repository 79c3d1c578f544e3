//! Nexus writer: a TAXA block listing every leaf followed by a TREES block.

use crate::tree::annotated::AnnotatedTree;
use crate::tree::newick::escape_label;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub(crate) const NEXUS_HEADER: &str = "#NEXUS";
pub(crate) const BLOCK_BEGIN: &str = "Begin";
pub(crate) const BLOCK_END: &str = "End;";
pub(crate) const TAXA: &str = "taxa";
pub(crate) const TREES: &str = "trees";
pub(crate) const DIMENSIONS: &str = "Dimensions";
pub(crate) const NTAX: &str = "ntax";
pub(crate) const TAXLABELS: &str = "Taxlabels";
pub(crate) const TRANSLATE: &str = "Translate";
pub(crate) const TREE: &str = "tree";

/// Nexus document for one or more trees.
///
/// The taxa block lists every leaf (extant, extinct and sampled ancestors)
/// in order of first appearance across the trees. Trees are named
/// `tree_1`, `tree_2`, ... and written with full labels.
pub fn write_nexus_string(trees: &[AnnotatedTree]) -> String {
    let mut out = Vec::new();
    // Writing into a Vec<u8> cannot fail
    let _ = write_nexus(&mut out, trees);
    String::from_utf8_lossy(&out).into_owned()
}

/// Write a Nexus document to a file.
pub fn write_nexus_file(path: impl AsRef<Path>, trees: &[AnnotatedTree]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_nexus(&mut writer, trees)?;
    writer.flush()
}

/// Write a Nexus document to any writer.
pub fn write_nexus<W: Write>(writer: &mut W, trees: &[AnnotatedTree]) -> io::Result<()> {
    let taxa = collect_taxa(trees);

    writeln!(writer, "{NEXUS_HEADER}")?;
    writeln!(writer, "{BLOCK_BEGIN} {TAXA};")?;
    writeln!(writer, "\t{DIMENSIONS} {NTAX}={};", taxa.len())?;
    write!(writer, "\t{TAXLABELS}")?;
    for label in &taxa {
        write!(writer, " {}", escape_label(label))?;
    }
    writeln!(writer, ";")?;
    writeln!(writer, "{BLOCK_END}")?;

    writeln!(writer, "{BLOCK_BEGIN} {TREES};")?;
    for (i, tree) in trees.iter().enumerate() {
        writeln!(writer, "\t{TREE} tree_{} = {}", i + 1, tree.newick())?;
    }
    writeln!(writer, "{BLOCK_END}")?;
    Ok(())
}

fn collect_taxa(trees: &[AnnotatedTree]) -> Vec<&str> {
    let mut taxa: Vec<&str> = Vec::new();
    for tree in trees {
        for label in tree.taxa() {
            if !taxa.contains(&label) {
                taxa.push(label);
            }
        }
    }
    taxa
}
