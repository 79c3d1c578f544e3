//! Readers for tab-separated stochastic map logs.
//!
//! Both files start with a header row; columns are looked up by name, so
//! extra columns and any column order are accepted. Empty lines and lines
//! starting with `#` are skipped.

use crate::errors::StochasticMapError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Whether a change happened along a branch or at a speciation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    Anagenetic,
    Cladogenetic,
}

impl FromStr for TransitionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anagenetic" => Ok(Self::Anagenetic),
            "cladogenetic" => Ok(Self::Cladogenetic),
            other => Err(format!("unknown transition type '{other}'")),
        }
    }
}

/// One row of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub iteration: usize,
    pub tree_index: usize,
    /// Branch (labelled by its lower node). For cladogenetic rows, the
    /// speciating parent.
    pub node: String,
    /// Age of the change before the present.
    pub age: f64,
    pub from_state: usize,
    pub to_state: usize,
    pub transition_type: TransitionType,
    /// Daughter receiving `to_state` in a cladogenetic change.
    pub daughter: Option<String>,
    /// Character the row belongs to, if the log holds several.
    pub attribute: Option<String>,
}

/// One row of the node-state table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStateRecord {
    pub iteration: usize,
    pub tree_index: usize,
    pub node: String,
    pub state: usize,
}

/// Column positions from the header row.
struct Header {
    columns: HashMap<String, usize>,
}

impl Header {
    fn parse(line: &str) -> Self {
        let columns = line
            .split('\t')
            .enumerate()
            .map(|(i, name)| (name.trim().to_ascii_lowercase(), i))
            .collect();
        Self { columns }
    }

    fn required(&self, name: &'static str) -> Result<usize, StochasticMapError> {
        self.columns
            .get(name)
            .copied()
            .ok_or(StochasticMapError::MissingColumn(name))
    }

    fn optional(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }
}

/// Fields of one data row.
struct Row<'a> {
    line: usize,
    fields: Vec<&'a str>,
}

impl<'a> Row<'a> {
    fn text(&self, index: usize, name: &str) -> Result<&'a str, StochasticMapError> {
        self.fields
            .get(index)
            .map(|f| f.trim())
            .ok_or_else(|| StochasticMapError::Parse {
                line: self.line,
                message: format!("missing value for column '{name}'"),
            })
    }

    fn optional_text(&self, index: Option<usize>) -> Option<&'a str> {
        index
            .and_then(|i| self.fields.get(i))
            .map(|f| f.trim())
            .filter(|f| !f.is_empty() && *f != "NA")
    }

    fn value<T>(&self, index: usize, name: &str) -> Result<T, StochasticMapError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let text = self.text(index, name)?;
        text.parse().map_err(|e| StochasticMapError::Parse {
            line: self.line,
            message: format!("invalid {name} '{text}': {e}"),
        })
    }
}

/// Split a table into its header and data rows.
fn rows(text: &str) -> Option<(Header, Vec<Row<'_>>)> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim().is_empty() && !line.starts_with('#'));

    let (_, header) = lines.next()?;
    let rows = lines
        .map(|(line, text)| Row {
            line,
            fields: text.split('\t').collect(),
        })
        .collect();
    Some((Header::parse(header), rows))
}

/// Parse an event log.
pub fn parse_event_log(text: &str) -> Result<Vec<EventRecord>, StochasticMapError> {
    let Some((header, rows)) = rows(text) else {
        return Ok(Vec::new());
    };

    let iteration = header.required("iteration")?;
    let tree_index = header.required("tree_index")?;
    let node = header.required("node")?;
    let age = header.required("age")?;
    let from_state = header.required("from_state")?;
    let to_state = header.required("to_state")?;
    let transition_type = header.required("transition_type")?;
    let daughter = header.optional("daughter");
    let attribute = header.optional("attribute");

    rows.iter()
        .map(|row| {
            let record = EventRecord {
                iteration: row.value(iteration, "iteration")?,
                tree_index: row.value(tree_index, "tree_index")?,
                node: row.text(node, "node")?.to_string(),
                age: row.value(age, "age")?,
                from_state: row.value(from_state, "from_state")?,
                to_state: row.value(to_state, "to_state")?,
                transition_type: row.value(transition_type, "transition_type")?,
                daughter: row.optional_text(daughter).map(str::to_string),
                attribute: row.optional_text(attribute).map(str::to_string),
            };
            if record.transition_type == TransitionType::Cladogenetic && record.daughter.is_none() {
                return Err(StochasticMapError::Parse {
                    line: row.line,
                    message: "cladogenetic change without a daughter node".into(),
                });
            }
            Ok(record)
        })
        .collect()
}

/// Parse a node-state table.
pub fn parse_node_states(text: &str) -> Result<Vec<NodeStateRecord>, StochasticMapError> {
    let Some((header, rows)) = rows(text) else {
        return Ok(Vec::new());
    };

    let iteration = header.required("iteration")?;
    let tree_index = header.required("tree_index")?;
    let node = header.required("node")?;
    let state = header.required("state")?;

    rows.iter()
        .map(|row| {
            Ok(NodeStateRecord {
                iteration: row.value(iteration, "iteration")?,
                tree_index: row.value(tree_index, "tree_index")?,
                node: row.text(node, "node")?.to_string(),
                state: row.value(state, "state")?,
            })
        })
        .collect()
}

pub fn read_event_log(path: impl AsRef<Path>) -> Result<Vec<EventRecord>, StochasticMapError> {
    parse_event_log(&fs::read_to_string(path)?)
}

pub fn read_node_states(
    path: impl AsRef<Path>,
) -> Result<Vec<NodeStateRecord>, StochasticMapError> {
    parse_node_states(&fs::read_to_string(path)?)
}
