//! Newick and Nexus readers.
//!
//! Parsed trees go through the same validation as simulated ones. Tips
//! at the present (age 0 within epsilon) are flagged alive; a parentless
//! node with a single child is read as an origin.

use crate::errors::AnnotatedTreeError;
use crate::tree::annotated::{AnnotatedTree, TreeSettings};
use crate::tree::nexus::{BLOCK_BEGIN, NEXUS_HEADER, TRANSLATE, TREE, TREES};
use crate::tree::node::{NodeId, TreeNode};
use std::collections::HashMap;

impl AnnotatedTree {
    /// Read a single Newick tree.
    pub fn from_newick(
        newick: &str,
        n_states: usize,
        epsilon: f64,
    ) -> Result<Self, AnnotatedTreeError> {
        let nodes = NewickParser::new(newick).parse()?;
        finish_tree(nodes, n_states, epsilon)
    }

    /// Read every tree of the TREES block of a Nexus document.
    ///
    /// A `Translate` command, if present, maps the keys used in the tree
    /// strings back to taxon labels.
    pub fn from_nexus(
        nexus: &str,
        n_states: usize,
        epsilon: f64,
    ) -> Result<Vec<Self>, AnnotatedTreeError> {
        let cleaned = strip_comments(nexus);
        let mut in_trees = false;
        let mut translate: HashMap<String, String> = HashMap::new();
        let mut trees = Vec::new();
        let mut saw_header = false;

        for command in split_outside_quotes(&cleaned, ';') {
            let command = command.trim();
            if command.is_empty() {
                continue;
            }
            if !saw_header {
                if !starts_with_keyword(command, NEXUS_HEADER) {
                    return Err(parse_err(format!("missing {NEXUS_HEADER} header")));
                }
                saw_header = true;
                // The header is not terminated by ';'
                let rest = command[NEXUS_HEADER.len()..].trim();
                if starts_with_keyword(rest, BLOCK_BEGIN) {
                    in_trees = is_trees_block(rest);
                }
                continue;
            }

            if starts_with_keyword(command, BLOCK_BEGIN) {
                in_trees = is_trees_block(command);
            } else if command.eq_ignore_ascii_case("end") || command.eq_ignore_ascii_case("endblock") {
                in_trees = false;
            } else if in_trees && starts_with_keyword(command, TRANSLATE) {
                translate = parse_translate(&command[TRANSLATE.len()..])?;
            } else if in_trees && starts_with_keyword(command, TREE) {
                let (_, newick) = command
                    .split_once('=')
                    .ok_or_else(|| parse_err(format!("tree command without '=': {command}")))?;
                let mut newick = newick.trim().to_string();
                newick.push(';');
                let mut nodes = NewickParser::new(&newick).parse()?;
                if !translate.is_empty() {
                    for node in nodes.iter_mut().filter(|n| n.is_leaf()) {
                        if let Some(label) = translate.get(&node.label) {
                            node.label = label.clone();
                        }
                    }
                }
                trees.push(finish_tree(nodes, n_states, epsilon)?);
            }
        }

        if !saw_header {
            return Err(parse_err("empty Nexus document"));
        }
        Ok(trees)
    }
}

fn parse_err(msg: impl Into<String>) -> AnnotatedTreeError {
    AnnotatedTreeError::Parse(msg.into())
}

/// Case-insensitive prefix test for a Nexus keyword.
fn starts_with_keyword(command: &str, keyword: &str) -> bool {
    command
        .get(..keyword.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(keyword))
}

fn is_trees_block(begin_command: &str) -> bool {
    begin_command
        .split_whitespace()
        .nth(1)
        .is_some_and(|name| name.eq_ignore_ascii_case(TREES))
}

/// Flag tips at the present alive and validate.
fn finish_tree(
    mut nodes: Vec<TreeNode>,
    n_states: usize,
    epsilon: f64,
) -> Result<AnnotatedTree, AnnotatedTreeError> {
    let with_origin = nodes.first().is_some_and(|n| n.children.len() == 1);
    let settings = TreeSettings::new(n_states, with_origin, epsilon);

    // A first pass fixes the height, then tips at the present are flagged.
    let draft = AnnotatedTree::new(nodes.clone(), vec![], settings)?;
    let tolerance = draft.age_tolerance();
    for (i, node) in nodes.iter_mut().enumerate() {
        node.alive = node.is_leaf() && draft.age(NodeId(i)).abs() <= tolerance;
    }
    AnnotatedTree::new(nodes, vec![], settings)
}

/// Recursive-descent Newick parser producing a node arena (root first).
struct NewickParser {
    chars: Vec<char>,
    pos: usize,
    nodes: Vec<TreeNode>,
}

impl NewickParser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            nodes: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<Vec<TreeNode>, AnnotatedTreeError> {
        self.skip_ignored();
        if self.peek().is_none() {
            return Err(parse_err("empty Newick string"));
        }
        self.subtree(None)?;
        self.skip_ignored();
        match self.next() {
            Some(';') => {}
            Some(c) => {
                return Err(parse_err(format!(
                    "expected ';' at position {}, found '{c}'",
                    self.pos - 1
                )))
            }
            None => return Err(parse_err("missing terminating ';'")),
        }
        self.skip_ignored();
        if let Some(c) = self.peek() {
            return Err(parse_err(format!(
                "trailing character '{c}' at position {}",
                self.pos
            )));
        }
        Ok(self.nodes)
    }

    fn subtree(&mut self, parent: Option<NodeId>) -> Result<NodeId, AnnotatedTreeError> {
        let id = NodeId(self.nodes.len());
        let mut node = TreeNode::new("");
        node.parent = parent;
        self.nodes.push(node);

        self.skip_ignored();
        if self.peek() == Some('(') {
            self.pos += 1;
            loop {
                let child = self.subtree(Some(id))?;
                self.nodes[id.0].children.push(child);
                self.skip_ignored();
                match self.next() {
                    Some(',') => continue,
                    Some(')') => break,
                    Some(c) => {
                        return Err(parse_err(format!(
                            "expected ',' or ')' at position {}, found '{c}'",
                            self.pos - 1
                        )))
                    }
                    None => return Err(parse_err("unbalanced parentheses")),
                }
            }
        }

        self.skip_ignored();
        self.nodes[id.0].label = self.label()?;
        self.skip_ignored();
        if self.peek() == Some(':') {
            self.pos += 1;
            self.skip_ignored();
            self.nodes[id.0].edge_length = Some(self.number()?);
        }
        Ok(id)
    }

    fn label(&mut self) -> Result<String, AnnotatedTreeError> {
        if self.peek() == Some('\'') {
            self.pos += 1;
            let mut label = String::new();
            loop {
                match self.next() {
                    Some('\'') if self.peek() == Some('\'') => {
                        self.pos += 1;
                        label.push('\'');
                    }
                    Some('\'') => return Ok(label),
                    Some(c) => label.push(c),
                    None => return Err(parse_err("unterminated quoted label")),
                }
            }
        }

        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_delimiter(c) {
                break;
            }
            self.pos += 1;
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn number(&mut self) -> Result<f64, AnnotatedTreeError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_delimiter(c) {
                break;
            }
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse()
            .map_err(|_| parse_err(format!("invalid branch length '{text}' at position {start}")))
    }

    fn skip_ignored(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
            } else if c == '[' {
                while let Some(c) = self.next() {
                    if c == ']' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | ',' | ':' | ';' | '[' | ']')
}

/// Remove `[...]` comments outside quoted labels.
fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_quotes = false;
    let mut depth = 0usize;
    for c in input.chars() {
        match c {
            '\'' if depth == 0 => {
                in_quotes = !in_quotes;
                out.push(c);
            }
            '[' if !in_quotes => depth += 1,
            ']' if !in_quotes && depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Split on `sep` outside single-quoted sections. Doubled quotes stay
/// inside the quoted section.
fn split_outside_quotes(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        if c == '\'' {
            in_quotes = !in_quotes;
        } else if c == sep && !in_quotes {
            parts.push(&input[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&input[start..]);
    parts
}

fn parse_translate(body: &str) -> Result<HashMap<String, String>, AnnotatedTreeError> {
    let mut map = HashMap::new();
    for entry in split_outside_quotes(body, ',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (key, label) = entry
            .split_once(char::is_whitespace)
            .ok_or_else(|| parse_err(format!("invalid translate entry '{entry}'")))?;
        let label = label.trim();
        let label = match label.strip_prefix('\'').and_then(|l| l.strip_suffix('\'')) {
            Some(quoted) => quoted.replace("''", "'"),
            None => label.to_string(),
        };
        map.insert(key.to_string(), label);
    }
    Ok(map)
}
