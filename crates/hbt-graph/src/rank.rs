//! Candidate ranking and per-session suggestion cycling.

use crate::types::Node;
use std::collections::HashMap;
use std::fmt;

/// A command together with the score it was ranked by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedCommand {
    pub command: String,
    pub hits: u64,
}

impl fmt::Display for RankedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ cmd: {:?}, score: {} }}", self.command, self.hits)
    }
}

/// Edges of `node` sorted by hits, highest first.
///
/// Ties keep the map's iteration order, so their relative order is
/// unspecified. It is stable between calls as long as the node is not
/// mutated.
pub fn ranked(node: &Node) -> Vec<RankedCommand> {
    let mut sorted: Vec<RankedCommand> = node
        .edges
        .iter()
        .map(|(cmd, e)| RankedCommand {
            command: cmd.clone(),
            hits: e.hits,
        })
        .collect();
    sorted.sort_by(|a, b| b.hits.cmp(&a.hits));
    sorted
}

/// Per-session rotation index into the ranked list.
#[derive(Debug, Clone, Default)]
pub(crate) struct Cursors(HashMap<String, usize>);

impl Cursors {
    pub fn get(&self, session: &str) -> usize {
        self.0.get(session).copied().unwrap_or(0)
    }

    pub fn reset(&mut self, session: &str) {
        self.0.insert(session.to_string(), 0);
    }

    pub fn advance(&mut self, session: &str) {
        *self.0.entry(session.to_string()).or_insert(0) += 1;
    }

    pub fn remove(&mut self, session: &str) {
        self.0.remove(session);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// Position `cursor` selects in a list of `len` candidates.
pub(crate) fn select(cursor: usize, len: usize) -> Option<usize> {
    (len > 0).then(|| cursor % len)
}
