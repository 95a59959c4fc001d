//! Garbage collection of stale edges and empty nodes.

use crate::types::{Edge, Node, NodeId};
use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Edges not visited for longer than this are dropped.
pub const RETENTION_DAYS: i64 = 180;

/// A bare `cd` or `cd` with exactly one argument, ignoring surrounding
/// whitespace.
static DIRECTORY_CHANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*cd(\s+\S+)?\s*$").expect("directory change pattern"));

/// Whether `cmd` only changes directory. Such commands are never worth
/// suggesting and are purged regardless of age.
pub fn is_directory_change(cmd: &str) -> bool {
    DIRECTORY_CHANGE.is_match(cmd)
}

fn is_expired(edge: &Edge, now: DateTime<Utc>) -> bool {
    now - edge.last_visited > TimeDelta::days(RETENTION_DAYS)
}

/// What a sweep removed.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Sweep {
    pub edges_removed: usize,
    pub nodes_removed: Vec<(NodeId, String)>,
}

/// Remove expired and directory-change edges, then every node left without
/// edges.
pub(crate) fn sweep(nodes: &mut BTreeMap<NodeId, Node>, now: DateTime<Utc>) -> Sweep {
    let mut result = Sweep::default();
    nodes.retain(|id, node| {
        let before = node.edges.len();
        node.edges
            .retain(|cmd, e| !is_expired(e, now) && !is_directory_change(cmd));
        result.edges_removed += before - node.edges.len();
        if node.edges.is_empty() {
            result.nodes_removed.push((*id, node.path.clone()));
            false
        } else {
            true
        }
    });
    result
}
