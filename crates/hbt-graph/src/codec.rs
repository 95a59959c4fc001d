//! Flat, cycle-free encoding of the graph.
//!
//! Edges point at arbitrary nodes through `to`, so the in-memory structure
//! can contain any number of cycles. On disk every node is given a dense
//! position `0..n`; paths and edge tables are stored side by side under
//! that position and `to` becomes a `target` index (`-1` for none).
//!
//! ```json
//! {
//!   "node_paths": ["/src/app", "/src/lib"],
//!   "node_edges": [
//!     { "make": { "hits": 3, "last_visited": 1767225600, "target": 1 } },
//!     { "cargo test": { "hits": 1, "last_visited": 1767225600, "target": -1 } }
//!   ],
//!   "max_walker_history": 10,
//!   "min_common_path": 3
//! }
//! ```

use crate::error::{GraphError, Result};
use crate::types::{Edge, GraphConfig, Node, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Marker for "no observed successor".
pub const NO_TARGET: i64 = -1;

/// The persisted document.
///
/// Older files written before recency tracking use `wds`/`edges` and
/// `h`/`t` for the same fields, and carry no timestamps; both are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(alias = "wds")]
    pub node_paths: Vec<String>,
    #[serde(alias = "edges")]
    pub node_edges: Vec<BTreeMap<String, EdgeRecord>>,
    #[serde(default)]
    pub max_walker_history: Option<usize>,
    #[serde(default)]
    pub min_common_path: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    #[serde(alias = "h")]
    pub hits: u64,
    /// Unix seconds. Absent in legacy documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_visited: Option<i64>,
    #[serde(alias = "t")]
    pub target: i64,
}

/// Arena rebuilt from a [`Snapshot`].
#[derive(Debug)]
pub(crate) struct Restored {
    pub nodes: BTreeMap<NodeId, Node>,
    pub paths: HashMap<String, NodeId>,
    pub next_id: u64,
}

impl Snapshot {
    /// Flatten the arena. Positions follow arena key order, so they are
    /// dense even after prunes have left holes in the key space.
    pub(crate) fn capture(nodes: &BTreeMap<NodeId, Node>, config: GraphConfig) -> Self {
        // First pass: positions and paths.
        let positions: HashMap<NodeId, i64> = nodes
            .keys()
            .enumerate()
            .map(|(pos, id)| (*id, pos as i64))
            .collect();
        let node_paths = nodes.values().map(|n| n.path.clone()).collect();

        // Second pass: edges, with `to` translated into positions.
        let node_edges = nodes
            .values()
            .map(|n| {
                n.edges
                    .iter()
                    .map(|(cmd, e)| {
                        let target = e
                            .to
                            .and_then(|to| positions.get(&to).copied())
                            .unwrap_or(NO_TARGET);
                        let record = EdgeRecord {
                            hits: e.hits,
                            last_visited: Some(e.last_visited.timestamp()),
                            target,
                        };
                        (cmd.clone(), record)
                    })
                    .collect()
            })
            .collect();

        Self {
            node_paths,
            node_edges,
            max_walker_history: Some(config.max_walker_history),
            min_common_path: Some(config.min_common_path),
        }
    }

    /// Rebuild the arena. Nodes get keys equal to their position.
    ///
    /// `now` stands in for missing visit timestamps so legacy edges are
    /// treated as freshly seen rather than immediately prunable.
    pub(crate) fn restore(self, now: DateTime<Utc>) -> Result<Restored> {
        let n = self.node_paths.len();
        if self.node_edges.len() != n {
            return Err(GraphError::Corrupt(format!(
                "{} node paths but {} edge tables",
                n,
                self.node_edges.len()
            )));
        }

        // First pass: allocate every node so that forward, backward and self
        // references all resolve.
        let mut nodes = BTreeMap::new();
        let mut paths = HashMap::with_capacity(n);
        for (pos, path) in self.node_paths.into_iter().enumerate() {
            let id = NodeId(pos as u64);
            if paths.insert(path.clone(), id).is_some() {
                return Err(GraphError::Corrupt(format!("duplicate node path {path:?}")));
            }
            nodes.insert(id, Node::new(id, path));
        }

        // Second pass: link.
        for (pos, edges) in self.node_edges.into_iter().enumerate() {
            let from = NodeId(pos as u64);
            let mut table = HashMap::with_capacity(edges.len());
            for (cmd, record) in edges {
                table.insert(cmd, edge_from_record(from, record, n, now)?);
            }
            if let Some(node) = nodes.get_mut(&from) {
                node.edges = table;
            }
        }

        Ok(Restored {
            nodes,
            paths,
            next_id: n as u64,
        })
    }
}

fn edge_from_record(
    from: NodeId,
    record: EdgeRecord,
    node_count: usize,
    now: DateTime<Utc>,
) -> Result<Edge> {
    if record.hits == 0 {
        return Err(GraphError::Corrupt(format!("edge of node {from} has zero hits")));
    }
    let to = match record.target {
        NO_TARGET => None,
        t if t >= 0 && (t as usize) < node_count => Some(NodeId(t as u64)),
        t => {
            return Err(GraphError::Corrupt(format!(
                "edge of node {from} targets index {t}, only {node_count} nodes exist"
            )));
        }
    };
    let last_visited = match record.last_visited {
        None => now,
        Some(secs) => DateTime::from_timestamp(secs, 0).ok_or_else(|| {
            GraphError::Corrupt(format!("edge of node {from} has invalid timestamp {secs}"))
        })?,
    };
    Ok(Edge {
        hits: record.hits,
        last_visited,
        from,
        to,
    })
}

/// Write `snapshot` to `path` in one go, replacing any previous content.
pub(crate) fn write(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let bytes = serde_json::to_vec(snapshot)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Read a snapshot. A missing file is `Ok(None)`, anything else that fails
/// is an error.
pub(crate) fn read(path: &Path) -> Result<Option<Snapshot>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}
