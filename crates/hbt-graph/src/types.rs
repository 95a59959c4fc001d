use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Arena key of a [`Node`].
///
/// Keys are handed out from a monotonically increasing counter and are never
/// reused after a node is pruned. They are process-local: the persisted
/// document uses dense positional indices instead (see [`crate::Snapshot`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One working directory and every command observed while in it.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) path: String,
    /// command -> edge
    pub(crate) edges: HashMap<String, Edge>,
}

impl Node {
    pub(crate) fn new(id: NodeId, path: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
            edges: HashMap::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The exact directory path this node was created for.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn edges(&self) -> &HashMap<String, Edge> {
        &self.edges
    }

    pub fn edge(&self, cmd: &str) -> Option<&Edge> {
        self.edges.get(cmd)
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// "Command C was run while in the directory owning this edge."
///
/// `to` is a weak link to whichever node the session walked to after this
/// command. It says nothing about ownership and may dangle for a moment
/// while a prune is in progress; the graph clears such links before
/// returning.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub(crate) hits: u64,
    pub(crate) last_visited: DateTime<Utc>,
    pub(crate) from: NodeId,
    pub(crate) to: Option<NodeId>,
}

impl Edge {
    pub(crate) fn new(from: NodeId, now: DateTime<Utc>) -> Self {
        Self {
            hits: 1,
            last_visited: now,
            from,
            to: None,
        }
    }

    pub(crate) fn visit(&mut self, now: DateTime<Utc>) {
        self.hits += 1;
        self.last_visited = now;
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn last_visited(&self) -> DateTime<Utc> {
        self.last_visited
    }

    pub fn from(&self) -> NodeId {
        self.from
    }

    pub fn to(&self) -> Option<NodeId> {
        self.to
    }
}

/// Tunables of a [`crate::Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphConfig {
    /// How many recent steps each session walker keeps.
    pub max_walker_history: usize,
    /// How many trailing path components two directories must share before
    /// one can stand in for the other during lookup.
    pub min_common_path: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_walker_history: 10,
            min_common_path: 3,
        }
    }
}

impl GraphConfig {
    pub fn new(max_walker_history: usize, min_common_path: usize) -> Self {
        Self {
            max_walker_history,
            min_common_path,
        }
    }

    /// Both values must be at least 1; zero is bumped up.
    pub(crate) fn normalized(self) -> Self {
        Self {
            max_walker_history: self.max_walker_history.max(1),
            min_common_path: self.min_common_path.max(1),
        }
    }
}
