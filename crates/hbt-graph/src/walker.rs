//! Per-session bounded history of traversed edges.

use crate::types::{Node, NodeId};
use std::collections::{BTreeMap, VecDeque};

/// A (node, edge) pair. The edge is addressed by its command inside `node`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Step {
    pub node: NodeId,
    pub command: String,
}

impl Step {
    pub fn new(node: NodeId, command: impl Into<String>) -> Self {
        Self {
            node,
            command: command.into(),
        }
    }
}

/// Most-recent-first sequence of steps, never longer than `capacity`.
#[derive(Debug, Clone)]
pub(crate) struct Walker {
    steps: VecDeque<Step>,
    capacity: usize,
}

impl Walker {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            steps: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn front(&self) -> Option<&Step> {
        self.steps.front()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Advance the walker to `next`.
    ///
    /// The edge of the current front (if it still exists) gets its `to` set
    /// to `next.node`, which chains consecutive edges in the order the
    /// session ran them. `next` then becomes the front and the oldest steps
    /// fall off past capacity.
    pub fn progress(&mut self, next: Step, nodes: &mut BTreeMap<NodeId, Node>) {
        if let Some(prev) = self.steps.front()
            && let Some(edge) = nodes
                .get_mut(&prev.node)
                .and_then(|n| n.edges.get_mut(&prev.command))
        {
            edge.to = Some(next.node);
        }
        self.steps.push_front(next);
        self.steps.truncate(self.capacity);
    }

    /// Drop steps whose node no longer exists.
    pub fn retain_nodes(&mut self, nodes: &BTreeMap<NodeId, Node>) {
        self.steps.retain(|s| nodes.contains_key(&s.node));
    }
}
