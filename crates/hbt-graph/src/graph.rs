use crate::codec::{self, Snapshot};
use crate::error::Result;
use crate::lookup::find_node;
use crate::prune;
use crate::rank::{self, Cursors, RankedCommand};
use crate::types::{Edge, GraphConfig, Node, NodeId};
use crate::walker::{Step, Walker};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

/// Returned by [`Graph::hint`] when there is nothing to suggest.
///
/// Shell integrations match on this literal, so it must not change.
pub const NO_SUGGESTION: &str = "¯\\_(ツ)_/¯";

/// Source of "now" for timestamps and pruning.
pub type Clock = fn() -> DateTime<Utc>;

/// The suggestion graph: directories -> commands, with per-session walkers
/// and suggestion cursors.
///
/// All state lives here and every operation takes `&mut self`; callers that
/// share one graph across tasks must put it behind a single lock.
#[derive(Debug, Clone)]
pub struct Graph {
    config: GraphConfig,
    nodes: BTreeMap<NodeId, Node>,
    /// exact directory path -> node
    paths: HashMap<String, NodeId>,
    next_id: u64,
    // Session state below is never persisted.
    walkers: HashMap<String, Walker>,
    cursors: Cursors,
    clock: Clock,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new(GraphConfig::default())
    }
}

impl Graph {
    pub fn new(config: GraphConfig) -> Self {
        Self::with_clock(config, Utc::now)
    }

    /// Like [`Graph::new`] but with an explicit clock, for tests and replays.
    pub fn with_clock(config: GraphConfig, clock: Clock) -> Self {
        Self {
            config: config.normalized(),
            nodes: BTreeMap::new(),
            paths: HashMap::new(),
            next_id: 0,
            walkers: HashMap::new(),
            cursors: Cursors::default(),
            clock,
        }
    }

    pub fn config(&self) -> GraphConfig {
        self.config
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn insert_node(&mut self, dir: &str) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Node::new(id, dir));
        self.paths.insert(dir.to_string(), id);
        id
    }

    fn progress(&mut self, session: &str, next: Step) {
        let capacity = self.config.max_walker_history;
        self.walkers
            .entry(session.to_string())
            .or_insert_with(|| Walker::new(capacity))
            .progress(next, &mut self.nodes);
    }

    /// Record that `session` ran `cmd` while in `dir`.
    pub fn track(&mut self, session: &str, dir: &str, cmd: &str) {
        let now = self.now();
        let capacity = self.config.max_walker_history;
        let head = self
            .walkers
            .entry(session.to_string())
            .or_insert_with(|| Walker::new(capacity))
            .front()
            .cloned();
        self.cursors.reset(session);

        let Some(&id) = self.paths.get(dir) else {
            let id = self.insert_node(dir);
            if let Some(node) = self.nodes.get_mut(&id) {
                node.edges.insert(cmd.to_string(), Edge::new(id, now));
            }
            debug!(session, dir, cmd, node = %id, "tracked new directory");
            self.progress(session, Step::new(id, cmd));
            return;
        };

        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        match node.edges.get_mut(cmd) {
            None => {
                node.edges.insert(cmd.to_string(), Edge::new(id, now));
                debug!(session, dir, cmd, "tracked new command");
                self.progress(session, Step::new(id, cmd));
            }
            Some(edge) => {
                edge.visit(now);
                debug!(session, dir, cmd, hits = edge.hits, "tracked repeat command");
                // Re-affirm the current head rather than jumping to this edge.
                let next = head.unwrap_or_else(|| Step::new(id, cmd));
                self.progress(session, next);
            }
        }
    }

    /// Next suggestion for `session` in `dir`, or [`NO_SUGGESTION`].
    ///
    /// Repeated calls without an intervening mutation rotate through the
    /// ranked commands of the resolved directory.
    pub fn hint(&mut self, session: &str, dir: &str) -> String {
        let Some(node) = find_node(&self.paths, dir, self.config.min_common_path)
            .and_then(|id| self.nodes.get(&id))
        else {
            self.cursors.reset(session);
            return NO_SUGGESTION.to_string();
        };

        let sorted = rank::ranked(node);
        let cursor = self.cursors.get(session);
        let Some(index) = rank::select(cursor, sorted.len()) else {
            self.cursors.reset(session);
            return NO_SUGGESTION.to_string();
        };
        debug!(
            session,
            dir,
            resolved = node.path(),
            candidates = ?sorted.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "best index {} % {} = {}",
            cursor,
            sorted.len(),
            index
        );

        let best = &sorted[index].command;
        if best.is_empty() {
            self.cursors.reset(session);
            return NO_SUGGESTION.to_string();
        }
        self.cursors.advance(session);
        best.clone()
    }

    /// Forget `session`'s walker and suggestion cursor.
    pub fn end(&mut self, session: &str) {
        self.walkers.remove(session);
        self.cursors.remove(session);
    }

    /// Remove a tracked command. Missing directories or commands are ignored.
    /// The node stays even when this removes its last edge.
    pub fn delete(&mut self, session: &str, dir: &str, cmd: &str) {
        let Some(node) = find_node(&self.paths, dir, self.config.min_common_path)
            .and_then(|id| self.nodes.get_mut(&id))
        else {
            return;
        };
        if node.edges.remove(cmd).is_some() {
            debug!(session, dir, cmd, "deleted command");
            self.cursors.reset(session);
        }
    }

    /// Write the graph to `path`. Session state is not included.
    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = Snapshot::capture(&self.nodes, self.config);
        codec::write(path, &snapshot)?;
        debug!(path = %path.display(), nodes = self.nodes.len(), "saved graph");
        Ok(())
    }

    /// Replace the graph with the one stored at `path`.
    ///
    /// A missing file leaves an empty graph. Walkers and cursors are cleared
    /// on success; a failed load leaves the graph untouched. The
    /// configuration this graph was built with is kept even if the document
    /// records different values.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let Some(snapshot) = codec::read(path)? else {
            debug!(path = %path.display(), "no graph to load");
            self.walkers.clear();
            self.cursors.clear();
            self.nodes.clear();
            self.paths.clear();
            self.next_id = 0;
            return Ok(());
        };
        if snapshot.max_walker_history.is_some_and(|v| v != self.config.max_walker_history)
            || snapshot.min_common_path.is_some_and(|v| v != self.config.min_common_path)
        {
            debug!(
                stored_max_walker_history = ?snapshot.max_walker_history,
                stored_min_common_path = ?snapshot.min_common_path,
                "stored configuration differs, keeping current"
            );
        }
        let restored = snapshot.restore(self.now())?;
        self.walkers.clear();
        self.cursors.clear();
        self.nodes = restored.nodes;
        self.paths = restored.paths;
        self.next_id = restored.next_id;
        info!(path = %path.display(), nodes = self.nodes.len(), "loaded graph");
        Ok(())
    }

    /// Drop stale edges and empty nodes. Returns whether any node was
    /// removed.
    pub fn prune(&mut self) -> Result<bool> {
        let now = self.now();
        let sweep = prune::sweep(&mut self.nodes, now);
        for (_, path) in &sweep.nodes_removed {
            self.paths.remove(path);
        }
        if !sweep.nodes_removed.is_empty() {
            let removed: HashSet<NodeId> = sweep.nodes_removed.iter().map(|(id, _)| *id).collect();
            // `to` is weak: links to removed nodes just disappear.
            for edge in self.nodes.values_mut().flat_map(|n| n.edges.values_mut()) {
                if edge.to.is_some_and(|to| removed.contains(&to)) {
                    edge.to = None;
                }
            }
            for walker in self.walkers.values_mut() {
                walker.retain_nodes(&self.nodes);
            }
        }
        if sweep.edges_removed > 0 || !sweep.nodes_removed.is_empty() {
            info!(
                edges = sweep.edges_removed,
                nodes = sweep.nodes_removed.len(),
                "pruned graph"
            );
        }
        Ok(!sweep.nodes_removed.is_empty())
    }

    // ── Introspection ────────────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node tracked at exactly `dir` (no fallback).
    pub fn node(&self, dir: &str) -> Option<&Node> {
        self.paths.get(dir).and_then(|id| self.nodes.get(id))
    }

    pub fn node_by_id(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn edge(&self, dir: &str, cmd: &str) -> Option<&Edge> {
        self.node(dir).and_then(|n| n.edge(cmd))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Ranked candidates for `dir`, resolved with the same fallback as
    /// [`Graph::hint`]. Does not touch any cursor.
    pub fn ranked(&self, dir: &str) -> Vec<RankedCommand> {
        find_node(&self.paths, dir, self.config.min_common_path)
            .and_then(|id| self.nodes.get(&id))
            .map(rank::ranked)
            .unwrap_or_default()
    }

    pub fn walker_len(&self, session: &str) -> usize {
        self.walkers.get(session).map_or(0, Walker::len)
    }
}
