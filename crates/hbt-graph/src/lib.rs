#![doc = include_str!("../README.md")]

mod codec;
mod error;
mod graph;
mod lookup;
mod prune;
mod rank;
mod types;
mod walker;

pub use codec::{EdgeRecord, NO_TARGET, Snapshot};
pub use error::{GraphError, Result};
pub use graph::{Clock, Graph, NO_SUGGESTION};
pub use prune::{RETENTION_DAYS, is_directory_change};
pub use rank::{RankedCommand, ranked};
pub use types::{Edge, GraphConfig, Node, NodeId};

use std::path::Path;

/// Everything a suggestion backend must provide to be driven by the daemon.
///
/// Implementations are not expected to be thread-safe; the caller serializes
/// access.
pub trait SuggestionGraph {
    /// Record that session `id` ran `cmd` while in `wd`.
    fn track(&mut self, id: &str, wd: &str, cmd: &str);

    /// Next suggestion for session `id` at `wd`. Always returns something,
    /// [`NO_SUGGESTION`] when there is nothing to offer.
    fn hint(&mut self, id: &str, wd: &str) -> String;

    /// Clear the session state of `id`.
    fn end(&mut self, id: &str);

    /// Remove a previously tracked command. Never fails.
    fn delete(&mut self, id: &str, wd: &str, cmd: &str);

    fn save(&self, path: &Path) -> Result<()>;

    fn load(&mut self, path: &Path) -> Result<()>;

    /// Remove unused entries. Returns whether anything worth persisting
    /// changed. Backends without a prune strategy return `Ok(false)`.
    fn prune(&mut self) -> Result<bool>;
}

impl SuggestionGraph for Graph {
    fn track(&mut self, id: &str, wd: &str, cmd: &str) {
        Graph::track(self, id, wd, cmd)
    }

    fn hint(&mut self, id: &str, wd: &str) -> String {
        Graph::hint(self, id, wd)
    }

    fn end(&mut self, id: &str) {
        Graph::end(self, id)
    }

    fn delete(&mut self, id: &str, wd: &str, cmd: &str) {
        Graph::delete(self, id, wd, cmd)
    }

    fn save(&self, path: &Path) -> Result<()> {
        Graph::save(self, path)
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        Graph::load(self, path)
    }

    fn prune(&mut self) -> Result<bool> {
        Graph::prune(self)
    }
}
