//! Directory lookup with trailing-component fallback.

use crate::types::NodeId;
use std::collections::HashMap;

/// Resolve `dir` to a node.
///
/// An exact path match wins. Otherwise, when `dir` has more than
/// `min_common_path` components, it is reduced to its last
/// `min_common_path` components and looked up again, so
/// `/another/foo/bar/baz` can resolve to a node tracked at `/foo/bar/baz`.
pub(crate) fn find_node(
    index: &HashMap<String, NodeId>,
    dir: &str,
    min_common_path: usize,
) -> Option<NodeId> {
    let mut candidate = dir.to_string();
    loop {
        if let Some(id) = index.get(&candidate) {
            return Some(*id);
        }
        candidate = common_suffix(&candidate, min_common_path)?;
    }
}

/// The absolute path made of the last `keep` components of `dir`, or `None`
/// when `dir` has no more than `keep` components to begin with.
fn common_suffix(dir: &str, keep: usize) -> Option<String> {
    let trimmed = dir.strip_prefix('/').unwrap_or(dir);
    let components: Vec<&str> = trimmed.split('/').collect();
    if components.len() <= keep {
        return None;
    }
    let tail: Vec<&str> = components[components.len() - keep..]
        .iter()
        .copied()
        .filter(|c| !c.is_empty())
        .collect();
    Some(format!("/{}", tail.join("/")))
}
