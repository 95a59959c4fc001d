use anyhow::{Context, Result};
use hbt_graph::{Graph, GraphConfig};
use std::path::Path;

pub fn run(cache_file: &Path) -> Result<()> {
    let mut graph = Graph::new(GraphConfig::default());
    graph
        .load(cache_file)
        .with_context(|| format!("failed to load cache {}", cache_file.display()))?;

    let before = graph.node_count();
    let changed = graph.prune().context("failed to prune graph")?;
    if changed {
        graph
            .save(cache_file)
            .with_context(|| format!("failed to save cache {}", cache_file.display()))?;
    }
    println!(
        "pruned {} of {} directories",
        before - graph.node_count(),
        before
    );
    Ok(())
}
