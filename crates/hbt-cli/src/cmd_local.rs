use anyhow::{Context, Result};
use hbt_graph::{Graph, GraphConfig};
use hbt_server::{Request, dispatch};
use std::io::Write;
use std::path::Path;

/// Run one protocol command against the cache file directly.
pub fn run(args: &[String], cache_file: &Path) -> Result<()> {
    let request = Request::parse(args)?;

    let mut graph = Graph::new(GraphConfig::default());
    graph
        .load(cache_file)
        .with_context(|| format!("failed to load cache {}", cache_file.display()))?;

    let mutates = request.mutates_graph();
    let reply = dispatch(request, &mut graph);

    if mutates {
        graph
            .save(cache_file)
            .with_context(|| format!("failed to save cache {}", cache_file.display()))?;
    }
    if let Some(reply) = reply {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(reply.as_bytes())?;
        stdout.flush()?;
    }
    Ok(())
}
