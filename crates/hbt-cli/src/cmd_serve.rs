use anyhow::Result;
use hbt_graph::{Graph, GraphConfig};
use hbt_server::{Daemon, ServerConfig};
use tracing::info;

pub async fn run(config: ServerConfig) -> Result<()> {
    info!(
        cache = %config.cache_file().display(),
        port = config.port(),
        save_interval_secs = config.save_interval().as_secs(),
        "starting daemon"
    );
    let daemon = Daemon::new(config, Graph::new(GraphConfig::default()));
    daemon.restore().await?;
    daemon.run().await
}
