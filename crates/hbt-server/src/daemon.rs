//! TCP daemon owning a single suggestion graph.
//!
//! Every connection carries exactly one request. The graph sits behind an
//! async mutex so dispatches never interleave, and the same lock guards the
//! periodic and final saves.

use crate::error::ProtocolError;
use crate::protocol::{Request, dispatch};
use anyhow::{Context, Result};
use hbt_graph::SuggestionGraph;
use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

pub const DEFAULT_PORT: u16 = 43111;
pub const CACHE_NAME: &str = ".hbtcache";
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(600);
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

pub type SharedGraph<G> = Arc<Mutex<G>>;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    port: u16,
    cache_file: PathBuf,
    save_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cache_file: PathBuf::from(CACHE_NAME),
            save_interval: DEFAULT_SAVE_INTERVAL,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Store the cache as [`CACHE_NAME`] inside `dir`.
    pub fn with_cache_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cache_file = dir.as_ref().join(CACHE_NAME);
        self
    }

    pub fn with_cache_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.cache_file = file.into();
        self
    }

    /// A zero interval is bumped to one second; tokio rejects empty periods.
    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval.max(Duration::from_secs(1));
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    pub fn save_interval(&self) -> Duration {
        self.save_interval
    }
}

pub struct Daemon<G> {
    config: ServerConfig,
    graph: SharedGraph<G>,
}

impl<G> Daemon<G>
where
    G: SuggestionGraph + Send + 'static,
{
    pub fn new(config: ServerConfig, graph: G) -> Self {
        Self {
            config,
            graph: Arc::new(Mutex::new(graph)),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn graph(&self) -> SharedGraph<G> {
        Arc::clone(&self.graph)
    }

    /// Load the cache, prune it, and write it back if pruning removed
    /// anything.
    pub async fn restore(&self) -> Result<()> {
        let path = self.config.cache_file().to_path_buf();
        with_graph_blocking(&self.graph, move |graph| -> Result<()> {
            graph
                .load(&path)
                .with_context(|| format!("failed to load cache {}", path.display()))?;
            info!(cache = %path.display(), "graph loaded");

            let changed = graph.prune().context("failed to prune graph")?;
            if changed {
                graph
                    .save(&path)
                    .with_context(|| format!("failed to save cache {}", path.display()))?;
                debug!("pruned graph saved");
            }
            Ok(())
        })
        .await?
    }

    /// Bind the loopback interface and serve until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.config.port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!(%addr, "listening");
        self.serve(listener, shutdown_signal()).await
    }

    /// Accept connections on `listener` until `shutdown` resolves, then save
    /// one last time. A failing final save is returned to the caller.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.config.save_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutting down");
                    let path = self.config.cache_file().to_path_buf();
                    with_graph_blocking(&self.graph, move |graph| -> Result<()> {
                        graph
                            .save(&path)
                            .with_context(|| format!("failed to save cache {}", path.display()))?;
                        info!(cache = %path.display(), "graph saved");
                        Ok(())
                    })
                    .await??;
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.periodic_save().await;
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("failed to accept connection: {e}");
                            continue;
                        }
                    };
                    let graph = self.graph();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, graph).await {
                            warn!(%peer, "request failed: {e:#}");
                        }
                    });
                }
            }
        }
    }

    async fn periodic_save(&self) {
        let path = self.config.cache_file().to_path_buf();
        let result = with_graph_blocking(&self.graph, move |graph| {
            if let Err(e) = graph.prune() {
                error!("periodic prune failed: {e}");
            }
            match graph.save(&path) {
                Ok(()) => debug!(cache = %path.display(), "periodic save"),
                Err(e) => error!(cache = %path.display(), "periodic save failed, will retry: {e}"),
            }
        })
        .await;
        if let Err(e) = result {
            error!("periodic save task failed: {e:#}");
        }
    }
}

/// Run `f` on the blocking pool with the graph locked. The lock is held
/// until `f` returns, so file I/O never overlaps a dispatch and never stalls
/// a runtime worker.
async fn with_graph_blocking<G, T, F>(graph: &SharedGraph<G>, f: F) -> Result<T>
where
    G: Send + 'static,
    T: Send + 'static,
    F: FnOnce(&mut G) -> T + Send + 'static,
{
    let mut guard = Arc::clone(graph).lock_owned().await;
    tokio::task::spawn_blocking(move || f(&mut *guard))
        .await
        .context("graph task panicked")
}

/// Read one request until EOF, dispatch it, and write the reply if there is
/// one.
async fn handle_connection<G>(mut stream: TcpStream, graph: SharedGraph<G>) -> Result<()>
where
    G: SuggestionGraph + Send,
{
    let mut buf = Vec::new();
    (&mut stream)
        .take(MAX_REQUEST_BYTES as u64 + 1)
        .read_to_end(&mut buf)
        .await
        .context("failed to read request")?;
    if buf.len() > MAX_REQUEST_BYTES {
        return Err(ProtocolError::RequestTooLarge {
            limit: MAX_REQUEST_BYTES,
        }
        .into());
    }

    let request = Request::from_wire(&buf)?;
    debug!(command = request.command(), session = request.session(), "request");
    let reply = {
        let mut graph = graph.lock().await;
        dispatch(request, &mut *graph)
    };

    if let Some(reply) = reply {
        stream
            .write_all(reply.as_bytes())
            .await
            .context("failed to write reply")?;
    }
    stream.shutdown().await.ok();
    Ok(())
}

/// Resolves on the first SIGINT, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use hbt_graph::{Graph, GraphConfig, NO_SUGGESTION};
    use tempfile::TempDir;
    use tokio::sync::oneshot;

    async fn start(
        dir: &TempDir,
        interval: Duration,
    ) -> (Client, oneshot::Sender<()>, tokio::task::JoinHandle<Result<()>>) {
        let config = ServerConfig::new()
            .with_cache_dir(dir.path())
            .with_save_interval(interval);
        let daemon = Daemon::new(config, Graph::new(GraphConfig::default()));
        daemon.restore().await.unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(daemon.serve(listener, async {
            rx.await.ok();
        }));
        (Client::with_addr(addr), tx, handle)
    }

    #[tokio::test]
    async fn test_round_trip_over_tcp() {
        let dir = TempDir::new().unwrap();
        let (client, tx, handle) = start(&dir, DEFAULT_SAVE_INTERVAL).await;

        client.track("1", "/home/me", "make").await.unwrap();
        client.track("1", "/home/me", "make").await.unwrap();
        client.track("1", "/home/me", "make test").await.unwrap();
        assert_eq!(client.hint("1", "/home/me").await.unwrap(), "make");
        assert_eq!(client.hint("1", "/home/me").await.unwrap(), "make test");

        client.delete("1", "/home/me", "make").await.unwrap();
        client.delete("1", "/home/me", "make test").await.unwrap();
        client.end("1").await.unwrap();
        assert_eq!(client.hint("1", "/home/me").await.unwrap(), NO_SUGGESTION);

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_final_save_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let (client, tx, handle) = start(&dir, DEFAULT_SAVE_INTERVAL).await;

        client.track("1", "/srv", "ls -la").await.unwrap();
        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();

        let mut g = Graph::new(GraphConfig::default());
        g.load(&dir.path().join(CACHE_NAME)).unwrap();
        assert_eq!(g.edge("/srv", "ls -la").unwrap().hits(), 1);
    }

    #[tokio::test]
    async fn test_periodic_save() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join(CACHE_NAME);
        let (client, tx, handle) = start(&dir, Duration::from_secs(1)).await;

        client.track("1", "/srv", "uptime").await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(cache.exists());

        let mut g = Graph::new(GraphConfig::default());
        g.load(&cache).unwrap();
        assert!(g.edge("/srv", "uptime").is_some());

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bad_request_keeps_serving() {
        let dir = TempDir::new().unwrap();
        let (client, tx, handle) = start(&dir, DEFAULT_SAVE_INTERVAL).await;

        let mut stream = TcpStream::connect(client.addr()).await.unwrap();
        stream.write_all(b"track\nonly-two").await.unwrap();
        stream.shutdown().await.unwrap();
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await.unwrap();
        assert!(reply.is_empty());

        client.track("1", "/srv", "ok").await.unwrap();
        assert_eq!(client.hint("1", "/srv").await.unwrap(), "ok");

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_oversized_request_is_dropped() {
        let dir = TempDir::new().unwrap();
        let (client, tx, handle) = start(&dir, DEFAULT_SAVE_INTERVAL).await;

        let mut body = b"track\n1\n/big\n".to_vec();
        body.resize(MAX_REQUEST_BYTES + 1, b'x');
        let mut stream = TcpStream::connect(client.addr()).await.unwrap();
        // The daemon may hang up before reading everything.
        let _ = stream.write_all(&body).await;
        let _ = stream.shutdown().await;
        let mut reply = Vec::new();
        let _ = stream.read_to_end(&mut reply).await;
        assert!(reply.is_empty());

        assert_eq!(client.hint("1", "/big").await.unwrap(), NO_SUGGESTION);
        client.track("1", "/small", "ok").await.unwrap();
        assert_eq!(client.hint("1", "/small").await.unwrap(), "ok");

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();

        let mut g = Graph::new(GraphConfig::default());
        g.load(&dir.path().join(CACHE_NAME)).unwrap();
        assert!(g.node("/big").is_none());
    }

    #[tokio::test]
    async fn test_failing_final_save_is_an_error() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("missing").join(CACHE_NAME);
        let daemon = Daemon::new(
            ServerConfig::new().with_cache_file(&cache),
            Graph::new(GraphConfig::default()),
        );
        daemon.restore().await.unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let err = daemon
            .serve(listener, std::future::ready(()))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("failed to save cache"));
        assert!(!cache.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_tracks_are_serialized() {
        const N: u64 = 100;
        let dir = TempDir::new().unwrap();
        let (client, tx, handle) = start(&dir, DEFAULT_SAVE_INTERVAL).await;

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..N {
            tasks.spawn(async move {
                client
                    .track(&format!("s{}", i % 7), "/srv", "make")
                    .await
                    .unwrap();
            });
        }
        while let Some(res) = tasks.join_next().await {
            res.unwrap();
        }

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();

        let mut g = Graph::new(GraphConfig::default());
        g.load(&dir.path().join(CACHE_NAME)).unwrap();
        assert_eq!(g.edge("/srv", "make").unwrap().hits(), N);
    }

    #[tokio::test]
    async fn test_restore_prunes_directory_changes() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join(CACHE_NAME);
        let mut g = Graph::new(GraphConfig::default());
        g.track("1", "/home", "cd src");
        g.save(&cache).unwrap();

        let daemon = Daemon::new(
            ServerConfig::new().with_cache_file(&cache),
            Graph::new(GraphConfig::default()),
        );
        daemon.restore().await.unwrap();
        assert!(daemon.graph().lock().await.is_empty());

        let mut reloaded = Graph::new(GraphConfig::default());
        reloaded.load(&cache).unwrap();
        assert!(reloaded.is_empty());
    }

    #[tokio::test]
    async fn test_restore_rejects_corrupt_cache() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join(CACHE_NAME);
        std::fs::write(&cache, "{ not json").unwrap();

        let daemon = Daemon::new(
            ServerConfig::new().with_cache_file(&cache),
            Graph::new(GraphConfig::default()),
        );
        let err = daemon.restore().await.unwrap_err();
        assert!(format!("{err:#}").contains("failed to load cache"));
    }

    #[test]
    fn test_config_defaults() {
        let c = ServerConfig::new();
        assert_eq!(c.port(), DEFAULT_PORT);
        assert_eq!(c.cache_file(), Path::new(CACHE_NAME));
        assert_eq!(c.save_interval(), DEFAULT_SAVE_INTERVAL);
        assert_eq!(
            c.with_save_interval(Duration::ZERO).save_interval(),
            Duration::from_secs(1)
        );
    }
}
