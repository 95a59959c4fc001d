mod cmd_local;
mod cmd_prune;
mod cmd_remote;
mod cmd_serve;

use anyhow::Result;
use clap::{Parser, Subcommand};
use hbt_server::Request;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hbt")]
#[command(about = "Learn shell commands per directory and suggest the next one")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true, env = "HBT_DEBUG")]
    debug: bool,

    /// Directory holding the .hbtcache file
    #[arg(short, long, global = true, env = "HBT_CACHE_PATH", default_value = ".")]
    cache: PathBuf,

    /// Daemon port on localhost
    #[arg(short, long, global = true, env = "HBT_PORT", default_value_t = hbt_server::DEFAULT_PORT)]
    port: u16,

    /// Time between periodic saves: plain seconds (`600`) or units
    /// (`10m`, `1h30m`, `90s`)
    #[arg(
        short,
        long,
        global = true,
        env = "HBT_SAVE_INTERVAL",
        default_value = "10m",
        value_parser = parse_interval
    )]
    save_interval: Duration,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the daemon (default)
    Serve,
    /// Run one command directly against the cache file, without a daemon
    Cli {
        /// Command and its arguments, e.g. `hint 42 /home/me`
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Record a command run in a directory
    Track {
        session: String,
        dir: String,
        #[arg(allow_hyphen_values = true)]
        cmd: String,
    },
    /// Print the next suggestion for a directory
    Hint { session: String, dir: String },
    /// Forget a session's walk and hint cursor
    End { session: String },
    /// Forget a command in a directory
    Del {
        session: String,
        dir: String,
        #[arg(allow_hyphen_values = true)]
        cmd: String,
    },
    /// Prune stale entries from the cache file
    Prune,
}

/// Bare seconds, or a sequence of `<integer><unit>` with units `h`, `m`,
/// `s` and `ms`.
fn parse_interval(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    if raw.is_empty() {
        return Err("empty interval".to_string());
    }

    let mut total = Duration::ZERO;
    let mut rest = raw;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|_| format!("invalid interval {raw:?}: expected a number"))?;
        rest = &rest[digits..];
        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = match &rest[..unit_len] {
            "h" => Duration::from_secs(3600),
            "m" => Duration::from_secs(60),
            "s" => Duration::from_secs(1),
            "ms" => Duration::from_millis(1),
            "" => return Err(format!("invalid interval {raw:?}: missing unit")),
            other => return Err(format!("invalid interval {raw:?}: unknown unit {other:?}")),
        };
        total += unit
            .checked_mul(u32::try_from(value).map_err(|_| format!("interval {raw:?} too large"))?)
            .ok_or_else(|| format!("interval {raw:?} too large"))?;
        rest = &rest[unit_len..];
    }
    Ok(total)
}

fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));
    // A second init (e.g. under a test harness) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let cache_file = cli.cache.join(hbt_server::CACHE_NAME);
    let client = hbt_server::Client::new(cli.port);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = hbt_server::ServerConfig::new()
                .with_port(cli.port)
                .with_cache_file(cache_file)
                .with_save_interval(cli.save_interval);
            cmd_serve::run(config).await
        }
        Commands::Cli { args } => cmd_local::run(&args, &cache_file),
        Commands::Track { session, dir, cmd } => {
            cmd_remote::run(&client, Request::Track { session, dir, cmd }).await
        }
        Commands::Hint { session, dir } => {
            cmd_remote::run(&client, Request::Hint { session, dir }).await
        }
        Commands::End { session } => cmd_remote::run(&client, Request::End { session }).await,
        Commands::Del { session, dir, cmd } => {
            cmd_remote::run(&client, Request::Delete { session, dir, cmd }).await
        }
        Commands::Prune => cmd_prune::run(&cache_file),
    }
}
