//! scalegate
//!
//! Authenticated proxy in front of one upstream REST API. `serve` exposes the
//! proxy operations over HTTP with bearer authentication; `stdio` exposes
//! them as MCP tools to the parent process.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

use scalegate_daemon::{GatewayConfig, build_proxy, server};

#[derive(Parser, Debug)]
#[command(name = "scalegate", author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (default: ~/.config/scalegate/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP gateway
    Serve {
        /// Listen address, overriding `server.bind`
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Serve MCP tools over stdin/stdout
    Stdio,
}

/// Initializes structured logging with tracing.
///
/// Supports two output formats via `SCALEGATE_LOG_FORMAT`:
/// - `json`: Machine-readable JSON logs
/// - `pretty`: Human-readable formatted logs (default)
///
/// Log level is controlled via `RUST_LOG`. Output always goes to stderr,
/// which keeps stdout free for the MCP protocol.
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let format = std::env::var("SCALEGATE_LOG_FORMAT")
        .unwrap_or_else(|_| "pretty".to_string())
        .to_lowercase();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("scalegate_daemon=info,scalegate=info"));

    match format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .init();
        }
        _ => {
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .init();
        }
    }
}

/// Broadcasts once on SIGTERM or SIGINT.
fn spawn_signal_handler(shutdown_tx: broadcast::Sender<()>) -> Result<()> {
    let mut signals = Signals::new([SIGTERM, SIGINT])?;
    tokio::spawn(async move {
        use futures::stream::StreamExt;
        while let Some(signal) = signals.next().await {
            match signal {
                SIGTERM => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                    let _ = shutdown_tx.send(());
                    break;
                }
                SIGINT => {
                    info!("Received SIGINT, initiating graceful shutdown");
                    let _ = shutdown_tx.send(());
                    break;
                }
                _ => {}
            }
        }
    });
    Ok(())
}

async fn run_serve(config: &GatewayConfig, bind: Option<SocketAddr>) -> Result<()> {
    // Refuse to expose the gateway unauthenticated
    let token = config.bearer_token().with_context(|| {
        format!(
            "HTTP mode requires a bearer token in ${}",
            config.server.bearer_token_env
        )
    })?;

    let proxy = Arc::new(build_proxy(config)?);
    let app = server::router(proxy, token);

    let addr = bind.unwrap_or(config.server.bind);
    if !addr.ip().is_loopback() {
        warn!(%addr, "Gateway is listening on a non-loopback address");
    }
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
    spawn_signal_handler(shutdown_tx)?;

    server::serve(listener, app, async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    info!("Gateway shutdown complete");
    Ok(())
}

async fn run_stdio(config: &GatewayConfig) -> Result<()> {
    let proxy = Arc::new(build_proxy(config)?);
    info!("Serving MCP tools on stdio");
    scalegate_tools::serve_stdio(proxy).await
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let config = GatewayConfig::load(cli.config.as_deref()).with_context(|| {
        let path = cli
            .config
            .clone()
            .or_else(|| GatewayConfig::config_path().ok());
        format!("Failed to load configuration (expected at {path:?})")
    })?;

    info!(upstream = %config.upstream.base_url, "Loaded configuration");

    match cli.command {
        Command::Serve { bind } => run_serve(&config, bind).await,
        Command::Stdio => run_stdio(&config).await,
    }
}
