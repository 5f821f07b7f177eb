//! coordsock Relay Server
//!
//! Accepts WebSocket connections at `/ws?id=<client id>` and relays
//! coordinate/gesture messages between the connected clients.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use coordsock_core::DEFAULT_LISTEN_ADDR;
use coordsock_router::{DuplicatePolicy, Router, RouterConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::config::FileConfig;

#[derive(Parser)]
#[command(name = "coordsock-relay")]
#[command(about = "coordsock relay server")]
#[command(version)]
struct Cli {
    /// Listen address [default: 0.0.0.0:8080]
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Server name, used in logs
    #[arg(short, long)]
    name: Option<String>,

    /// Config file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum connected clients
    #[arg(long)]
    max_clients: Option<usize>,

    /// What to do when an identifier is already connected (replace, reject, overwrite)
    #[arg(long)]
    duplicate_policy: Option<DuplicatePolicy>,

    /// Also validate broadcast messages
    #[arg(long)]
    validate_broadcast: bool,

    /// Close connections idle for this many seconds
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins when set
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    let mut config = RouterConfig::default();
    file.apply(&mut config);
    if let Some(name) = &cli.name {
        config.name = name.clone();
    }
    if let Some(max) = cli.max_clients {
        config.max_clients = max;
    }
    if let Some(policy) = cli.duplicate_policy {
        config.duplicate_policy = policy;
    }
    if cli.validate_broadcast {
        config.validate_broadcast = true;
    }
    if let Some(secs) = cli.idle_timeout {
        config.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }

    let listen = match cli.listen.or(file.listen) {
        Some(addr) => addr,
        None => DEFAULT_LISTEN_ADDR
            .parse()
            .context("default listen address")?,
    };

    tracing::info!("Starting {}", config.name);
    tracing::info!("Listening on: ws://{}{}", listen, config.websocket.path);
    tracing::debug!("Config: {:?}", config);

    let router = Router::new(config);

    let stopper = router.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            stopper.stop();
        }
    });

    router
        .serve_websocket(&listen.to_string())
        .await
        .with_context(|| format!("serving on {}", listen))?;

    Ok(())
}
