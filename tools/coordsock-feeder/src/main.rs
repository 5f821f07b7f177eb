//! coordsock Gesture Feeder
//!
//! Connects to a relay and sends a random gesture at a random position to one
//! recipient (or `all`) on a fixed interval, logging whatever comes back.

use anyhow::{Context, Result};
use clap::Parser;
use coordsock_client::Client;
use coordsock_core::{Inbound, Message};
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const GESTURES: &[&str] = &["tap", "swipe", "pinch", "rotate", "long_press"];

#[derive(Parser)]
#[command(name = "coordsock-feeder")]
#[command(about = "Send random gestures through a coordsock relay")]
#[command(version)]
struct Cli {
    /// Relay URL
    #[arg(short, long, default_value = "ws://localhost:8080")]
    url: String,

    /// Identifier to connect as
    #[arg(short, long, default_value = "1")]
    from: String,

    /// Recipient identifier, or "all"
    #[arg(short, long, default_value = "2")]
    to: String,

    /// Milliseconds between messages
    #[arg(short, long, default_value = "1000")]
    interval: u64,

    /// Stop after this many messages (0 = run until interrupted)
    #[arg(short, long, default_value = "0")]
    count: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// A gesture at a position in `[0, 100)` on both axes
fn random_message<R: Rng>(rng: &mut R, from: &str, to: &str) -> Message {
    let gesture = GESTURES.choose(rng).copied().unwrap_or("tap");
    Message::new(from, to)
        .with_position(rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0))
        .with_gesture(gesture)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let client = Client::connect(&cli.url, &cli.from)
        .await
        .with_context(|| format!("connecting to {} as {}", cli.url, cli.from))?;

    let mut ticker = tokio::time::interval(Duration::from_millis(cli.interval.max(1)));
    let mut sent = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if cli.count > 0 && sent >= cli.count {
                    break;
                }
                let msg = random_message(&mut rand::thread_rng(), &cli.from, &cli.to);
                client.send(&msg).await.context("sending gesture")?;
                sent += 1;
                info!("Sent {} at ({:.2}, {:.2}) to {}", msg.gestval, msg.xval, msg.yval, msg.to);
            }
            inbound = client.recv() => match inbound {
                Some(Inbound::Message(msg)) => {
                    info!("Received {} at ({:.2}, {:.2}) from {}", msg.gestval, msg.xval, msg.yval, msg.from);
                }
                Some(Inbound::Error(error)) => warn!("Relay error: {}", error),
                Some(Inbound::Unrecognized(raw)) => {
                    warn!("Unrecognized payload: {}", String::from_utf8_lossy(&raw));
                }
                None => {
                    warn!("Relay closed the connection");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    client.close().await;
    info!("Sent {} messages", sent);
    Ok(())
}
