//! hashd — a delayed one-way hashing service.
//!
//! Accepts a secret over HTTP, returns an identifier immediately, and
//! serves the base64-encoded SHA-512 digest once a deliberately delayed
//! background computation has completed and persisted a store snapshot.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌──────────────────────────────────────────────┐
//!                   │                   hashd                       │
//!                   │                                               │
//!   Client Request  │  ┌─────────┐   ┌─────────┐   ┌────────────┐  │
//!   ────────────────┼─▶│ request │──▶│  stats  │──▶│ route table│  │
//!                   │  │   id    │   │ wrapper │   │ (regex,    │  │
//!                   │  └─────────┘   └─────────┘   │ first match│  │
//!                   │                              └─────┬──────┘  │
//!                   │                                    ▼         │
//!                   │                            ┌────────────┐    │
//!                   │       ┌───────────┐  set   │  handlers  │    │
//!                   │       │   store   │◀───────┤            │    │
//!                   │       └─────┬─────┘ submit └────────────┘    │
//!                   │             │  ▲        │                    │
//!                   │    snapshot ▼  │ digest ▼                    │
//!                   │       ┌───────────────────┐                  │
//!                   │       │  worker pipeline  │ (delayed)        │
//!                   │       └─────────┬─────────┘                  │
//!                   │                 ▼                            │
//!                   │          snapshot file                       │
//!                   │                                               │
//!                   │  lifecycle: signals/endpoint → drain → stop  │
//!                   └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hashd::config::{load_config, ServiceConfig};
use hashd::lifecycle::signals;
use hashd::Service;

#[derive(Parser)]
#[command(name = "hashd")]
#[command(about = "Delayed one-way hashing service", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address.
    #[arg(short, long)]
    listen_addr: Option<String>,

    /// Override the snapshot file path.
    #[arg(short, long)]
    snapshot_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hashd=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(addr) = cli.listen_addr {
        config.listener.bind_address = addr;
    }
    if let Some(path) = cli.snapshot_path {
        config.persistence.snapshot_path = path;
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        snapshot_path = %config.persistence.snapshot_path.display(),
        hash_delay_ms = config.worker.hash_delay_ms,
        wait_on_drain = config.worker.wait_on_drain,
        "Configuration loaded"
    );

    let service = Service::assemble(&config)?;
    signals::spawn_listener(service.shutdown_handle());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    service.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
