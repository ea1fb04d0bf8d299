//! Stream router node.
//!
//! # Architecture Overview
//!
//! ```text
//!   streaming host                       ┌──────────────────────────────────────┐
//!   (lifecycle callbacks)                │             ROUTER NODE              │
//!   ─────────────────────────────────────┼─▶ http ──▶ driver ──▶ routing engine │
//!                                        │                          │           │
//!   admin / queries                      │                          ▼           │
//!   ─────────────────────────────────────┼─▶ http         registry, ledger,     │
//!                                        │                accumulator           │
//!                                        │                          │           │
//!                                        │                          ▼           │
//!                                        │                 host outbound flows ─┼──▶ recipients
//!                                        │                                      │
//!                                        │  config · observability · lifecycle  │
//!                                        └──────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use stream_router::config::load_config;
use stream_router::http::{AppState, HttpServer};
use stream_router::lifecycle::{shutdown, signals, startup, Shutdown};
use stream_router::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "stream-router")]
#[command(about = "Quadratic-funding stream router", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "router.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Arc::new(load_config(&args.config)?);

    logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "stream-router starting");
    tracing::info!(
        config = %args.config.display(),
        bind_address = %config.server.bind_address,
        router = %config.router.address,
        token = %config.router.token,
        strategy = ?config.matching.strategy,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let router = startup::build_router(&config.router)?;

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown_coordinator = Shutdown::new();
    let stopped = shutdown_coordinator.signalled();
    signals::spawn_signal_handler(&shutdown_coordinator);

    let server = HttpServer::new(AppState::new(Arc::clone(&config), router.clone()));
    server.run(listener, stopped).await?;

    if let Some(path) = &config.router.snapshot_path {
        if let Err(e) = shutdown::save_on_shutdown(&router, path) {
            tracing::error!(path = %path.display(), error = %e, "Failed to save snapshot");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
