//! SnapKV server entry point.
//!
//! Parses flags, dumps the snapshot file to the trace log, then accepts
//! connections until the process is killed.

use anyhow::Context;
use clap::Parser;
use snapkv::commands::CommandHandler;
use snapkv::config::ServerConfig;
use snapkv::connection::{accept_loop, ConnectionStats};
use snapkv::snapshot::dump_bytes;
use snapkv::storage::StorageEngine;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!(version = snapkv::VERSION, "Starting SnapKV");

    let snapshot_path = config.snapshot_path();
    match dump_bytes(&snapshot_path) {
        Ok(count) => {
            info!(path = %snapshot_path.display(), bytes = count, "Snapshot file found")
        }
        Err(e) => {
            warn!(path = %snapshot_path.display(), error = %e, "Snapshot file not readable")
        }
    }

    let storage = Arc::new(StorageEngine::new());
    let config = Arc::new(config);
    let handler = CommandHandler::new(storage, Arc::clone(&config));
    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!("Listening on {}", config.bind_address());

    accept_loop(listener, handler, stats).await;

    Ok(())
}
