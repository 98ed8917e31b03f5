//! Backfill Daemon - Main Entry Point
//!
//! Composition root: wires the SQLite checkpoint store, the job catalog
//! and the JSON-RPC control surface, then waits for shutdown.

mod content_client;
mod jobs;
mod telemetry;

use anyhow::Result;
use backfill_api_rpc::{RpcServer, RpcServerConfig};
use backfill_infra_sqlite::{create_pool, run_migrations};
use std::sync::Arc;
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_DB_PATH: &str = "~/.backfill/admin.db";
const DEFAULT_CONTENT_URL: &str = "http://127.0.0.1:9631";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging (fmt + optional OTLP export in one subscriber)
    telemetry::init_tracing()?;

    info!("Backfill daemon v{} starting...", VERSION);

    // 2. Load configuration
    let db_path = std::env::var("BACKFILL_DB_PATH")
        .unwrap_or_else(|_| shellexpand::tilde(DEFAULT_DB_PATH).into_owned());

    let rpc_port: u16 = std::env::var("BACKFILL_RPC_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9630);

    let content_url =
        std::env::var("BACKFILL_CONTENT_URL").unwrap_or_else(|_| DEFAULT_CONTENT_URL.to_string());

    info!(db_path = %db_path, "Initializing database...");

    // 3. Initialize database
    let pool = create_pool(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Build the job registry (DI wiring)
    let registry = Arc::new(jobs::build_registry(pool, &content_url)?);

    // 5. Start JSON-RPC server
    info!("Starting JSON-RPC server...");
    let rpc_config = RpcServerConfig {
        port: rpc_port,
        ..Default::default()
    };
    let rpc_server = RpcServer::new(rpc_config, registry.clone());
    let (rpc_handle, addr) = rpc_server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;
    info!(addr = %addr, "Control surface ready");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping running jobs...");

    // Running jobs notice the stop at their next item boundary; their
    // checkpoints are preserved for resume on the next start.
    registry.stop_all();
    let _ = rpc_handle.stop();
    rpc_handle.stopped().await;

    info!("Backfill daemon stopped");
    Ok(())
}
