//! Serve mode — opens the store and exposes it over gRPC.
//!
//! In this mode, the daemon:
//! 1. Opens (or creates) the redb store in the data directory
//! 2. Logs the checkpoint every subscribe stream will resume from
//! 3. Registers the checkpoint, GVG unit and reflection services on one
//!    listener
//! 4. On Ctrl-C, drains in-flight calls and exits

use spmig_core::SpMigConfig;
use spmig_rpc::{CheckpointServer, GvgUnitServer, ReflectionRole, RpcServer, ServiceRegistry};
use spmig_state::{MigrateStore, SubscribeStream};
use tracing::info;

/// Run the daemon until a shutdown signal arrives.
pub async fn run_serve(config: SpMigConfig) -> anyhow::Result<()> {
    info!("spmigd starting");

    std::fs::create_dir_all(&config.store.data_dir)?;
    let db_path = config.store.db_path();

    // ── Store ────────────────────────────────────────────────────
    let store = MigrateStore::open(&db_path)?;
    info!(path = ?db_path, "migrate store opened");

    for stream in SubscribeStream::ALL {
        let block_height = store.read_progress(stream)?;
        info!(%stream, block_height, "subscribe stream checkpoint");
    }

    // ── gRPC server ──────────────────────────────────────────────
    let registry = ServiceRegistry::new()
        .with(CheckpointServer::new(store.clone()))
        .with(GvgUnitServer::new(store))
        .with(ReflectionRole);
    let server = RpcServer::start(&config.server, registry).await?;
    info!(addr = %server.local_addr(), "gRPC server listening");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    server.stop().await?;
    info!("spmigd stopped");
    Ok(())
}
