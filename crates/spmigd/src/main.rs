//! spmigd — the storage-provider migration store daemon.
//!
//! Serves the migration store (subscribe progress cursors and GVG
//! migration units) over gRPC, and inspects a store offline.
//!
//! # Usage
//!
//! ```text
//! spmigd serve --config /etc/spmig/spmig.toml
//! spmigd serve --address 0.0.0.0:9333 --data-dir /var/lib/spmig
//! spmigd progress --data-dir /var/lib/spmig
//! spmigd units --data-dir /var/lib/spmig family --family 7 --src-sp 3
//! spmigd config --config /etc/spmig/spmig.toml
//! ```

mod inspect;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use spmig_core::{LogConfig, SpMigConfig};

#[derive(Parser)]
#[command(name = "spmigd", about = "Storage-provider migration store daemon")]
struct Cli {
    /// Path to spmig.toml. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding spmig.redb (overrides the config file).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open the store and serve it over gRPC until interrupted.
    Serve {
        /// Address to listen on (overrides the config file).
        #[arg(long)]
        address: Option<String>,
    },

    /// Print the block height of every subscribe stream.
    Progress,

    /// Print migration units as JSON lines.
    Units {
        #[command(subcommand)]
        query: inspect::UnitQuery,
    },

    /// Print the effective configuration as TOML.
    Config,
}

fn init_tracing(log: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log.filter));
    if log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SpMigConfig::from_file(path)?,
        None => SpMigConfig::default(),
    };
    if let Some(data_dir) = cli.data_dir {
        config.store.data_dir = data_dir;
    }

    init_tracing(&config.log);

    match cli.command {
        Command::Serve { address } => {
            if let Some(address) = address {
                config.server.address = address;
            }
            serve::run_serve(config).await
        }
        Command::Progress => inspect::print_progress(&config.store),
        Command::Units { query } => inspect::print_units(&config.store, query),
        Command::Config => inspect::print_config(&config),
    }
}
