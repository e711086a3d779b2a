//! spmig.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Largest message accepted or sent by the RPC server (3 GiB).
pub const MAX_MESSAGE_SIZE: usize = 3 * 1024 * 1024 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpMigConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub log: LogConfig,
}

/// Listener address plus the connection limits of the gRPC server.
///
/// tonic has no server-side knob for the idle timeout or the minimum client
/// ping interval; those two are advisory and only logged at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub max_message_size: usize,
    /// Advisory: intended idle cutoff for connections. Logged, not enforced.
    pub idle_timeout_secs: u64,
    /// Force clients to reconnect after this long.
    pub max_connection_age_secs: u64,
    /// How long `RpcServer::stop` waits for in-flight calls before aborting
    /// the server task. Not applied when a single connection is aged out.
    pub max_connection_age_grace_secs: u64,
    /// Ping idle clients this often.
    pub keepalive_interval_secs: u64,
    /// Drop the connection if a ping is not acked within this long.
    pub keepalive_timeout_secs: u64,
    /// Advisory: intended floor on client ping frequency. Logged, not enforced.
    pub min_ping_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:9333".to_string(),
            max_message_size: MAX_MESSAGE_SIZE,
            idle_timeout_secs: 10,
            max_connection_age_secs: 10,
            max_connection_age_grace_secs: 5,
            keepalive_interval_secs: 5,
            keepalive_timeout_secs: 1,
            min_ping_interval_secs: 5,
        }
    }
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn max_connection_age(&self) -> Duration {
        Duration::from_secs(self.max_connection_age_secs)
    }

    pub fn max_connection_age_grace(&self) -> Duration {
        Duration::from_secs(self.max_connection_age_grace_secs)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn keepalive_timeout(&self) -> Duration {
        Duration::from_secs(self.keepalive_timeout_secs)
    }

    pub fn min_ping_interval(&self) -> Duration {
        Duration::from_secs(self.min_ping_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/spmig"),
        }
    }
}

impl StoreConfig {
    /// Path of the redb file inside the data directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("spmig.redb")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info,spmigd=debug,spmig=debug".to_string(),
            json: false,
        }
    }
}

impl SpMigConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SpMigConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Render the effective configuration, as printed by `spmigd config`.
    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
