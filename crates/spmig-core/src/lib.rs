pub mod config;

pub use config::{LogConfig, ServerConfig, SpMigConfig, StoreConfig, MAX_MESSAGE_SIZE};
