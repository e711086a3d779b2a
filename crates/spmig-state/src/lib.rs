//! spmig-state — durable migration coordination store for a storage provider.
//!
//! Backed by [redb](https://docs.rs/redb), tracks two things across restarts:
//!
//! - how far each on-chain migration event stream (sp-exit, swap-out,
//!   bucket-migrate) has been consumed, as one block-height cursor per stream;
//! - the migration units (one per GVG shard copy that must move), their
//!   status, their resume checkpoint and the flags planners filter on.
//!
//! # Architecture
//!
//! Progress cursors live in a `&str → u64` table keyed by the stream's
//! persisted name. Units are JSON-serialized into a `&str → &[u8]` table
//! keyed by `migrate_key`, with a `u32 → &str` multimap indexing units by
//! virtual group family.
//!
//! The `MigrateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks. Every call runs a blocking redb
//! transaction.

pub mod error;
pub mod filter;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{MigrateError, MigrateResult};
pub use filter::UnitFilter;
pub use store::MigrateStore;
pub use types::*;
