//! spmig-rpc — the gRPC boundary of the migration store.
//!
//! Exposes the checkpoint and GVG unit operations of
//! [`spmig_state::MigrateStore`] to peers and operators over one
//! multiplexed gRPC listener.
//!
//! # Architecture
//!
//! ```text
//! RpcServer (one listener, keep-alive + message-size limits)
//!   └── ServiceRegistry (built at startup)
//!       ├── CheckpointServer (ServiceRole)
//!       │   ├── AdvanceProgress() → upserts one stream cursor
//!       │   ├── ReadProgress() → cursor, 0 if never advanced
//!       │   └── ListProgress()
//!       ├── GvgUnitServer (ServiceRole)
//!       │   ├── InsertUnit() / GetUnit() / DeleteUnit()
//!       │   ├── UpdateUnitStatus() / UpdateUnitCheckpoint()
//!       │   └── ListUnitsByFamily() / ListConflictedUnitsByFamily()
//!       │       / ListRemotedUnits() / ListUnitsByBucket()
//!       └── ReflectionRole (ServiceRole)
//!           └── grpc.reflection v1 + v1alpha
//!
//! MigrateClient
//!   └── typed calls over both services
//! ```
//!
//! Store calls are blocking redb transactions and run on the blocking
//! thread pool.

pub mod checkpoint;
pub mod client;
pub mod convert;
pub mod gvg_unit;
pub mod reflection;
pub mod registry;
pub mod server;

/// Generated protobuf types and gRPC service stubs.
pub mod proto {
    tonic::include_proto!("spmig.migrate.v1");
}

/// Encoded descriptors of `migrate.proto`, served by [`ReflectionRole`].
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("migrate_descriptor");

pub use checkpoint::CheckpointServer;
pub use client::MigrateClient;
pub use gvg_unit::GvgUnitServer;
pub use reflection::ReflectionRole;
pub use registry::{ServiceRegistry, ServiceRole};
pub use server::{RpcError, RpcServer};

use std::net::SocketAddr;

use spmig_state::MigrateResult;
use tonic::{Request, Status};

/// Address of the peer that issued `request`, or `"unknown"` when the
/// transport did not record one.
pub fn remote_address<T>(request: &Request<T>) -> String {
    request
        .remote_addr()
        .map(|addr: SocketAddr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Run a store call on the blocking pool and map its error to a status.
pub(crate) async fn run_blocking<T, F>(call: F) -> Result<T, Status>
where
    F: FnOnce() -> MigrateResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| Status::internal(format!("store task failed: {e}")))?
        .map_err(convert::status_from_store)
}
