//! Checkpoint gRPC service.
//!
//! Lets the subscription pipeline (local or remote) persist and read back
//! how far each migration event stream has been consumed.

use spmig_core::ServerConfig;
use spmig_state::MigrateStore;
use tonic::service::RoutesBuilder;
use tonic::{Request, Response, Status};
use tracing::debug;

use crate::convert::{parse_stream, progress_to_proto};
use crate::proto;
use crate::proto::checkpoint_service_server::{CheckpointService, CheckpointServiceServer};
use crate::registry::ServiceRole;
use crate::server::RpcError;
use crate::{remote_address, run_blocking};

/// gRPC implementation of the checkpoint service.
pub struct CheckpointServer {
    store: MigrateStore,
}

impl CheckpointServer {
    /// Create a new checkpoint server over `store`.
    pub fn new(store: MigrateStore) -> Self {
        Self { store }
    }

    /// Get the tonic service for mounting on a gRPC server.
    pub fn into_service(self, limits: &ServerConfig) -> CheckpointServiceServer<Self> {
        CheckpointServiceServer::new(self)
            .max_decoding_message_size(limits.max_message_size)
            .max_encoding_message_size(limits.max_message_size)
    }
}

impl ServiceRole for CheckpointServer {
    fn name(&self) -> &'static str {
        "checkpoint"
    }

    fn register(
        self: Box<Self>,
        routes: &mut RoutesBuilder,
        limits: &ServerConfig,
    ) -> Result<(), RpcError> {
        routes.add_service((*self).into_service(limits));
        Ok(())
    }
}

#[tonic::async_trait]
impl CheckpointService for CheckpointServer {
    async fn advance_progress(
        &self,
        request: Request<proto::AdvanceProgressRequest>,
    ) -> Result<Response<proto::AdvanceProgressResponse>, Status> {
        let remote = remote_address(&request);
        let req = request.into_inner();
        let stream = parse_stream(&req.stream)?;
        let block_height = req.block_height;

        let store = self.store.clone();
        run_blocking(move || store.advance_progress(stream, block_height)).await?;

        debug!(%remote, %stream, block_height, "progress advanced via gRPC");
        Ok(Response::new(proto::AdvanceProgressResponse {}))
    }

    async fn read_progress(
        &self,
        request: Request<proto::ReadProgressRequest>,
    ) -> Result<Response<proto::ReadProgressResponse>, Status> {
        let remote = remote_address(&request);
        let stream = parse_stream(&request.into_inner().stream)?;
        debug!(%remote, %stream, "read progress");

        let store = self.store.clone();
        let block_height = run_blocking(move || store.read_progress(stream)).await?;

        Ok(Response::new(proto::ReadProgressResponse { block_height }))
    }

    async fn list_progress(
        &self,
        request: Request<proto::ListProgressRequest>,
    ) -> Result<Response<proto::ListProgressResponse>, Status> {
        let remote = remote_address(&request);
        debug!(%remote, "list progress");

        let store = self.store.clone();
        let progress = run_blocking(move || store.list_progress()).await?;

        Ok(Response::new(proto::ListProgressResponse {
            progress: progress.into_iter().map(progress_to_proto).collect(),
        }))
    }
}
