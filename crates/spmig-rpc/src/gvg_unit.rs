//! GVG unit gRPC service.
//!
//! Exposes migration unit CRUD and the four plan-building scans. Source
//! nodes list plannable and conflicted units per family, destination nodes
//! list what they accepted as remoted, bucket migration lists by bucket.

use spmig_core::ServerConfig;
use spmig_state::{MigrateGvgUnit, MigrateStore};
use tonic::service::RoutesBuilder;
use tonic::{Request, Response, Status};
use tracing::{debug, info};

use crate::convert::{parse_status, required_unit, unit_to_proto};
use crate::proto;
use crate::proto::gvg_unit_service_server::{GvgUnitService, GvgUnitServiceServer};
use crate::registry::ServiceRole;
use crate::server::RpcError;
use crate::{remote_address, run_blocking};

/// gRPC implementation of the GVG unit service.
pub struct GvgUnitServer {
    store: MigrateStore,
}

impl GvgUnitServer {
    /// Create a new GVG unit server over `store`.
    pub fn new(store: MigrateStore) -> Self {
        Self { store }
    }

    /// Get the tonic service for mounting on a gRPC server.
    pub fn into_service(self, limits: &ServerConfig) -> GvgUnitServiceServer<Self> {
        GvgUnitServiceServer::new(self)
            .max_decoding_message_size(limits.max_message_size)
            .max_encoding_message_size(limits.max_message_size)
    }
}

impl ServiceRole for GvgUnitServer {
    fn name(&self) -> &'static str {
        "gvg_unit"
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

fn list_response(units: Vec<MigrateGvgUnit>) -> Response<proto::ListUnitsResponse> {
    Response::new(proto::ListUnitsResponse {
        units: units.into_iter().map(unit_to_proto).collect(),
    })
}

#[tonic::async_trait]
impl GvgUnitService for GvgUnitServer {
    async fn insert_unit(
        &self,
        request: Request<proto::InsertUnitRequest>,
    ) -> Result<Response<proto::InsertUnitResponse>, Status> {
        let remote = remote_address(&request);
        let unit = required_unit(request.into_inner().unit)?;
        let key = unit.migrate_key.clone();

        let store = self.store.clone();
        run_blocking(move || store.insert_unit(&unit)).await?;

        info!(%remote, %key, "migrate unit inserted via gRPC");
        Ok(Response::new(proto::InsertUnitResponse {}))
    }

    async fn update_unit_status(
        &self,
        request: Request<proto::UpdateUnitStatusRequest>,
    ) -> Result<Response<proto::UpdateUnitStatusResponse>, Status> {
        let remote = remote_address(&request);
        let req = request.into_inner();
        let status = parse_status(req.migrate_status)?;
        let key = req.migrate_key;

        let store = self.store.clone();
        let call_key = key.clone();
        run_blocking(move || store.update_unit_status(&call_key, status)).await?;

        debug!(%remote, %key, %status, "migrate unit status updated via gRPC");
        Ok(Response::new(proto::UpdateUnitStatusResponse {}))
    }

    async fn update_unit_checkpoint(
        &self,
        request: Request<proto::UpdateUnitCheckpointRequest>,
    ) -> Result<Response<proto::UpdateUnitCheckpointResponse>, Status> {
        let remote = remote_address(&request);
        let req = request.into_inner();
        let key = req.migrate_key;
        let last_migrated_object_id = req.last_migrated_object_id;

        let store = self.store.clone();
        let call_key = key.clone();
        run_blocking(move || store.update_unit_checkpoint(&call_key, last_migrated_object_id))
            .await?;

        debug!(%remote, %key, last_migrated_object_id, "migrate unit checkpoint updated via gRPC");
        Ok(Response::new(proto::UpdateUnitCheckpointResponse {}))
    }

    async fn get_unit(
        &self,
        request: Request<proto::GetUnitRequest>,
    ) -> Result<Response<proto::GetUnitResponse>, Status> {
        let remote = remote_address(&request);
        let key = request.into_inner().migrate_key;
        debug!(%remote, %key, "get migrate unit");

        let store = self.store.clone();
        let unit = run_blocking(move || store.get_unit(&key)).await?;

        Ok(Response::new(proto::GetUnitResponse {
            unit: Some(unit_to_proto(unit)),
        }))
    }

    async fn delete_unit(
        &self,
        request: Request<proto::DeleteUnitRequest>,
    ) -> Result<Response<proto::DeleteUnitResponse>, Status> {
        let remote = remote_address(&request);
        let unit = required_unit(request.into_inner().unit)?;
        debug!(%remote, key = %unit.migrate_key, "delete migrate unit");

        let store = self.store.clone();
        run_blocking(move || store.delete_unit(&unit)).await?;

        Ok(Response::new(proto::DeleteUnitResponse {}))
    }

    async fn list_units_by_family(
        &self,
        request: Request<proto::ListUnitsByFamilyRequest>,
    ) -> Result<Response<proto::ListUnitsResponse>, Status> {
        let remote = remote_address(&request);
        let req = request.into_inner();
        debug!(%remote, family_id = req.family_id, src_sp_id = req.src_sp_id, "list units by family");

        let store = self.store.clone();
        let units =
            run_blocking(move || store.list_units_by_family(req.family_id, req.src_sp_id)).await?;

        Ok(list_response(units))
    }

    async fn list_conflicted_units_by_family(
        &self,
        request: Request<proto::ListConflictedUnitsByFamilyRequest>,
    ) -> Result<Response<proto::ListUnitsResponse>, Status> {
        let remote = remote_address(&request);
        let family_id = request.into_inner().family_id;
        debug!(%remote, family_id, "list conflicted units by family");

        let store = self.store.clone();
        let units = run_blocking(move || store.list_conflicted_units_by_family(family_id)).await?;

        Ok(list_response(units))
    }

    async fn list_remoted_units(
        &self,
        request: Request<proto::ListRemotedUnitsRequest>,
    ) -> Result<Response<proto::ListUnitsResponse>, Status> {
        let remote = remote_address(&request);
        debug!(%remote, "list remoted units");

        let store = self.store.clone();
        let units = run_blocking(move || store.list_remoted_units()).await?;

        Ok(list_response(units))
    }

    async fn list_units_by_bucket(
        &self,
        request: Request<proto::ListUnitsByBucketRequest>,
    ) -> Result<Response<proto::ListUnitsResponse>, Status> {
        let remote = remote_address(&request);
        let bucket_id = request.into_inner().bucket_id;
        debug!(%remote, bucket_id, "list units by bucket");

        let store = self.store.clone();
        let units = run_blocking(move || store.list_units_by_bucket(bucket_id)).await?;

        Ok(list_response(units))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    fn wire_unit(key: &str, family_id: u32, src_sp_id: u32) -> proto::MigrateGvgUnit {
        proto::MigrateGvgUnit {
            migrate_key: key.to_string(),
            global_virtual_group_id: 1,
            virtual_group_family_id: family_id,
            src_sp_id,
            ..Default::default()
        }
    }

    async fn insert(server: &GvgUnitServer, unit: proto::MigrateGvgUnit) -> Result<(), Status> {
        server
            .insert_unit(Request::new(proto::InsertUnitRequest { unit: Some(unit) }))
            .await
            .map(|_| ())
    }

    #[tokio::test]
    async fn duplicate_insert_is_already_exists() {
        let server = GvgUnitServer::new(MigrateStore::open_in_memory().unwrap());
        insert(&server, wire_unit("u1", 7, 3)).await.unwrap();

        let err = insert(&server, wire_unit("u1", 7, 3)).await.unwrap_err();
        assert_eq!(err.code(), Code::AlreadyExists);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let server = GvgUnitServer::new(MigrateStore::open_in_memory().unwrap());
        let err = server
            .get_unit(Request::new(proto::GetUnitRequest {
                migrate_key: "nope".into(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn status_update_visible_in_family_scan() {
        let server = GvgUnitServer::new(MigrateStore::open_in_memory().unwrap());
        insert(&server, wire_unit("u1", 7, 3)).await.unwrap();

        server
            .update_unit_status(Request::new(proto::UpdateUnitStatusRequest {
                migrate_key: "u1".into(),
                migrate_status: proto::MigrateStatus::Migrating as i32,
            }))
            .await
            .unwrap();

        let units = server
            .list_units_by_family(Request::new(proto::ListUnitsByFamilyRequest {
                family_id: 7,
                src_sp_id: 3,
            }))
            .await
            .unwrap()
            .into_inner()
            .units;
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].migrate_status, 1);
    }

    #[tokio::test]
    async fn invalid_status_rejected_before_store() {
        let server = GvgUnitServer::new(MigrateStore::open_in_memory().unwrap());
        let err = server
            .update_unit_status(Request::new(proto::UpdateUnitStatusRequest {
                migrate_key: "u1".into(),
                migrate_status: 42,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }
}
