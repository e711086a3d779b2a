//! Typed client for the checkpoint and GVG unit services.
//!
//! Used by peer nodes and operator tooling. Every call returns the
//! server's `Status` unchanged so callers can branch on the code
//! (`NOT_FOUND`, `ALREADY_EXISTS`, ...).

use spmig_core::MAX_MESSAGE_SIZE;
use spmig_state::{MigrateGvgUnit, MigrateStatus, SubscribeProgress, SubscribeStream};
use tonic::Status;
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use crate::convert::{progress_from_proto, unit_from_proto, unit_to_proto};
use crate::proto;
use crate::proto::checkpoint_service_client::CheckpointServiceClient;
use crate::proto::gvg_unit_service_client::GvgUnitServiceClient;

/// Client over one channel to a migration store server.
#[derive(Clone)]
pub struct MigrateClient {
    checkpoints: CheckpointServiceClient<Channel>,
    units: GvgUnitServiceClient<Channel>,
}

impl MigrateClient {
    /// Connect to `endpoint` (e.g. `http://127.0.0.1:9333`).
    pub async fn connect(endpoint: impl Into<String>) -> Result<Self, tonic::transport::Error> {
        let endpoint: String = endpoint.into();
        let channel = Endpoint::from_shared(endpoint.clone())?.connect().await?;
        debug!(%endpoint, "connected to migrate store");
        Ok(Self::from_channel(channel))
    }

    pub fn from_channel(channel: Channel) -> Self {
        Self {
            checkpoints: CheckpointServiceClient::new(channel.clone())
                .max_decoding_message_size(MAX_MESSAGE_SIZE)
                .max_encoding_message_size(MAX_MESSAGE_SIZE),
            units: GvgUnitServiceClient::new(channel)
                .max_decoding_message_size(MAX_MESSAGE_SIZE)
                .max_encoding_message_size(MAX_MESSAGE_SIZE),
        }
    }

    // ── Checkpoints ────────────────────────────────────────────────

    pub async fn advance_progress(
        &mut self,
        stream: SubscribeStream,
        block_height: u64,
    ) -> Result<(), Status> {
        self.checkpoints
            .advance_progress(proto::AdvanceProgressRequest {
                stream: stream.as_key().to_string(),
                block_height,
            })
            .await?;
        Ok(())
    }

    pub async fn read_progress(&mut self, stream: SubscribeStream) -> Result<u64, Status> {
        let resp = self
            .checkpoints
            .read_progress(proto::ReadProgressRequest {
                stream: stream.as_key().to_string(),
            })
            .await?;
        Ok(resp.into_inner().block_height)
    }

    pub async fn list_progress(&mut self) -> Result<Vec<SubscribeProgress>, Status> {
        let resp = self
            .checkpoints
            .list_progress(proto::ListProgressRequest {})
            .await?;
        resp.into_inner()
            .progress
            .into_iter()
            .map(progress_from_proto)
            .collect()
    }

    // ── Units ──────────────────────────────────────────────────────

    pub async fn insert_unit(&mut self, unit: &MigrateGvgUnit) -> Result<(), Status> {
        self.units
            .insert_unit(proto::InsertUnitRequest {
                unit: Some(unit_to_proto(unit.clone())),
            })
            .await?;
        Ok(())
    }

    pub async fn update_unit_status(
        &mut self,
        migrate_key: &str,
        status: MigrateStatus,
    ) -> Result<(), Status> {
        self.units
            .update_unit_status(proto::UpdateUnitStatusRequest {
                migrate_key: migrate_key.to_string(),
                migrate_status: status.as_i32(),
            })
            .await?;
        Ok(())
    }

    pub async fn update_unit_checkpoint(
        &mut self,
        migrate_key: &str,
        last_migrated_object_id: u64,
    ) -> Result<(), Status> {
        self.units
            .update_unit_checkpoint(proto::UpdateUnitCheckpointRequest {
                migrate_key: migrate_key.to_string(),
                last_migrated_object_id,
            })
            .await?;
        Ok(())
    }

    pub async fn get_unit(&mut self, migrate_key: &str) -> Result<MigrateGvgUnit, Status> {
        let resp = self
            .units
            .get_unit(proto::GetUnitRequest {
                migrate_key: migrate_key.to_string(),
            })
            .await?;
        let unit = resp
            .into_inner()
            .unit
            .ok_or_else(|| Status::internal("server returned no unit"))?;
        unit_from_proto(unit)
    }

    pub async fn delete_unit(&mut self, unit: &MigrateGvgUnit) -> Result<(), Status> {
        self.units
            .delete_unit(proto::DeleteUnitRequest {
                unit: Some(unit_to_proto(unit.clone())),
            })
            .await?;
        Ok(())
    }

    pub async fn list_units_by_family(
        &mut self,
        family_id: u32,
        src_sp_id: u32,
    ) -> Result<Vec<MigrateGvgUnit>, Status> {
        let resp = self
            .units
            .list_units_by_family(proto::ListUnitsByFamilyRequest {
                family_id,
                src_sp_id,
            })
            .await?;
        units_from_response(resp.into_inner())
    }

    pub async fn list_conflicted_units_by_family(
        &mut self,
        family_id: u32,
    ) -> Result<Vec<MigrateGvgUnit>, Status> {
        let resp = self
            .units
            .list_conflicted_units_by_family(proto::ListConflictedUnitsByFamilyRequest {
                family_id,
            })
            .await?;
        units_from_response(resp.into_inner())
    }

    pub async fn list_remoted_units(&mut self) -> Result<Vec<MigrateGvgUnit>, Status> {
        let resp = self
            .units
            .list_remoted_units(proto::ListRemotedUnitsRequest {})
            .await?;
        units_from_response(resp.into_inner())
    }

    pub async fn list_units_by_bucket(
        &mut self,
        bucket_id: u64,
    ) -> Result<Vec<MigrateGvgUnit>, Status> {
        let resp = self
            .units
            .list_units_by_bucket(proto::ListUnitsByBucketRequest { bucket_id })
            .await?;
        units_from_response(resp.into_inner())
    }
}

fn units_from_response(resp: proto::ListUnitsResponse) -> Result<Vec<MigrateGvgUnit>, Status> {
    resp.units.into_iter().map(unit_from_proto).collect()
}
