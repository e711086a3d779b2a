//! Conversions between store types and their protobuf messages, and the
//! mapping of store errors onto gRPC status codes.

use spmig_state::{
    MigrateError, MigrateGvgUnit, MigrateStatus, SubscribeProgress, SubscribeStream, UnknownStream,
};
use tonic::Status;

use crate::proto;

/// Map a store error onto the gRPC status a caller sees.
pub fn status_from_store(err: MigrateError) -> Status {
    match err {
        MigrateError::NotFound(key) => Status::not_found(format!("migrate unit not found: {key}")),
        MigrateError::DuplicateKey(key) => {
            Status::already_exists(format!("migrate unit already exists: {key}"))
        }
        err @ MigrateError::Inconsistency { .. } => Status::data_loss(err.to_string()),
        err => Status::internal(err.to_string()),
    }
}

pub fn parse_stream(name: &str) -> Result<SubscribeStream, Status> {
    name.parse()
        .map_err(|e: UnknownStream| Status::invalid_argument(e.to_string()))
}

pub fn parse_status(value: i32) -> Result<MigrateStatus, Status> {
    MigrateStatus::try_from(value)
        .map_err(|v| Status::invalid_argument(format!("unknown migrate status: {v}")))
}

pub fn unit_to_proto(unit: MigrateGvgUnit) -> proto::MigrateGvgUnit {
    proto::MigrateGvgUnit {
        migrate_key: unit.migrate_key,
        global_virtual_group_id: unit.global_virtual_group_id,
        virtual_group_family_id: unit.virtual_group_family_id,
        redundancy_index: unit.redundancy_index,
        bucket_id: unit.bucket_id,
        is_secondary: unit.is_secondary,
        is_conflicted: unit.is_conflicted,
        is_remoted: unit.is_remoted,
        src_sp_id: unit.src_sp_id,
        dest_sp_id: unit.dest_sp_id,
        last_migrated_object_id: unit.last_migrated_object_id,
        migrate_status: unit.migrate_status.as_i32(),
    }
}

pub fn unit_from_proto(unit: proto::MigrateGvgUnit) -> Result<MigrateGvgUnit, Status> {
    Ok(MigrateGvgUnit {
        migrate_status: parse_status(unit.migrate_status)?,
        migrate_key: unit.migrate_key,
        global_virtual_group_id: unit.global_virtual_group_id,
        virtual_group_family_id: unit.virtual_group_family_id,
        redundancy_index: unit.redundancy_index,
        bucket_id: unit.bucket_id,
        is_secondary: unit.is_secondary,
        is_conflicted: unit.is_conflicted,
        is_remoted: unit.is_remoted,
        src_sp_id: unit.src_sp_id,
        dest_sp_id: unit.dest_sp_id,
        last_migrated_object_id: unit.last_migrated_object_id,
    })
}

/// Unwrap a required message field.
pub fn required_unit(unit: Option<proto::MigrateGvgUnit>) -> Result<MigrateGvgUnit, Status> {
    let unit = unit.ok_or_else(|| Status::invalid_argument("missing unit"))?;
    if unit.migrate_key.is_empty() {
        return Err(Status::invalid_argument("missing migrate_key"));
    }
    unit_from_proto(unit)
}

pub fn progress_to_proto(progress: SubscribeProgress) -> proto::SubscribeProgress {
    proto::SubscribeProgress {
        stream: progress.stream.as_key().to_string(),
        last_subscribed_block_height: progress.last_subscribed_block_height,
    }
}

pub fn progress_from_proto(progress: proto::SubscribeProgress) -> Result<SubscribeProgress, Status> {
    Ok(SubscribeProgress {
        stream: parse_stream(&progress.stream)?,
        last_subscribed_block_height: progress.last_subscribed_block_height,
    })
}
