//! Domain types for the migration store.
//!
//! These types represent the persisted progress cursors and migration
//! units. Units are serializable to/from JSON for storage in redb tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a storage provider node.
pub type SpId = u32;

/// Identifier of a virtual group family.
pub type FamilyId = u32;

/// Identifier of a global virtual group.
pub type GvgId = u32;

/// Identifier of a bucket. `0` means "not bucket scoped".
pub type BucketId = u64;

// ── Subscribe progress ────────────────────────────────────────────

/// An independent, ordered stream of on-chain migration events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscribeStream {
    SpExit,
    SwapOut,
    BucketMigrate,
}

impl SubscribeStream {
    pub const ALL: [SubscribeStream; 3] = [
        SubscribeStream::SpExit,
        SubscribeStream::SwapOut,
        SubscribeStream::BucketMigrate,
    ];

    /// Key of this stream's row in the progress table.
    pub fn as_key(&self) -> &'static str {
        match self {
            SubscribeStream::SpExit => "sp_exit_progress",
            SubscribeStream::SwapOut => "swap_out_progress",
            SubscribeStream::BucketMigrate => "bucket_migrate_progress",
        }
    }
}

impl fmt::Display for SubscribeStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

/// Error returned when parsing an unknown stream name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStream(pub String);

impl fmt::Display for UnknownStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown subscribe stream: {}", self.0)
    }
}

impl std::error::Error for UnknownStream {}

impl FromStr for SubscribeStream {
    type Err = UnknownStream;

    /// Accepts both the persisted key (`sp_exit_progress`) and the short
    /// form (`sp_exit`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let short = s.strip_suffix("_progress").unwrap_or(s);
        match short {
            "sp_exit" => Ok(SubscribeStream::SpExit),
            "swap_out" => Ok(SubscribeStream::SwapOut),
            "bucket_migrate" => Ok(SubscribeStream::BucketMigrate),
            _ => Err(UnknownStream(s.to_string())),
        }
    }
}

/// One recorded progress cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeProgress {
    pub stream: SubscribeStream,
    pub last_subscribed_block_height: u64,
}

// ── Migrate GVG unit ──────────────────────────────────────────────

/// Lifecycle status of a migration unit.
///
/// The store accepts any status for any unit; legality of a transition is
/// decided by the planner, which can use [`MigrateStatus::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrateStatus {
    #[default]
    Init,
    Migrating,
    Migrated,
    Failed,
}

impl MigrateStatus {
    /// Numeric value used on the wire.
    pub fn as_i32(&self) -> i32 {
        match self {
            MigrateStatus::Init => 0,
            MigrateStatus::Migrating => 1,
            MigrateStatus::Migrated => 2,
            MigrateStatus::Failed => 3,
        }
    }

    /// Whether moving from `self` to `next` follows
    /// `Init → Migrating → Migrated`, with `Failed` reachable from `Migrating`.
    /// Rewriting the current status is always allowed.
    pub fn can_transition_to(&self, next: MigrateStatus) -> bool {
        use MigrateStatus::*;
        *self == next
            || matches!(
                (self, next),
                (Init, Migrating) | (Migrating, Migrated) | (Migrating, Failed)
            )
    }
}

impl TryFrom<i32> for MigrateStatus {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MigrateStatus::Init),
            1 => Ok(MigrateStatus::Migrating),
            2 => Ok(MigrateStatus::Migrated),
            3 => Ok(MigrateStatus::Failed),
            other => Err(other),
        }
    }
}

impl fmt::Display for MigrateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MigrateStatus::Init => "init",
            MigrateStatus::Migrating => "migrating",
            MigrateStatus::Migrated => "migrated",
            MigrateStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Migration intent and status of one GVG shard copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MigrateGvgUnit {
    /// Unique identity, derived by the planner from family/GVG/redundancy/bucket.
    pub migrate_key: String,
    pub global_virtual_group_id: GvgId,
    pub virtual_group_family_id: FamilyId,
    /// 0 identifies the primary copy's family-level unit.
    pub redundancy_index: i32,
    /// 0 for a family-wide unit, otherwise the bucket being migrated.
    pub bucket_id: BucketId,
    pub is_secondary: bool,
    /// Set once two source claims exist for the same shard.
    pub is_conflicted: bool,
    /// Set on the destination node once it accepted the incoming unit.
    pub is_remoted: bool,
    /// 0 until assigned.
    pub src_sp_id: SpId,
    /// 0 until assigned.
    pub dest_sp_id: SpId,
    pub last_migrated_object_id: u64,
    pub migrate_status: MigrateStatus,
}

impl MigrateGvgUnit {
    /// A fresh `Init` unit with no flags set and no SPs assigned.
    pub fn new(
        migrate_key: impl Into<String>,
        global_virtual_group_id: GvgId,
        virtual_group_family_id: FamilyId,
    ) -> Self {
        Self {
            migrate_key: migrate_key.into(),
            global_virtual_group_id,
            virtual_group_family_id,
            redundancy_index: 0,
            bucket_id: 0,
            is_secondary: false,
            is_conflicted: false,
            is_remoted: false,
            src_sp_id: 0,
            dest_sp_id: 0,
            last_migrated_object_id: 0,
            migrate_status: MigrateStatus::Init,
        }
    }
}
