//! redb table definitions for the migration store.

use redb::{MultimapTableDefinition, TableDefinition};

/// Last subscribed block height keyed by stream name (`sp_exit_progress`, ...).
pub const SUBSCRIBE_PROGRESS: TableDefinition<&str, u64> =
    TableDefinition::new("subscribe_progress");

/// Migration units keyed by `migrate_key`, JSON-serialized.
pub const MIGRATE_GVG_UNITS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("migrate_gvg_units");

/// Secondary index: virtual group family ID → `migrate_key`.
pub const GVG_UNITS_BY_FAMILY: MultimapTableDefinition<u32, &str> =
    MultimapTableDefinition::new("gvg_units_by_family");
