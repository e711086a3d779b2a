//! MigrateStore — redb-backed persistence for migration coordination.
//!
//! Provides the progress cursors of the migration event streams and the
//! migration unit table with its plan-building scans. Units are
//! JSON-serialized into redb's `&[u8]` value columns. The store supports
//! both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{
    Database, ReadableDatabase, ReadableMultimapTable, ReadableTable, ReadableTableMetadata,
};
use tracing::{debug, warn};

use crate::error::{MigrateError, MigrateResult};
use crate::filter::UnitFilter;
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `MigrateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| MigrateError::$variant(e.to_string())
    };
}

/// Fail with `Inconsistency` unless a write left `table` with `expected` rows.
///
/// redb applies an insert inside the open write transaction, so this cannot
/// fire against a healthy backend and no store test reaches it. It guards
/// against a backend that reports lengths out of step with its writes.
fn expect_len(table: &str, expected: u64, actual: u64) -> MigrateResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(MigrateError::Inconsistency {
            table: table.to_string(),
            expected,
            actual,
        })
    }
}

/// Thread-safe migration store backed by redb.
#[derive(Clone)]
pub struct MigrateStore {
    db: Arc<Database>,
}

impl MigrateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> MigrateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "migrate store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> MigrateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory migrate store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> MigrateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SUBSCRIBE_PROGRESS).map_err(map_err!(Table))?;
        txn.open_table(MIGRATE_GVG_UNITS).map_err(map_err!(Table))?;
        txn.open_multimap_table(GVG_UNITS_BY_FAMILY)
            .map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Subscribe progress ─────────────────────────────────────────

    /// Record that events up to and including `block_height` have been
    /// processed for `stream`.
    ///
    /// Creates the row on first use and overwrites it afterwards, inside one
    /// write transaction. The height is written unconditionally: callers only
    /// advance in stream order.
    pub fn advance_progress(&self, stream: SubscribeStream, block_height: u64) -> MigrateResult<()> {
        let key = stream.as_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let created;
        {
            let mut table = txn.open_table(SUBSCRIBE_PROGRESS).map_err(map_err!(Table))?;
            let before = table.len().map_err(map_err!(Read))?;
            created = table
                .insert(key, block_height)
                .map_err(map_err!(Write))?
                .is_none();
            let after = table.len().map_err(map_err!(Read))?;
            let expected = if created { before + 1 } else { before };
            expect_len("subscribe_progress", expected, after)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%stream, block_height, created, "subscribe progress advanced");
        Ok(())
    }

    /// Last recorded block height for `stream`, or 0 if it never advanced.
    pub fn read_progress(&self, stream: SubscribeStream) -> MigrateResult<u64> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SUBSCRIBE_PROGRESS).map_err(map_err!(Table))?;
        let height = table
            .get(stream.as_key())
            .map_err(map_err!(Read))?
            .map(|guard| guard.value())
            .unwrap_or(0);
        Ok(height)
    }

    /// Every recorded progress cursor. Streams that never advanced are absent.
    pub fn list_progress(&self) -> MigrateResult<Vec<SubscribeProgress>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SUBSCRIBE_PROGRESS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            match key.value().parse::<SubscribeStream>() {
                Ok(stream) => results.push(SubscribeProgress {
                    stream,
                    last_subscribed_block_height: value.value(),
                }),
                Err(e) => warn!(error = %e, "skipping unknown progress row"),
            }
        }
        Ok(results)
    }

    // ── Migrate GVG units ──────────────────────────────────────────

    /// Insert a new migration unit. Fails with `DuplicateKey` if a unit with
    /// the same `migrate_key` already exists.
    pub fn insert_unit(&self, unit: &MigrateGvgUnit) -> MigrateResult<()> {
        let key = unit.migrate_key.as_str();
        let value = serde_json::to_vec(unit).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(MIGRATE_GVG_UNITS).map_err(map_err!(Table))?;
            if table.get(key).map_err(map_err!(Read))?.is_some() {
                return Err(MigrateError::DuplicateKey(key.to_string()));
            }
            let before = table.len().map_err(map_err!(Read))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
            let after = table.len().map_err(map_err!(Read))?;
            expect_len("migrate_gvg_units", before + 1, after)?;

            let mut by_family = txn
                .open_multimap_table(GVG_UNITS_BY_FAMILY)
                .map_err(map_err!(Table))?;
            by_family
                .insert(unit.virtual_group_family_id, key)
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(
            %key,
            family_id = unit.virtual_group_family_id,
            gvg_id = unit.global_virtual_group_id,
            bucket_id = unit.bucket_id,
            "migrate unit inserted"
        );
        Ok(())
    }

    /// Set the status of a unit. A key that matches nothing is not an error.
    ///
    /// Any status is written. A move outside the normal lifecycle is logged
    /// at warn.
    pub fn update_unit_status(&self, migrate_key: &str, status: MigrateStatus) -> MigrateResult<()> {
        let mut previous = None;
        let updated = self.modify_unit(migrate_key, |unit| {
            previous = Some(unit.migrate_status);
            unit.migrate_status = status;
        })?;
        if let Some(previous) = previous {
            if !previous.can_transition_to(status) {
                warn!(%migrate_key, from = %previous, to = %status, "irregular migrate status transition stored");
            }
        }
        debug!(%migrate_key, %status, updated, "migrate unit status updated");
        Ok(())
    }

    /// Set the resume checkpoint of a unit. A key that matches nothing is not
    /// an error.
    pub fn update_unit_checkpoint(
        &self,
        migrate_key: &str,
        last_migrated_object_id: u64,
    ) -> MigrateResult<()> {
        let updated = self.modify_unit(migrate_key, |unit| {
            unit.last_migrated_object_id = last_migrated_object_id
        })?;
        debug!(%migrate_key, last_migrated_object_id, updated, "migrate unit checkpoint updated");
        Ok(())
    }

    /// Read-modify-write one unit in a single transaction. Returns whether
    /// the unit existed.
    fn modify_unit(
        &self,
        migrate_key: &str,
        apply: impl FnOnce(&mut MigrateGvgUnit),
    ) -> MigrateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(MIGRATE_GVG_UNITS).map_err(map_err!(Table))?;
            let existing = table
                .get(migrate_key)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value().to_vec());
            let Some(bytes) = existing else {
                return Ok(false);
            };
            let mut unit: MigrateGvgUnit =
                serde_json::from_slice(&bytes).map_err(map_err!(Deserialize))?;
            apply(&mut unit);
            let value = serde_json::to_vec(&unit).map_err(map_err!(Serialize))?;
            table
                .insert(migrate_key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(true)
    }

    /// Get a unit by key. Fails with `NotFound` if absent.
    pub fn get_unit(&self, migrate_key: &str) -> MigrateResult<MigrateGvgUnit> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(MIGRATE_GVG_UNITS).map_err(map_err!(Table))?;
        match table.get(migrate_key).map_err(map_err!(Read))? {
            Some(guard) => {
                serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))
            }
            None => Err(MigrateError::NotFound(migrate_key.to_string())),
        }
    }

    /// Units are retained after completion; deleting one is a no-op.
    pub fn delete_unit(&self, unit: &MigrateGvgUnit) -> MigrateResult<()> {
        debug!(key = %unit.migrate_key, "migrate unit delete requested, record retained");
        Ok(())
    }

    /// Units matching `filter`, in key order. No match is an empty `Vec`.
    pub fn list_units(&self, filter: UnitFilter) -> MigrateResult<Vec<MigrateGvgUnit>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(MIGRATE_GVG_UNITS).map_err(map_err!(Table))?;
        let mut results = Vec::new();

        if let Some(family_id) = filter.family() {
            let by_family = txn
                .open_multimap_table(GVG_UNITS_BY_FAMILY)
                .map_err(map_err!(Table))?;
            for entry in by_family.get(family_id).map_err(map_err!(Read))? {
                let key = entry.map_err(map_err!(Read))?;
                let Some(value) = table.get(key.value()).map_err(map_err!(Read))? else {
                    warn!(key = key.value(), family_id, "family index points at missing unit");
                    continue;
                };
                let unit: MigrateGvgUnit =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                if filter.matches(&unit) {
                    results.push(unit);
                }
            }
        } else {
            for entry in table.iter().map_err(map_err!(Read))? {
                let (_, value) = entry.map_err(map_err!(Read))?;
                let unit: MigrateGvgUnit =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                if filter.matches(&unit) {
                    results.push(unit);
                }
            }
        }
        Ok(results)
    }

    /// Plannable units of a family owned by `src_sp_id` (source-side planning).
    pub fn list_units_by_family(
        &self,
        family_id: FamilyId,
        src_sp_id: SpId,
    ) -> MigrateResult<Vec<MigrateGvgUnit>> {
        self.list_units(UnitFilter::Plannable {
            family_id,
            src_sp_id,
        })
    }

    /// Conflicted units of a family.
    pub fn list_conflicted_units_by_family(
        &self,
        family_id: FamilyId,
    ) -> MigrateResult<Vec<MigrateGvgUnit>> {
        self.list_units(UnitFilter::ConflictedInFamily { family_id })
    }

    /// Units accepted by this node as a migration destination.
    pub fn list_remoted_units(&self) -> MigrateResult<Vec<MigrateGvgUnit>> {
        self.list_units(UnitFilter::Remoted)
    }

    /// Units scoped to `bucket_id`, whatever their flags.
    pub fn list_units_by_bucket(&self, bucket_id: BucketId) -> MigrateResult<Vec<MigrateGvgUnit>> {
        self.list_units(UnitFilter::Bucket { bucket_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_unit(key: &str, family_id: u32, src_sp_id: u32) -> MigrateGvgUnit {
        let mut unit = MigrateGvgUnit::new(key, 100, family_id);
        unit.src_sp_id = src_sp_id;
        unit
    }

    fn keys(units: &[MigrateGvgUnit]) -> Vec<&str> {
        units.iter().map(|u| u.migrate_key.as_str()).collect()
    }

    // ── Subscribe progress ─────────────────────────────────────────

    #[test]
    fn progress_read_without_rows_is_zero() {
        let store = MigrateStore::open_in_memory().unwrap();
        for stream in SubscribeStream::ALL {
            assert_eq!(store.read_progress(stream).unwrap(), 0);
        }
        assert!(store.list_progress().unwrap().is_empty());
    }

    #[test]
    fn progress_first_advance_creates_one_row() {
        let store = MigrateStore::open_in_memory().unwrap();
        store.advance_progress(SubscribeStream::SpExit, 100).unwrap();

        assert_eq!(store.read_progress(SubscribeStream::SpExit).unwrap(), 100);
        assert_eq!(
            store.list_progress().unwrap(),
            vec![SubscribeProgress {
                stream: SubscribeStream::SpExit,
                last_subscribed_block_height: 100,
            }]
        );
    }

    #[test]
    fn progress_advance_updates_in_place() {
        let store = MigrateStore::open_in_memory().unwrap();
        store.advance_progress(SubscribeStream::SpExit, 100).unwrap();
        store.advance_progress(SubscribeStream::SpExit, 250).unwrap();

        assert_eq!(store.read_progress(SubscribeStream::SpExit).unwrap(), 250);
        assert_eq!(store.list_progress().unwrap().len(), 1);
    }

    #[test]
    fn progress_overwrite_is_unconditional() {
        let store = MigrateStore::open_in_memory().unwrap();
        store.advance_progress(SubscribeStream::SwapOut, 500).unwrap();
        store.advance_progress(SubscribeStream::SwapOut, 20).unwrap();

        assert_eq!(store.read_progress(SubscribeStream::SwapOut).unwrap(), 20);
    }

    #[test]
    fn progress_streams_are_independent() {
        let store = MigrateStore::open_in_memory().unwrap();
        store.advance_progress(SubscribeStream::SpExit, 10).unwrap();
        store.advance_progress(SubscribeStream::BucketMigrate, 30).unwrap();

        assert_eq!(store.read_progress(SubscribeStream::SpExit).unwrap(), 10);
        assert_eq!(store.read_progress(SubscribeStream::SwapOut).unwrap(), 0);
        assert_eq!(
            store.read_progress(SubscribeStream::BucketMigrate).unwrap(),
            30
        );
        assert_eq!(store.list_progress().unwrap().len(), 2);
    }

    // ── Unit CRUD ──────────────────────────────────────────────────

    #[test]
    fn unit_insert_and_get() {
        let store = MigrateStore::open_in_memory().unwrap();
        let mut unit = test_unit("u1", 7, 3);
        unit.dest_sp_id = 9;
        unit.redundancy_index = -1;

        store.insert_unit(&unit).unwrap();
        assert_eq!(store.get_unit("u1").unwrap(), unit);
    }

    #[test]
    fn unit_get_missing_is_not_found() {
        let store = MigrateStore::open_in_memory().unwrap();
        let err = store.get_unit("nope").unwrap_err();
        assert!(matches!(err, MigrateError::NotFound(ref k) if k == "nope"));
    }

    #[test]
    fn unit_duplicate_insert_keeps_original() {
        let store = MigrateStore::open_in_memory().unwrap();
        let first = test_unit("u1", 7, 3);
        store.insert_unit(&first).unwrap();

        let mut second = test_unit("u1", 8, 4);
        second.is_conflicted = true;
        let err = store.insert_unit(&second).unwrap_err();
        assert!(matches!(err, MigrateError::DuplicateKey(ref k) if k == "u1"));

        assert_eq!(store.get_unit("u1").unwrap(), first);
        assert_eq!(store.list_units_by_family(7, 3).unwrap().len(), 1);
        assert!(store.list_units_by_family(8, 4).unwrap().is_empty());
    }

    #[test]
    fn unit_update_status_and_checkpoint() {
        let store = MigrateStore::open_in_memory().unwrap();
        store.insert_unit(&test_unit("u1", 7, 3)).unwrap();

        store
            .update_unit_status("u1", MigrateStatus::Migrating)
            .unwrap();
        store.update_unit_checkpoint("u1", 4242).unwrap();

        let unit = store.get_unit("u1").unwrap();
        assert_eq!(unit.migrate_status, MigrateStatus::Migrating);
        assert_eq!(unit.last_migrated_object_id, 4242);
        assert_eq!(unit.src_sp_id, 3);
    }

    #[test]
    fn unit_irregular_status_transition_is_stored() {
        let store = MigrateStore::open_in_memory().unwrap();
        store.insert_unit(&test_unit("u1", 7, 3)).unwrap();

        // Init -> Migrated skips Migrating; Migrated -> Init goes backwards.
        assert!(!MigrateStatus::Init.can_transition_to(MigrateStatus::Migrated));
        store.update_unit_status("u1", MigrateStatus::Migrated).unwrap();
        assert_eq!(
            store.get_unit("u1").unwrap().migrate_status,
            MigrateStatus::Migrated
        );
        store.update_unit_status("u1", MigrateStatus::Init).unwrap();
        assert_eq!(
            store.get_unit("u1").unwrap().migrate_status,
            MigrateStatus::Init
        );
    }

    #[test]
    fn unit_updates_on_missing_key_succeed_without_creating() {
        let store = MigrateStore::open_in_memory().unwrap();
        store
            .update_unit_status("ghost", MigrateStatus::Failed)
            .unwrap();
        store.update_unit_checkpoint("ghost", 9).unwrap();

        assert!(matches!(
            store.get_unit("ghost"),
            Err(MigrateError::NotFound(_))
        ));
        assert!(store.list_units_by_bucket(0).unwrap().is_empty());
    }

    #[test]
    fn unit_delete_retains_record() {
        let store = MigrateStore::open_in_memory().unwrap();
        let unit = test_unit("u1", 7, 3);
        store.insert_unit(&unit).unwrap();

        store.delete_unit(&unit).unwrap();
        assert_eq!(store.get_unit("u1").unwrap(), unit);
    }

    // ── Queries ────────────────────────────────────────────────────

    #[test]
    fn family_queries_split_conflicted_units() {
        let store = MigrateStore::open_in_memory().unwrap();
        let u1 = test_unit("u1", 7, 3);
        let mut u2 = test_unit("u2", 7, 3);
        u2.is_conflicted = true;
        store.insert_unit(&u1).unwrap();
        store.insert_unit(&u2).unwrap();

        assert_eq!(store.list_units_by_family(7, 3).unwrap(), vec![u1]);
        assert_eq!(store.list_conflicted_units_by_family(7).unwrap(), vec![u2]);
    }

    #[test]
    fn family_query_excludes_non_plannable_units() {
        let store = MigrateStore::open_in_memory().unwrap();
        store.insert_unit(&test_unit("a-plannable", 7, 3)).unwrap();

        let mut secondary = test_unit("b-secondary", 7, 3);
        secondary.is_secondary = true;
        secondary.redundancy_index = 1;
        let mut remoted = test_unit("c-remoted", 7, 3);
        remoted.is_remoted = true;
        let mut bucket = test_unit("d-bucket", 7, 3);
        bucket.bucket_id = 42;
        let other_src = test_unit("e-other-src", 7, 4);
        let other_family = test_unit("f-other-family", 8, 3);
        for unit in [&secondary, &remoted, &bucket, &other_src, &other_family] {
            store.insert_unit(unit).unwrap();
        }

        assert_eq!(
            keys(&store.list_units_by_family(7, 3).unwrap()),
            vec!["a-plannable"]
        );
        assert_eq!(
            keys(&store.list_units_by_family(7, 4).unwrap()),
            vec!["e-other-src"]
        );
    }

    #[test]
    fn bucket_unit_only_in_matching_queries() {
        let store = MigrateStore::open_in_memory().unwrap();
        let mut unit = test_unit("bucket-42", 7, 3);
        unit.bucket_id = 42;
        store.insert_unit(&unit).unwrap();

        assert_eq!(store.list_units_by_bucket(42).unwrap(), vec![unit]);
        assert!(store.list_units_by_bucket(43).unwrap().is_empty());
        assert!(store.list_units_by_family(7, 3).unwrap().is_empty());
        assert!(store.list_conflicted_units_by_family(7).unwrap().is_empty());
        assert!(store.list_remoted_units().unwrap().is_empty());
    }

    #[test]
    fn remoted_query_is_global() {
        let store = MigrateStore::open_in_memory().unwrap();
        let mut a = test_unit("a", 1, 3);
        a.is_remoted = true;
        let mut b = test_unit("b", 2, 5);
        b.is_remoted = true;
        b.is_conflicted = true;
        store.insert_unit(&a).unwrap();
        store.insert_unit(&b).unwrap();
        store.insert_unit(&test_unit("c", 1, 3)).unwrap();

        assert_eq!(keys(&store.list_remoted_units().unwrap()), vec!["a", "b"]);
    }

    #[test]
    fn queries_reflect_updates() {
        let store = MigrateStore::open_in_memory().unwrap();
        store.insert_unit(&test_unit("u1", 7, 3)).unwrap();
        store.update_unit_checkpoint("u1", 77).unwrap();

        let listed = store.list_units_by_family(7, 3).unwrap();
        assert_eq!(listed[0].last_migrated_object_id, 77);
    }

    #[test]
    fn empty_store_queries_return_empty() {
        let store = MigrateStore::open_in_memory().unwrap();

        assert!(store.list_units_by_family(1, 1).unwrap().is_empty());
        assert!(store.list_conflicted_units_by_family(1).unwrap().is_empty());
        assert!(store.list_remoted_units().unwrap().is_empty());
        assert!(store.list_units_by_bucket(1).unwrap().is_empty());
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn progress_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("spmig.redb");

        {
            let store = MigrateStore::open(&db_path).unwrap();
            store.advance_progress(SubscribeStream::SpExit, 100).unwrap();
        }

        // Reopen the same database file.
        let store = MigrateStore::open(&db_path).unwrap();
        assert_eq!(store.read_progress(SubscribeStream::SpExit).unwrap(), 100);
    }

    #[test]
    fn units_and_family_index_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("spmig.redb");

        {
            let store = MigrateStore::open(&db_path).unwrap();
            store.insert_unit(&test_unit("u1", 7, 3)).unwrap();
            store.update_unit_checkpoint("u1", 12).unwrap();
        }

        let store = MigrateStore::open(&db_path).unwrap();
        let listed = store.list_units_by_family(7, 3).unwrap();
        assert_eq!(keys(&listed), vec!["u1"]);
        assert_eq!(listed[0].last_migrated_object_id, 12);
        assert!(matches!(
            store.insert_unit(&test_unit("u1", 7, 3)),
            Err(MigrateError::DuplicateKey(_))
        ));
    }
}
