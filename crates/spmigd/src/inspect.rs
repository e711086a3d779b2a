//! Offline inspection of a store file and of the effective configuration.
//!
//! redb holds an exclusive lock on its file, so the store commands only work
//! while no daemon has the same data directory open.

use clap::Subcommand;
use spmig_core::{SpMigConfig, StoreConfig};
use spmig_state::{MigrateStore, UnitFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum UnitQuery {
    /// Plannable primary units of a family owned by a source SP.
    Family {
        #[arg(long)]
        family: u32,
        #[arg(long)]
        src_sp: u32,
    },
    /// Conflicted units of a family.
    Conflicted {
        #[arg(long)]
        family: u32,
    },
    /// Units accepted by this node as a migration destination.
    Remoted,
    /// Units scoped to a bucket.
    Bucket {
        #[arg(long)]
        bucket: u64,
    },
}

impl From<UnitQuery> for UnitFilter {
    fn from(query: UnitQuery) -> Self {
        match query {
            UnitQuery::Family { family, src_sp } => UnitFilter::Plannable {
                family_id: family,
                src_sp_id: src_sp,
            },
            UnitQuery::Conflicted { family } => UnitFilter::ConflictedInFamily { family_id: family },
            UnitQuery::Remoted => UnitFilter::Remoted,
            UnitQuery::Bucket { bucket } => UnitFilter::Bucket { bucket_id: bucket },
        }
    }
}

fn open(store: &StoreConfig) -> anyhow::Result<MigrateStore> {
    let path = store.db_path();
    if !path.exists() {
        anyhow::bail!("no store at {}", path.display());
    }
    Ok(MigrateStore::open(&path)?)
}

pub fn print_progress(store: &StoreConfig) -> anyhow::Result<()> {
    let store = open(store)?;
    for progress in store.list_progress()? {
        println!("{}\t{}", progress.stream, progress.last_subscribed_block_height);
    }
    Ok(())
}

pub fn print_units(store: &StoreConfig, query: UnitQuery) -> anyhow::Result<()> {
    let store = open(store)?;
    for unit in store.list_units(query.into())? {
        println!("{}", serde_json::to_string(&unit)?);
    }
    Ok(())
}

pub fn print_config(config: &SpMigConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_map_to_filters() {
        assert_eq!(
            UnitFilter::from(UnitQuery::Family {
                family: 7,
                src_sp: 3
            }),
            UnitFilter::Plannable {
                family_id: 7,
                src_sp_id: 3
            }
        );
        assert_eq!(
            UnitFilter::from(UnitQuery::Conflicted { family: 7 }),
            UnitFilter::ConflictedInFamily { family_id: 7 }
        );
        assert_eq!(UnitFilter::from(UnitQuery::Remoted), UnitFilter::Remoted);
        assert_eq!(
            UnitFilter::from(UnitQuery::Bucket { bucket: 42 }),
            UnitFilter::Bucket { bucket_id: 42 }
        );
    }

    #[test]
    fn missing_store_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            data_dir: dir.path().join("absent"),
        };
        let err = print_progress(&config).unwrap_err();
        assert!(err.to_string().contains("no store at"));
    }

    #[test]
    fn prints_from_existing_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            data_dir: dir.path().to_path_buf(),
        };
        {
            let store = MigrateStore::open(&config.db_path()).unwrap();
            store
                .insert_unit(&spmig_state::MigrateGvgUnit::new("u1", 1, 7))
                .unwrap();
        }
        print_progress(&config).unwrap();
        print_units(&config, UnitQuery::Family { family: 7, src_sp: 0 }).unwrap();
    }

    #[test]
    fn effective_config_prints_without_a_store() {
        let mut config = SpMigConfig::default();
        config.store.data_dir = "/nonexistent/spmig".into();
        print_config(&config).unwrap();

        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("/nonexistent/spmig"));
    }
}
