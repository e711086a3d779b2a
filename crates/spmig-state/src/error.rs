//! Error types for the migration store.

use thiserror::Error;

/// Result type alias for migration store operations.
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Errors that can occur during migration store operations.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// A write that must affect exactly one row left the table with an
    /// unexpected row count.
    #[error("store inconsistency in {table}: expected {expected} rows after write, found {actual}")]
    Inconsistency {
        table: String,
        expected: u64,
        actual: u64,
    },
}

impl MigrateError {
    /// True for backend failures, as opposed to the classified outcomes
    /// (not found, duplicate key, inconsistency).
    pub fn is_storage_fault(&self) -> bool {
        !matches!(
            self,
            MigrateError::NotFound(_)
                | MigrateError::DuplicateKey(_)
                | MigrateError::Inconsistency { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classified_errors_are_not_storage_faults() {
        assert!(!MigrateError::NotFound("k".into()).is_storage_fault());
        assert!(!MigrateError::DuplicateKey("k".into()).is_storage_fault());
        assert!(
            !MigrateError::Inconsistency {
                table: "t".into(),
                expected: 1,
                actual: 0,
            }
            .is_storage_fault()
        );
        assert!(MigrateError::Write("disk full".into()).is_storage_fault());
        assert!(MigrateError::Deserialize("bad json".into()).is_storage_fault());
    }

    #[test]
    fn inconsistency_message_names_table() {
        let err = MigrateError::Inconsistency {
            table: "subscribe_progress".into(),
            expected: 1,
            actual: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("subscribe_progress"));
        assert!(msg.contains("expected 1 rows"));
    }
}
