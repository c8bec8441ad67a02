//! Error types for tabshelf-storage

use std::path::PathBuf;
use tabshelf_config::StorageMode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Primary SQLite result codes that mean a writer could not get the lock.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database is locked: {0}")]
    Locked(#[source] sqlx::Error),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    #[error("Asset missing: {}", .0.display())]
    AssetMissing(PathBuf),

    #[error("Database was initialized for {recorded} tab storage but {configured} is configured")]
    ModeMismatch {
        recorded: StorageMode,
        configured: StorageMode,
    },

    #[error("Tab {tab_id} is stored as {found}, metadata expects {expected}")]
    FilenameMismatch {
        tab_id: i64,
        expected: String,
        found: String,
    },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] tabshelf_core::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StorageError {
    /// Whether the store reported it could not acquire a write lock in time
    pub fn is_lock_contention(&self) -> bool {
        matches!(self, StorageError::Locked(_))
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        if is_lock_error(&err) {
            StorageError::Locked(err)
        } else {
            StorageError::Database(err)
        }
    }
}

/// Classify by SQLite result code. Extended codes (e.g. `SQLITE_BUSY_SNAPSHOT`)
/// carry the primary code in their low byte.
fn is_lock_error(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db_err) = err else {
        return false;
    };
    db_err
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(is_lock_code)
}

fn is_lock_code(code: i32) -> bool {
    matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)
}
