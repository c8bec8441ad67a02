//! SQLite connection setup and relational schema

use crate::Result;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tabshelf_config::{StorageConfig, StorageMode};

const MODE_KEY: &str = "tab_storage";

/// Connection settings shared by the relational and key-value files
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

impl PoolSettings {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            max_connections: config.max_connections.max(1),
            busy_timeout: config.busy_timeout(),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Open a pool in WAL mode with `synchronous = NORMAL` and the configured
/// busy timeout. SQLite waits up to the busy timeout for a write lock before
/// reporting `SQLITE_BUSY`.
pub async fn connect(path: &Path, settings: PoolSettings) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(settings.busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .connect_with(options)
        .await?;

    tracing::debug!(path = %path.display(), "Opened SQLite pool");
    Ok(pool)
}

/// Create the tables this crate owns. The template image normally has them
/// already; older images may not.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tab_file (
            tab_id INTEGER PRIMARY KEY,
            filename TEXT NOT NULL,
            data BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tabshelf_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Storage mode recorded when the database was first initialized
pub async fn recorded_mode(pool: &SqlitePool) -> Result<Option<StorageMode>> {
    let value: Option<String> =
        sqlx::query_scalar("SELECT value FROM tabshelf_meta WHERE key = ?")
            .bind(MODE_KEY)
            .fetch_optional(pool)
            .await?;

    match value {
        Some(value) => Ok(Some(value.parse()?)),
        None => Ok(None),
    }
}

pub async fn record_mode(pool: &SqlitePool, mode: StorageMode) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO tabshelf_meta (key, value) VALUES (?, ?)")
        .bind(MODE_KEY)
        .bind(mode.as_str())
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_enables_wal() {
        let dir = tempfile::tempdir().unwrap();
        let pool = connect(&dir.path().join("test.db"), PoolSettings::default())
            .await
            .unwrap();

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");

        let busy_timeout: i64 = sqlx::query_scalar("PRAGMA busy_timeout")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(busy_timeout, 5000);
    }

    #[tokio::test]
    async fn test_mode_record_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let pool = connect(&dir.path().join("test.db"), PoolSettings::default())
            .await
            .unwrap();
        ensure_schema(&pool).await.unwrap();
        // Idempotent
        ensure_schema(&pool).await.unwrap();

        assert_eq!(recorded_mode(&pool).await.unwrap(), None);
        record_mode(&pool, StorageMode::Filesystem).await.unwrap();
        assert_eq!(
            recorded_mode(&pool).await.unwrap(),
            Some(StorageMode::Filesystem)
        );
        record_mode(&pool, StorageMode::Database).await.unwrap();
        assert_eq!(
            recorded_mode(&pool).await.unwrap(),
            Some(StorageMode::Database)
        );
    }
}
