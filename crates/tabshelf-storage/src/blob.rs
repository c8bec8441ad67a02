//! Relational blob storage for tab files

use crate::{Result, RetryPolicy, StorageError};
use sqlx::SqlitePool;
use tabshelf_core::{TabFile, TabId};

/// Tab file bytes keyed by tab ID in the `tab_file` table.
///
/// Writes go through the retry policy; reads do not, since WAL readers never
/// wait on writers.
#[derive(Clone)]
pub struct BlobStore {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl BlobStore {
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or replace the file for `tab_id` in a single statement
    pub async fn store_tab_file(&self, tab_id: TabId, filename: &str, data: &[u8]) -> Result<()> {
        self.retry
            .run("store_tab_file", move || async move {
                sqlx::query("INSERT OR REPLACE INTO tab_file (tab_id, filename, data) VALUES (?, ?, ?)")
                    .bind(tab_id)
                    .bind(filename)
                    .bind(data)
                    .execute(&self.pool)
                    .await
                    .map(|_| ())
                    .map_err(StorageError::from)
            })
            .await?;

        tracing::debug!(tab_id, filename, bytes = data.len(), "Stored tab file");
        Ok(())
    }

    pub async fn get_tab_file_row(&self, tab_id: TabId) -> Result<Option<TabFile>> {
        let row: Option<(String, Vec<u8>)> =
            sqlx::query_as("SELECT filename, data FROM tab_file WHERE tab_id = ?")
                .bind(tab_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(filename, data)| TabFile { filename, data }))
    }

    /// Remove the file for `tab_id`; a missing row is not an error
    pub async fn delete_tab_file(&self, tab_id: TabId) -> Result<()> {
        let removed = self
            .retry
            .run("delete_tab_file", move || async move {
                sqlx::query("DELETE FROM tab_file WHERE tab_id = ?")
                    .bind(tab_id)
                    .execute(&self.pool)
                    .await
                    .map(|result| result.rows_affected())
                    .map_err(StorageError::from)
            })
            .await?;

        tracing::debug!(tab_id, removed, "Deleted tab file");
        Ok(())
    }

    pub async fn tab_ids(&self) -> Result<Vec<TabId>> {
        let ids: Vec<TabId> = sqlx::query_scalar("SELECT tab_id FROM tab_file ORDER BY tab_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}
