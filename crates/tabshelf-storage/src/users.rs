//! Existence probe over the `user` table shipped in the template image

use crate::{Result, StorageError};
use sqlx::{Row, SqlitePool};

/// Whether at least one user exists. A missing table or a count that is not
/// an integer means the database does not have the expected schema.
pub async fn has_user(pool: &SqlitePool) -> Result<bool> {
    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'user')",
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Err(StorageError::SchemaViolation(
            "User table not found".to_string(),
        ));
    }

    let row = sqlx::query("SELECT COUNT(*) AS count FROM user")
        .fetch_one(pool)
        .await?;
    let count: i64 = row
        .try_get("count")
        .map_err(|e| StorageError::SchemaViolation(format!("Invalid count value: {e}")))?;

    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, PoolSettings};

    #[tokio::test]
    async fn test_missing_table_is_schema_violation() {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::connect(&dir.path().join("t.db"), PoolSettings::default())
            .await
            .unwrap();

        let err = has_user(&pool).await.unwrap_err();
        assert!(matches!(err, StorageError::SchemaViolation(_)));
    }

    #[tokio::test]
    async fn test_counts_users() {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::connect(&dir.path().join("t.db"), PoolSettings::default())
            .await
            .unwrap();
        sqlx::query("CREATE TABLE user (id INTEGER PRIMARY KEY, username TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();

        assert!(!has_user(&pool).await.unwrap());

        sqlx::query("INSERT INTO user (username) VALUES ('admin')")
            .execute(&pool)
            .await
            .unwrap();
        assert!(has_user(&pool).await.unwrap());
    }
}
