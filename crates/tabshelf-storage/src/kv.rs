//! Key-value store for structured records
//!
//! Keys are ordered tuples whose first part is a namespace string, e.g.
//! `("tab", 7)` or `("youtube", 7, "VuKSlOT__9s")`. Values are JSON.
//! The store lives in its own SQLite file; SQLite's writer lock plus the
//! busy timeout serializes concurrent writers.

use crate::db::{self, PoolSettings};
use crate::{Result, StorageError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::fmt;
use std::path::Path;
use time::OffsetDateTime;

/// One element of a compound key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPart {
    Int(i64),
    Str(String),
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        KeyPart::Int(value)
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Str(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Str(value)
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Int(value) => write!(f, "{value}"),
            KeyPart::Str(value) => write!(f, "{value:?}"),
        }
    }
}

/// Compound key: a namespace followed by any number of parts
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KvKey {
    namespace: String,
    parts: Vec<KeyPart>,
}

impl KvKey {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            parts: Vec::new(),
        }
    }

    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.parts.push(part.into());
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Parts after the namespace
    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    pub fn starts_with(&self, prefix: &KvKey) -> bool {
        self.namespace == prefix.namespace && self.parts.starts_with(&prefix.parts)
    }

    /// Stable text form used as the primary key: a JSON array
    pub fn encode(&self) -> Result<String> {
        let mut all = Vec::with_capacity(self.parts.len() + 1);
        all.push(KeyPart::Str(self.namespace.clone()));
        all.extend(self.parts.iter().cloned());
        Ok(serde_json::to_string(&all)?)
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let mut parts: Vec<KeyPart> = serde_json::from_str(encoded)?;
        if parts.is_empty() {
            return Err(StorageError::InvalidKey(encoded.to_string()));
        }
        match parts.remove(0) {
            KeyPart::Str(namespace) => Ok(Self { namespace, parts }),
            KeyPart::Int(_) => Err(StorageError::InvalidKey(encoded.to_string())),
        }
    }
}

impl fmt::Display for KvKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}", self.namespace)?;
        for part in &self.parts {
            write!(f, ", {part}")?;
        }
        f.write_str("]")
    }
}

/// SQLite-backed key-value store
#[derive(Clone)]
pub struct KvStore {
    pool: SqlitePool,
}

impl KvStore {
    pub async fn open(path: &Path, settings: PoolSettings) -> Result<Self> {
        let pool = db::connect(path, settings).await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                namespace TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_kv_namespace ON kv(namespace)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &KvKey) -> Result<Option<T>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM kv WHERE key = ?")
            .bind(key.encode()?)
            .fetch_optional(&self.pool)
            .await?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(&self, key: &KvKey, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        sqlx::query(
            r#"
            INSERT INTO kv (key, namespace, value, updated_at) VALUES (?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key.encode()?)
        .bind(key.namespace())
        .bind(json)
        .bind(OffsetDateTime::now_utc().unix_timestamp())
        .execute(&self.pool)
        .await?;

        tracing::trace!(key = %key, "KV set");
        Ok(())
    }

    /// Delete a key; deleting a missing key is a no-op
    pub async fn delete(&self, key: &KvKey) -> Result<()> {
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key.encode()?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All entries whose key starts with `prefix`, in key order
    pub async fn list<T: DeserializeOwned>(&self, prefix: &KvKey) -> Result<Vec<(KvKey, T)>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM kv WHERE namespace = ?")
                .bind(prefix.namespace())
                .fetch_all(&self.pool)
                .await?;

        let mut entries = Vec::new();
        for (encoded, json) in rows {
            let key = KvKey::decode(&encoded)?;
            if key.starts_with(prefix) {
                entries.push((key, serde_json::from_str(&json)?));
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    /// Atomically add one to the integer at `key` (missing counts as 0) and
    /// return the new value
    pub async fn increment(&self, key: &KvKey) -> Result<i64> {
        let value: String = sqlx::query_scalar(
            r#"
            INSERT INTO kv (key, namespace, value, updated_at) VALUES (?, ?, '1', ?)
            ON CONFLICT(key) DO UPDATE
                SET value = CAST(CAST(value AS INTEGER) + 1 AS TEXT),
                    updated_at = excluded.updated_at
            RETURNING value
            "#,
        )
        .bind(key.encode()?)
        .bind(key.namespace())
        .bind(OffsetDateTime::now_utc().unix_timestamp())
        .fetch_one(&self.pool)
        .await?;

        value.parse().map_err(|_| {
            StorageError::SchemaViolation(format!("counter {key} holds non-integer {value:?}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_store(dir: &tempfile::TempDir) -> KvStore {
        KvStore::open(&dir.path().join("kv.db"), PoolSettings::default())
            .await
            .unwrap()
    }

    #[test]
    fn test_key_encoding() {
        let key = KvKey::new("youtube").with(7).with("VuKSlOT__9s");
        let encoded = key.encode().unwrap();
        assert_eq!(encoded, r#"["youtube",7,"VuKSlOT__9s"]"#);
        assert_eq!(KvKey::decode(&encoded).unwrap(), key);
        assert_eq!(key.to_string(), r#"["youtube", 7, "VuKSlOT__9s"]"#);
    }

    #[test]
    fn test_decode_rejects_bad_keys() {
        assert!(KvKey::decode("[]").is_err());
        assert!(KvKey::decode("[1, 2]").is_err());
        assert!(KvKey::decode("not json").is_err());
    }

    #[test]
    fn test_prefix_does_not_match_longer_ids() {
        let prefix = KvKey::new("youtube").with(1);
        assert!(KvKey::new("youtube").with(1).with("a").starts_with(&prefix));
        assert!(!KvKey::new("youtube").with(10).with("a").starts_with(&prefix));
        assert!(!KvKey::new("tab").with(1).starts_with(&prefix));
    }

    #[tokio::test]
    async fn test_get_set_delete() {
        let dir = tempfile::tempdir().unwrap();
        let kv = open_store(&dir).await;
        let key = KvKey::new("tab").with(1);

        assert!(kv.get::<serde_json::Value>(&key).await.unwrap().is_none());

        kv.set(&key, &serde_json::json!({"title": "a"})).await.unwrap();
        kv.set(&key, &serde_json::json!({"title": "b"})).await.unwrap();
        let value: serde_json::Value = kv.get(&key).await.unwrap().unwrap();
        assert_eq!(value["title"], "b");

        kv.delete(&key).await.unwrap();
        kv.delete(&key).await.unwrap();
        assert!(kv.get::<serde_json::Value>(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_prefix_in_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let kv = open_store(&dir).await;

        for id in [10i64, 2, 1] {
            kv.set(&KvKey::new("tab").with(id), &id).await.unwrap();
        }
        kv.set(&KvKey::new("youtube").with(1).with("x"), &"sync")
            .await
            .unwrap();

        let tabs: Vec<(KvKey, i64)> = kv.list(&KvKey::new("tab")).await.unwrap();
        let ids: Vec<i64> = tabs.into_iter().map(|(_, v)| v).collect();
        assert_eq!(ids, vec![1, 2, 10]);

        let one: Vec<(KvKey, i64)> = kv.list(&KvKey::new("tab").with(2)).await.unwrap();
        assert_eq!(one.len(), 1);
    }

    #[tokio::test]
    async fn test_increment() {
        let dir = tempfile::tempdir().unwrap();
        let kv = open_store(&dir).await;
        let key = KvKey::new("counter").with("tab");

        assert_eq!(kv.increment(&key).await.unwrap(), 1);
        assert_eq!(kv.increment(&key).await.unwrap(), 2);
        assert_eq!(kv.get::<i64>(&key).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let kv = open_store(&dir).await;
        let key = KvKey::new("counter").with("tab");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let kv = kv.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move { kv.increment(&key).await.unwrap() }));
        }

        let mut values = Vec::new();
        for handle in handles {
            values.push(handle.await.unwrap());
        }
        values.sort();
        assert_eq!(values, (1..=8).collect::<Vec<_>>());
    }
}
