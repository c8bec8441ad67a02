//! Database bootstrap and demo seeding
//!
//! Startup order:
//! 1. Check whether the database file exists.
//! 2. If not, copy the template image into place.
//! 3. Open the relational pool, ensure tables, check the recorded storage mode.
//! 4. Open the KV store and pick the content backend.
//! 5. On first initialization only, seed the demo tab.
//!
//! Handles are built once here and passed around by reference; nothing is
//! opened lazily later.

use crate::blob::BlobStore;
use crate::content::{TabContentStore, content_store_for};
use crate::db::{self, PoolSettings};
use crate::ids::{KvTabIdAllocator, TabIdAllocator};
use crate::kv::KvStore;
use crate::{Result, RetryPolicy, StorageError};
use serde::Serialize;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabshelf_config::{Config, StorageMode};
use tabshelf_core::{MediaSync, TabFile, TabId, TabMetadata};
use time::macros::datetime;
use uuid::Uuid;

/// Fixed values of the demonstration tab
pub mod demo {
    pub const TITLE: &str = "Hare no Hi ni (Bass Only)";
    pub const ARTIST: &str = "Reira Ushio";
    pub const FILENAME: &str = "tab.gp";
    pub const ORIGINAL_FILENAME: &str = "汐れいら-ハレの日に (Bass Only)-09-18-2025.gp";
    pub const VIDEO_ID: &str = "VuKSlOT__9s";
    pub const SIMPLE_SYNC_MS: f64 = 2900.0;
}

/// Step of demo seeding that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedStage {
    AllocateId,
    ReadAsset,
    WriteContent,
    WriteMetadata,
    WriteMediaSync,
}

impl fmt::Display for SeedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeedStage::AllocateId => "allocate_id",
            SeedStage::ReadAsset => "read_asset",
            SeedStage::WriteContent => "write_content",
            SeedStage::WriteMetadata => "write_metadata",
            SeedStage::WriteMediaSync => "write_media_sync",
        };
        f.write_str(name)
    }
}

/// Result of demo seeding. Seeding never fails startup; failures are
/// reported here instead. Steps completed before a failure are not undone.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SeedOutcome {
    Skipped,
    Succeeded {
        tab_id: TabId,
    },
    PartiallyFailed {
        tab_id: Option<TabId>,
        stage: SeedStage,
        reason: String,
    },
}

struct SeedFailure {
    tab_id: Option<TabId>,
    stage: SeedStage,
    error: StorageError,
}

impl SeedFailure {
    fn at(tab_id: Option<TabId>, stage: SeedStage) -> impl FnOnce(StorageError) -> Self {
        move |error| Self {
            tab_id,
            stage,
            error,
        }
    }
}

/// Process-wide storage handles
#[derive(Clone)]
pub struct Database {
    blob: BlobStore,
    kv: KvStore,
    content: Arc<dyn TabContentStore>,
    ids: Arc<dyn TabIdAllocator>,
    mode: StorageMode,
    is_init: bool,
    demo_tab_path: PathBuf,
    seed_outcome: SeedOutcome,
}

impl Database {
    /// Open (and on first run, initialize and seed) using the KV-backed ID allocator
    pub async fn open(config: &Config) -> Result<Self> {
        Self::open_with(config, None).await
    }

    /// Open with an injected ID allocator; `None` uses [`KvTabIdAllocator`]
    pub async fn open_with(
        config: &Config,
        allocator: Option<Arc<dyn TabIdAllocator>>,
    ) -> Result<Self> {
        let storage = &config.storage;
        let db_path = storage.database_path();
        let mode = storage.tab_storage;

        tokio::fs::create_dir_all(&storage.data_dir).await?;

        let mut is_init = !tokio::fs::try_exists(&db_path).await?;
        if is_init {
            let template = config.assets.template_database_path();
            is_init = materialize_template(&template, &db_path).await?;
        }

        let settings = PoolSettings::from_config(storage);
        let retry = RetryPolicy::from_config(&config.retry);

        let pool = db::connect(&db_path, settings).await?;
        db::ensure_schema(&pool).await?;
        check_mode(&pool, mode, is_init).await?;

        let kv = KvStore::open(&storage.kv_path(), settings).await?;
        let blob = BlobStore::new(pool, retry);
        let content = content_store_for(mode, &blob, &storage.tab_dir_path()).await?;
        let ids = allocator
            .unwrap_or_else(|| Arc::new(KvTabIdAllocator::new(kv.clone())) as Arc<dyn TabIdAllocator>);

        let mut database = Self {
            blob,
            kv,
            content,
            ids,
            mode,
            is_init,
            demo_tab_path: config.assets.demo_tab_path(),
            seed_outcome: SeedOutcome::Skipped,
        };

        if is_init {
            database.seed_outcome = database.add_demo_tab().await;
        }

        tracing::info!(
            path = %db_path.display(),
            mode = %mode,
            initialized = is_init,
            "Database ready"
        );
        Ok(database)
    }

    /// Whether this process created the database file
    pub fn is_init_db(&self) -> bool {
        self.is_init
    }

    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    pub fn is_blob_store_mode(&self) -> bool {
        self.mode.is_blob_store()
    }

    pub fn seed_outcome(&self) -> &SeedOutcome {
        &self.seed_outcome
    }

    pub fn blob(&self) -> &BlobStore {
        &self.blob
    }

    pub fn kv(&self) -> &KvStore {
        &self.kv
    }

    pub fn content(&self) -> &dyn TabContentStore {
        self.content.as_ref()
    }

    pub async fn has_user(&self) -> Result<bool> {
        crate::users::has_user(self.blob.pool()).await
    }

    /// Create the demo tab. Each call allocates a new ID, so calling it
    /// again creates a second demo tab.
    pub async fn add_demo_tab(&self) -> SeedOutcome {
        let outcome = match self.seed_demo_tab().await {
            Ok(tab_id) => SeedOutcome::Succeeded { tab_id },
            Err(failure) => SeedOutcome::PartiallyFailed {
                tab_id: failure.tab_id,
                stage: failure.stage,
                reason: failure.error.to_string(),
            },
        };

        match &outcome {
            SeedOutcome::Succeeded { tab_id } => {
                tracing::info!(tab_id, mode = %self.mode, "Added demo tab");
            }
            SeedOutcome::PartiallyFailed {
                tab_id,
                stage,
                reason,
            } => {
                tracing::warn!(?tab_id, %stage, reason = %reason, "Skip: failed to add demo tab");
            }
            SeedOutcome::Skipped => {}
        }
        outcome
    }

    async fn seed_demo_tab(&self) -> std::result::Result<TabId, SeedFailure> {
        let id = self
            .ids
            .next_tab_id()
            .await
            .map_err(SeedFailure::at(None, SeedStage::AllocateId))?;

        let data = read_asset(&self.demo_tab_path)
            .await
            .map_err(SeedFailure::at(Some(id), SeedStage::ReadAsset))?;

        self.content
            .write(id, demo::FILENAME, &data)
            .await
            .map_err(SeedFailure::at(Some(id), SeedStage::WriteContent))?;

        let tab = TabMetadata::new(
            id,
            demo::TITLE.to_string(),
            demo::ARTIST.to_string(),
            demo::FILENAME.to_string(),
        )
        .with_original_filename(demo::ORIGINAL_FILENAME.to_string())
        .with_created_at(datetime!(2025-09-26 07:29:56.450 UTC))
        .with_public(false);
        self.kv
            .put_tab(&tab)
            .await
            .map_err(SeedFailure::at(Some(id), SeedStage::WriteMetadata))?;

        self.kv
            .put_media_sync(id, &MediaSync::simple(demo::VIDEO_ID, demo::SIMPLE_SYNC_MS))
            .await
            .map_err(SeedFailure::at(Some(id), SeedStage::WriteMediaSync))?;

        Ok(id)
    }

    /// Create a tab: content first, then metadata, so metadata never points
    /// at content that was not written.
    pub async fn create_tab(
        &self,
        title: &str,
        artist: &str,
        original_filename: &str,
        data: &[u8],
    ) -> Result<TabMetadata> {
        let id = self.ids.next_tab_id().await?;
        let filename = stored_filename(original_filename);

        self.content.write(id, &filename, data).await?;

        let tab = TabMetadata::new(id, title.to_string(), artist.to_string(), filename)
            .with_original_filename(original_filename.to_string());
        self.kv.put_tab(&tab).await?;

        tracing::info!(tab_id = id, bytes = data.len(), "Created tab");
        Ok(tab)
    }

    /// Remove a tab: metadata first, then content. Returns whether a tab
    /// record existed. Content is removed even without a record, which
    /// clears orphans.
    pub async fn remove_tab(&self, tab_id: TabId) -> Result<bool> {
        let existed = self.kv.get_tab(tab_id).await?.is_some();
        self.kv.delete_tab_metadata(tab_id).await?;
        self.content.remove(tab_id).await?;

        tracing::info!(tab_id, existed, "Removed tab");
        Ok(existed)
    }

    /// Content of an existing tab, located through its metadata filename
    pub async fn read_tab_content(&self, tab_id: TabId) -> Result<Option<TabFile>> {
        match self.kv.get_tab(tab_id).await? {
            Some(tab) => self.content.read(tab_id, &tab.filename).await,
            None => Ok(None),
        }
    }
}

/// Name content is stored under: `tab.<ext>` keeping the original extension
fn stored_filename(original_filename: &str) -> String {
    match Path::new(original_filename)
        .extension()
        .and_then(|ext| ext.to_str())
    {
        Some(ext) if !ext.is_empty() => format!("tab.{}", ext.to_ascii_lowercase()),
        _ => "tab".to_string(),
    }
}

async fn read_asset(path: &Path) -> Result<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(data),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(StorageError::AssetMissing(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Copy the template next to `db_path` and link it into place. The link
/// fails instead of replacing a database another process already created, so
/// the live path never holds a partial image. Returns whether this call
/// created the database.
async fn materialize_template(template: &Path, db_path: &Path) -> Result<bool> {
    if !tokio::fs::try_exists(template).await? {
        return Err(StorageError::AssetMissing(template.to_path_buf()));
    }

    let file_name = db_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = db_path.with_file_name(format!(".{file_name}.tmp.{}", Uuid::new_v4()));

    let linked = copy_and_link(template, &temp_path, db_path).await;
    let _ = tokio::fs::remove_file(&temp_path).await;

    match linked {
        Ok(()) => {
            tracing::info!(
                template = %template.display(),
                path = %db_path.display(),
                "Initialized database from template"
            );
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            tracing::info!(path = %db_path.display(), "Database created by another process");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

async fn copy_and_link(template: &Path, temp_path: &Path, db_path: &Path) -> std::io::Result<()> {
    tokio::fs::copy(template, temp_path).await?;
    tokio::fs::File::open(temp_path).await?.sync_all().await?;
    tokio::fs::hard_link(temp_path, db_path).await
}

/// A fresh database records the configured mode. An existing one must match
/// what it recorded; one without a record adopts the configured mode.
async fn check_mode(pool: &sqlx::SqlitePool, configured: StorageMode, is_init: bool) -> Result<()> {
    if is_init {
        return db::record_mode(pool, configured).await;
    }
    match db::recorded_mode(pool).await? {
        Some(recorded) if recorded != configured => Err(StorageError::ModeMismatch {
            recorded,
            configured,
        }),
        Some(_) => Ok(()),
        None => {
            tracing::info!(mode = %configured, "Recording tab storage mode");
            db::record_mode(pool, configured).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_filename() {
        assert_eq!(stored_filename("Song (Bass).GP5"), "tab.gp5");
        assert_eq!(stored_filename("notes.pdf"), "tab.pdf");
        assert_eq!(stored_filename("README"), "tab");
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_materialize_template_copies_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.db");
        std::fs::write(&template, b"template image").unwrap();
        let data = dir.path().join("data");
        std::fs::create_dir(&data).unwrap();
        let db_path = data.join("config.db");

        assert!(materialize_template(&template, &db_path).await.unwrap());

        assert_eq!(std::fs::read(&db_path).unwrap(), b"template image");
        assert_eq!(entries(&data), vec!["config.db"]);
    }

    #[tokio::test]
    async fn test_materialize_template_never_replaces_existing_database() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.db");
        std::fs::write(&template, b"template image").unwrap();
        let data = dir.path().join("data");
        std::fs::create_dir(&data).unwrap();
        let db_path = data.join("config.db");
        std::fs::write(&db_path, b"live database").unwrap();

        assert!(!materialize_template(&template, &db_path).await.unwrap());

        assert_eq!(std::fs::read(&db_path).unwrap(), b"live database");
        assert_eq!(entries(&data), vec!["config.db"]);
    }

    #[test]
    fn test_seed_outcome_serialization() {
        let outcome = SeedOutcome::PartiallyFailed {
            tab_id: Some(3),
            stage: SeedStage::ReadAsset,
            reason: "Asset missing: extra/demo-tab.gp".into(),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "partially_failed");
        assert_eq!(value["stage"], "read_asset");
        assert_eq!(value["tab_id"], 3);

        let value = serde_json::to_value(SeedOutcome::Skipped).unwrap();
        assert_eq!(value["status"], "skipped");
    }
}
