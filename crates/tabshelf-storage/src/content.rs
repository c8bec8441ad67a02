//! Binary tab content, routed to exactly one backend per deployment

use crate::blob::BlobStore;
use crate::fs::FsTabStore;
use crate::{Result, StorageError};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tabshelf_config::StorageMode;
use tabshelf_core::tab::validate_filename;
use tabshelf_core::{TabFile, TabId};

/// Backend holding tab file bytes
#[async_trait]
pub trait TabContentStore: Send + Sync {
    /// Which storage mode this backend implements
    fn mode(&self) -> StorageMode;

    /// Create or replace the content for a tab
    async fn write(&self, tab_id: TabId, filename: &str, data: &[u8]) -> Result<()>;

    /// Read content stored under `filename`; `None` when absent
    async fn read(&self, tab_id: TabId, filename: &str) -> Result<Option<TabFile>>;

    /// Remove a tab's content; removing absent content is a no-op
    async fn remove(&self, tab_id: TabId) -> Result<()>;

    /// IDs that currently have content, ascending
    async fn tab_ids(&self) -> Result<Vec<TabId>>;
}

#[async_trait]
impl TabContentStore for BlobStore {
    fn mode(&self) -> StorageMode {
        StorageMode::Database
    }

    async fn write(&self, tab_id: TabId, filename: &str, data: &[u8]) -> Result<()> {
        validate_filename(filename)?;
        self.store_tab_file(tab_id, filename, data).await
    }

    async fn read(&self, tab_id: TabId, filename: &str) -> Result<Option<TabFile>> {
        match self.get_tab_file_row(tab_id).await? {
            Some(row) if row.filename != filename => Err(StorageError::FilenameMismatch {
                tab_id,
                expected: filename.to_string(),
                found: row.filename,
            }),
            row => Ok(row),
        }
    }

    async fn remove(&self, tab_id: TabId) -> Result<()> {
        self.delete_tab_file(tab_id).await
    }

    async fn tab_ids(&self) -> Result<Vec<TabId>> {
        BlobStore::tab_ids(self).await
    }
}

/// The single place that branches on the storage mode. The filesystem
/// backend's root is only created when that mode is selected.
pub async fn content_store_for(
    mode: StorageMode,
    blob: &BlobStore,
    tab_dir: &Path,
) -> Result<Arc<dyn TabContentStore>> {
    let store: Arc<dyn TabContentStore> = if mode.is_blob_store() {
        Arc::new(blob.clone())
    } else {
        Arc::new(FsTabStore::new(tab_dir).await?)
    };
    tracing::debug!(mode = %mode, "Selected tab content store");
    Ok(store)
}
