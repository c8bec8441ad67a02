//! Filesystem tab storage: one directory per tab ID holding that tab's file

use crate::content::TabContentStore;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabshelf_config::StorageMode;
use tabshelf_core::tab::validate_filename;
use tabshelf_core::{TabFile, TabId};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

const TEMP_PREFIX: &str = ".tmp.";

pub struct FsTabStore {
    root: PathBuf,
    /// Per-tab write locks; a tab directory is only mutated under its lock
    locks: Mutex<HashMap<TabId, Arc<Mutex<()>>>>,
}

impl FsTabStore {
    /// Create the store, making the root directory if needed
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn tab_dir(&self, tab_id: TabId) -> PathBuf {
        self.root.join(tab_id.to_string())
    }

    async fn lock_tab(&self, tab_id: TabId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Drop locks nobody holds or waits on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(tab_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Write through a temp file and rename, then drop any other file left
    /// in the tab directory by an earlier write under a different name.
    async fn write_file(&self, tab_id: TabId, filename: &str, data: &[u8]) -> Result<()> {
        validate_filename(filename)?;
        let _guard = self.lock_tab(tab_id).await;

        let dir = self.tab_dir(tab_id);
        fs::create_dir_all(&dir).await?;

        let temp_path = dir.join(format!("{TEMP_PREFIX}{}", Uuid::new_v4()));
        let final_path = dir.join(filename);
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
        }
        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        // The new content is in place; leftovers only get logged
        if let Err(e) = self.remove_other_files(&dir, filename).await {
            tracing::warn!(tab_id, error = %e, "Failed to clean up tab directory");
        }

        tracing::debug!(tab_id, filename, bytes = data.len(), "Wrote tab file");
        Ok(())
    }

    /// Remove regular files other than `keep`, including temp files left by
    /// interrupted writes. Subdirectories are left alone.
    async fn remove_other_files(&self, dir: &Path, keep: &str) -> Result<()> {
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name() == keep || !entry.file_type().await?.is_file() {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn read_file(&self, tab_id: TabId, filename: &str) -> Result<Option<TabFile>> {
        validate_filename(filename)?;

        match fs::read(self.tab_dir(tab_id).join(filename)).await {
            Ok(data) => Ok(Some(TabFile::new(filename, data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_dir(&self, tab_id: TabId) -> Result<()> {
        let _guard = self.lock_tab(tab_id).await;
        match fs::remove_dir_all(self.tab_dir(tab_id)).await {
            Ok(()) => {
                tracing::debug!(tab_id, "Removed tab directory");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// IDs of all tab directories, ascending
    async fn list_ids(&self) -> Result<Vec<TabId>> {
        let mut ids = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(id) = entry.file_name().to_str().and_then(|n| n.parse().ok()) {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}

#[async_trait]
impl TabContentStore for FsTabStore {
    fn mode(&self) -> StorageMode {
        StorageMode::Filesystem
    }

    async fn write(&self, tab_id: TabId, filename: &str, data: &[u8]) -> Result<()> {
        self.write_file(tab_id, filename, data).await
    }

    async fn read(&self, tab_id: TabId, filename: &str) -> Result<Option<TabFile>> {
        self.read_file(tab_id, filename).await
    }

    async fn remove(&self, tab_id: TabId) -> Result<()> {
        self.remove_dir(tab_id).await
    }

    async fn tab_ids(&self) -> Result<Vec<TabId>> {
        self.list_ids().await
    }
}
