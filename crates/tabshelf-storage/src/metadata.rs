//! Typed access to tab and media sync records in the KV store

use crate::kv::{KvKey, KvStore};
use crate::Result;
use tabshelf_core::{MediaSync, TabId, TabMetadata};

pub const TAB_NAMESPACE: &str = "tab";
pub const YOUTUBE_NAMESPACE: &str = "youtube";
pub const COUNTER_NAMESPACE: &str = "counter";

/// Key constructors for every record kind
pub mod keys {
    use super::*;

    pub fn tab(id: TabId) -> KvKey {
        KvKey::new(TAB_NAMESPACE).with(id)
    }

    pub fn all_tabs() -> KvKey {
        KvKey::new(TAB_NAMESPACE)
    }

    pub fn youtube(tab_id: TabId, video_id: &str) -> KvKey {
        KvKey::new(YOUTUBE_NAMESPACE).with(tab_id).with(video_id)
    }

    pub fn youtube_for_tab(tab_id: TabId) -> KvKey {
        KvKey::new(YOUTUBE_NAMESPACE).with(tab_id)
    }

    pub fn tab_counter() -> KvKey {
        KvKey::new(COUNTER_NAMESPACE).with(TAB_NAMESPACE)
    }
}

impl KvStore {
    pub async fn put_tab(&self, tab: &TabMetadata) -> Result<()> {
        self.set(&keys::tab(tab.id), tab).await
    }

    pub async fn get_tab(&self, id: TabId) -> Result<Option<TabMetadata>> {
        self.get(&keys::tab(id)).await
    }

    pub async fn list_tabs(&self) -> Result<Vec<TabMetadata>> {
        let entries = self.list::<TabMetadata>(&keys::all_tabs()).await?;
        Ok(entries.into_iter().map(|(_, tab)| tab).collect())
    }

    pub async fn put_media_sync(&self, tab_id: TabId, sync: &MediaSync) -> Result<()> {
        self.set(&keys::youtube(tab_id, &sync.video_id), sync).await
    }

    pub async fn get_media_sync(&self, tab_id: TabId, video_id: &str) -> Result<Option<MediaSync>> {
        self.get(&keys::youtube(tab_id, video_id)).await
    }

    pub async fn list_media_sync(&self, tab_id: TabId) -> Result<Vec<MediaSync>> {
        let entries = self
            .list::<MediaSync>(&keys::youtube_for_tab(tab_id))
            .await?;
        Ok(entries.into_iter().map(|(_, sync)| sync).collect())
    }

    /// Remove a tab record together with all of its media sync records
    pub async fn delete_tab_metadata(&self, tab_id: TabId) -> Result<()> {
        let syncs = self
            .list::<serde_json::Value>(&keys::youtube_for_tab(tab_id))
            .await?;
        for (key, _) in syncs {
            self.delete(&key).await?;
        }
        self.delete(&keys::tab(tab_id)).await
    }
}
