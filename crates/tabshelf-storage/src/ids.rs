//! Tab ID allocation

use crate::kv::KvStore;
use crate::metadata::keys;
use crate::Result;
use async_trait::async_trait;
use tabshelf_core::TabId;

/// Hands out a fresh, never-reused tab ID per call
#[async_trait]
pub trait TabIdAllocator: Send + Sync {
    async fn next_tab_id(&self) -> Result<TabId>;
}

/// Counter kept at `("counter", "tab")` in the KV store. IDs already taken
/// by an existing tab record are skipped.
#[derive(Clone)]
pub struct KvTabIdAllocator {
    kv: KvStore,
}

impl KvTabIdAllocator {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }
}

#[async_trait]
impl TabIdAllocator for KvTabIdAllocator {
    async fn next_tab_id(&self) -> Result<TabId> {
        loop {
            let id = self.kv.increment(&keys::tab_counter()).await?;
            if self.kv.get_tab(id).await?.is_none() {
                return Ok(id);
            }
            tracing::debug!(tab_id = id, "Tab ID already in use, skipping");
        }
    }
}
