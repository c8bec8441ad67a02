//! Storage layer for tabshelf
//!
//! This crate provides:
//! - Relational blob storage for tab files, with lock-contention retries
//! - Filesystem tab storage as the alternative content backend
//! - A key-value store for tab and media sync metadata
//! - Database bootstrap and demo seeding

pub mod blob;
pub mod bootstrap;
pub mod content;
pub mod db;
pub mod error;
pub mod fs;
pub mod ids;
pub mod kv;
pub mod metadata;
pub mod retry;
pub mod users;

pub use blob::BlobStore;
pub use bootstrap::{Database, SeedOutcome, SeedStage};
pub use content::{TabContentStore, content_store_for};
pub use db::PoolSettings;
pub use error::{Result, StorageError};
pub use fs::FsTabStore;
pub use ids::{KvTabIdAllocator, TabIdAllocator};
pub use kv::{KeyPart, KvKey, KvStore};
pub use retry::RetryPolicy;
