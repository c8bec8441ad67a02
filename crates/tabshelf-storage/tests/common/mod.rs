//! Shared fixtures: a temp install root with a template database and demo
//! asset, plus a config pointing the data directory at a temp location.

#![allow(dead_code)]

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::PathBuf;
use tabshelf_config::{Config, StorageMode};
use tempfile::TempDir;

pub const DEMO_BYTES: &[u8] = b"BCFZ\x00\x01demo guitar pro payload\xff\xfe";

pub struct TestEnv {
    pub dir: TempDir,
    pub config: Config,
}

impl TestEnv {
    pub async fn new(mode: StorageMode) -> Self {
        Self::with_users(mode, &[]).await
    }

    pub async fn with_users(mode: StorageMode, users: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let install = dir.path().join("install");
        std::fs::create_dir_all(install.join("extra")).unwrap();

        write_template(&install.join("extra/config-template.db"), users).await;
        std::fs::write(install.join("extra/demo-tab.gp"), DEMO_BYTES).unwrap();

        let mut config = Config::default();
        config.storage.data_dir = dir.path().join("data");
        config.storage.tab_storage = mode;
        config.assets.source_dir = Some(install);

        Self { dir, config }
    }

    pub fn database_path(&self) -> PathBuf {
        self.config.storage.database_path()
    }

    pub fn tab_dir(&self) -> PathBuf {
        self.config.storage.tab_dir_path()
    }

    pub fn demo_asset(&self) -> PathBuf {
        self.config.assets.demo_tab_path()
    }
}

/// Build a template image the way a release would ship it: rollback
/// journal, `user` table present, no tab storage tables yet.
async fn write_template(path: &std::path::Path, users: &[&str]) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    sqlx::query("CREATE TABLE user (id INTEGER PRIMARY KEY, username TEXT NOT NULL UNIQUE)")
        .execute(&pool)
        .await
        .unwrap();
    for name in users {
        sqlx::query("INSERT INTO user (username) VALUES (?)")
            .bind(*name)
            .execute(&pool)
            .await
            .unwrap();
    }

    pool.close().await;
}
