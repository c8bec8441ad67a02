use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tabshelf_core::{MediaSync, TabId};
use tabshelf_storage::Database;
use time::format_description::well_known::Rfc3339;

use crate::cli::TabCommands;

pub async fn handle(cmd: TabCommands, db: &Database) -> Result<()> {
    match cmd {
        TabCommands::List => list(db).await,
        TabCommands::Show { id } => show(db, id).await,
        TabCommands::Put {
            file,
            title,
            artist,
        } => put(db, file, title, artist).await,
        TabCommands::Get { id, out } => get(db, id, out).await,
        TabCommands::Sync {
            id,
            video_id,
            offset,
        } => sync(db, id, video_id, offset).await,
        TabCommands::Rm { id } => remove(db, id).await,
    }
}

async fn list(db: &Database) -> Result<()> {
    let tabs = db.kv().list_tabs().await?;

    if tabs.is_empty() {
        println!("No tabs found.");
        return Ok(());
    }

    println!("Tabs:");
    for tab in tabs {
        let artist = if tab.artist.is_empty() { "-" } else { &tab.artist };
        println!("  [{}] {} / {}", tab.id, tab.title, artist);
    }

    Ok(())
}

async fn show(db: &Database, id: TabId) -> Result<()> {
    let tab = db
        .kv()
        .get_tab(id)
        .await?
        .with_context(|| format!("Tab not found: {id}"))?;

    println!("Tab: {}", tab.title);
    println!("  ID: {}", tab.id);
    println!("  Artist: {}", tab.artist);
    println!("  Stored as: {}", tab.filename);
    println!("  Original file: {}", tab.original_filename);
    if let Some(format) = tab.format_key() {
        println!("  Format: {format}");
    }
    println!("  Created: {}", tab.created_at.format(&Rfc3339)?);
    println!("  Public: {}", tab.public);

    let syncs = db.kv().list_media_sync(id).await?;
    if syncs.is_empty() {
        println!("\nNo media sync.");
    } else {
        println!("\nMedia sync ({}):", syncs.len());
        for sync in syncs {
            println!(
                "  youtube:{} {:?} offset {}ms",
                sync.video_id, sync.sync_method, sync.simple_sync
            );
        }
    }

    Ok(())
}

async fn put(db: &Database, file: PathBuf, title: Option<String>, artist: String) -> Result<()> {
    let data = tokio::fs::read(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let original_filename = file
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Not a file name: {}", file.display()))?;
    let title = title.unwrap_or_else(|| file_stem(&file));
    tracing::debug!(path = %file.display(), bytes = data.len(), "Read tab file");

    let tab = db
        .create_tab(&title, &artist, original_filename, &data)
        .await?;

    println!("✓ Stored tab: {}", tab.title);
    println!("  ID: {}", tab.id);
    println!("  Stored as: {} ({} bytes, {})", tab.filename, data.len(), db.mode());

    Ok(())
}

async fn get(db: &Database, id: TabId, out: Option<PathBuf>) -> Result<()> {
    let file = db
        .read_tab_content(id)
        .await?
        .with_context(|| format!("No content for tab {id}"))?;

    match out {
        Some(path) => {
            tokio::fs::write(&path, &file.data)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✓ Wrote {} bytes to {}", file.data.len(), path.display());
        }
        None => {
            let digest = blake3::hash(&file.data);
            tracing::debug!(tab_id = id, filename = %file.filename, "Hashed tab content");
            println!("{}  {} ({} bytes)", digest.to_hex(), file.filename, file.data.len());
        }
    }

    Ok(())
}

async fn sync(db: &Database, id: TabId, video_id: String, offset: f64) -> Result<()> {
    if db.kv().get_tab(id).await?.is_none() {
        anyhow::bail!("Tab not found: {id}");
    }
    db.kv()
        .put_media_sync(id, &MediaSync::simple(video_id.clone(), offset))
        .await?;

    println!("✓ Synced tab {id} to youtube:{video_id} at {offset}ms");
    Ok(())
}

async fn remove(db: &Database, id: TabId) -> Result<()> {
    if db.remove_tab(id).await? {
        println!("✓ Removed tab {id}");
    } else {
        println!("No tab {id}; cleared any leftover content.");
    }
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string())
}
