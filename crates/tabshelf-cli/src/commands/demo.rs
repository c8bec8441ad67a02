use anyhow::Result;
use tabshelf_storage::{Database, SeedOutcome};

use crate::cli::DemoCommands;

pub async fn handle(cmd: DemoCommands, db: &Database) -> Result<()> {
    match cmd {
        DemoCommands::Add => add(db).await,
    }
}

async fn add(db: &Database) -> Result<()> {
    let outcome = db.add_demo_tab().await;
    match &outcome {
        SeedOutcome::Succeeded { tab_id } => println!("✓ Added demo tab {tab_id}"),
        other => anyhow::bail!("Demo tab {}", super::describe_seed(other)),
    }
    Ok(())
}
