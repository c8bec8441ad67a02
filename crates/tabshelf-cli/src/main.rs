mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tabshelf_config::Config;
use tabshelf_storage::Database;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = Config::load_from(path)?;
            config.apply_overrides(|key| std::env::var(key).ok())?;
            config
        }
        None => Config::load()?,
    };
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = dir;
    }
    if let Some(mode) = cli.tab_storage {
        config.storage.tab_storage = mode;
    }
    tracing::debug!(
        data_dir = %config.storage.data_dir.display(),
        mode = %config.storage.tab_storage,
        "Loaded config"
    );

    // Open once: template copy, schema, mode check and first-run seeding
    let db = Database::open(&config).await?;

    match cli.command {
        cli::Commands::Status { json } => commands::status::handle(&db, &config, json).await,
        cli::Commands::Tab(tab_cmd) => commands::tab::handle(tab_cmd, &db).await,
        cli::Commands::Demo(demo_cmd) => commands::demo::handle(demo_cmd, &db).await,
    }
}
