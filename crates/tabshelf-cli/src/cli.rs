use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tabshelf_config::StorageMode;

#[derive(Parser)]
#[command(name = "tabshelf")]
#[command(about = "Tab storage for a self-hosted tab library", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Override where tab content is stored
    #[arg(long, global = true)]
    pub tab_storage: Option<StorageMode>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show storage state: init flag, mode, users, seeding result
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage tabs
    #[command(subcommand)]
    Tab(TabCommands),

    /// Demo tab helpers
    #[command(subcommand)]
    Demo(DemoCommands),
}

#[derive(Subcommand)]
pub enum TabCommands {
    /// List all tabs
    List,

    /// Show tab metadata and media sync records
    Show {
        /// Tab ID
        id: i64,
    },

    /// Store a file as a new tab
    Put {
        /// File to store
        file: PathBuf,

        /// Tab title (default: file stem)
        #[arg(long)]
        title: Option<String>,

        #[arg(long, default_value = "")]
        artist: String,
    },

    /// Read tab content; writes it to --out or prints its digest
    Get {
        /// Tab ID
        id: i64,

        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Attach a YouTube video with a fixed offset
    Sync {
        /// Tab ID
        id: i64,

        /// YouTube video ID
        video_id: String,

        /// Offset in milliseconds
        #[arg(long, default_value = "0")]
        offset: f64,
    },

    /// Remove a tab and its content
    Rm {
        /// Tab ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum DemoCommands {
    /// Add another copy of the demo tab
    Add,
}
