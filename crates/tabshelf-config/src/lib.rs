use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Configuration for tabshelf
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub assets: AssetsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root for the database files and the tab directory
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_database_file")]
    pub database_file: String,

    #[serde(default = "default_kv_file")]
    pub kv_file: String,

    /// Tab directory for filesystem mode, relative to `data_dir` unless absolute
    #[serde(default = "default_tab_dir")]
    pub tab_dir: PathBuf,

    #[serde(default)]
    pub tab_storage: StorageMode,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long SQLite itself waits for a write lock before reporting busy
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Installation root; resolved from the executable location when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_dir: Option<PathBuf>,

    #[serde(default = "default_template_database")]
    pub template_database: PathBuf,

    #[serde(default = "default_demo_tab")]
    pub demo_tab: PathBuf,
}

/// Where binary tab content lives. Deployment-wide and fixed for the
/// lifetime of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// `tab_file` table in the relational database
    #[default]
    #[serde(alias = "db")]
    Database,
    /// One directory per tab under the tab directory
    #[serde(alias = "fs")]
    Filesystem,
}

impl StorageMode {
    pub fn is_blob_store(self) -> bool {
        matches!(self, StorageMode::Database)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StorageMode::Database => "database",
            StorageMode::Filesystem => "filesystem",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "db" | "database" => Ok(StorageMode::Database),
            "fs" | "filesystem" => Ok(StorageMode::Filesystem),
            other => anyhow::bail!("unknown tab storage mode: {other}"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            retry: RetryConfig::default(),
            assets: AssetsConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            kv_file: default_kv_file(),
            tab_dir: default_tab_dir(),
            tab_storage: StorageMode::default(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            source_dir: None,
            template_database: default_template_database(),
            demo_tab: default_demo_tab(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    if let Some(dirs) = project_dirs() {
        dirs.data_dir().to_path_buf()
    } else {
        PathBuf::from(".tabshelf")
    }
}

fn default_database_file() -> String {
    "config.db".to_string()
}

fn default_kv_file() -> String {
    "kv.db".to_string()
}

fn default_tab_dir() -> PathBuf {
    PathBuf::from("tabs")
}

fn default_max_connections() -> u32 {
    4
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    50
}

fn default_template_database() -> PathBuf {
    PathBuf::from("extra/config-template.db")
}

fn default_demo_tab() -> PathBuf {
    PathBuf::from("extra/demo-tab.gp")
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "tabshelf", "tabshelf")
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn kv_path(&self) -> PathBuf {
        self.data_dir.join(&self.kv_file)
    }

    pub fn tab_dir_path(&self) -> PathBuf {
        self.data_dir.join(&self.tab_dir)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl AssetsConfig {
    /// Installation root the asset paths are relative to
    pub fn source_dir(&self) -> PathBuf {
        if let Some(dir) = &self.source_dir {
            return dir.clone();
        }
        if let Ok(exe) = std::env::current_exe()
            && let Some(parent) = exe.parent()
            && parent.join("extra").is_dir()
        {
            return parent.to_path_buf();
        }
        PathBuf::from(".")
    }

    pub fn template_database_path(&self) -> PathBuf {
        resolve(&self.source_dir(), &self.template_database)
    }

    pub fn demo_tab_path(&self) -> PathBuf {
        resolve(&self.source_dir(), &self.demo_tab)
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

impl Config {
    /// Load config from default location or create default if not found,
    /// then apply environment overrides
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path();
        let mut config = Self::load_from(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load config from a specific file, writing the defaults there if it is missing
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let content = toml::to_string_pretty(&config)?;
            std::fs::write(path, content)?;
            tracing::debug!(path = %path.display(), "Wrote default config");
            Ok(config)
        }
    }

    /// Apply `TABSHELF_*` overrides using the given variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("TABSHELF_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(mode) = lookup("TABSHELF_TAB_STORAGE") {
            self.storage.tab_storage = mode.parse()?;
        }
        if let Some(dir) = lookup("TABSHELF_SOURCE_DIR") {
            self.assets.source_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    /// Get config file path
    pub fn config_path() -> PathBuf {
        if let Some(dirs) = project_dirs() {
            dirs.config_dir().join("config.toml")
        } else {
            PathBuf::from(".tabshelf/config.toml")
        }
    }
}
