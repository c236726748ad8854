//! Configuration loading and root folder resolution

use crate::models::TaskType;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "LABELY_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "labely.db";

/// TOML configuration file contents
///
/// Every section is optional; missing keys fall back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_addr: String,
    /// Defaults to `<root_folder>/datasets`
    pub datasets_dir: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub session: SessionConfig,
    pub rewards: RewardConfig,
    pub labeling: LabelingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_addr: "127.0.0.1:5730".to_string(),
            datasets_dir: None,
            logging: LoggingConfig::default(),
            session: SessionConfig::default(),
            rewards: RewardConfig::default(),
            labeling: LabelingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Longest accepted `session.idle_ttl_secs` (one year)
pub const MAX_IDLE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Session boundaries and idle reclamation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub task_limit: u32,
    pub idle_ttl_secs: u64,
    pub reap_interval_secs: u64,
    /// Upper bound on retrying a locked database write
    pub max_lock_wait_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            task_limit: 10,
            idle_ttl_secs: 30 * 60,
            reap_interval_secs: 60,
            max_lock_wait_ms: 5000,
        }
    }
}

impl SessionConfig {
    /// Idle TTL as a signed duration, capped at [`MAX_IDLE_TTL_SECS`]
    pub fn idle_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.idle_ttl_secs.min(MAX_IDLE_TTL_SECS) as i64)
    }
}

/// Reward per accepted label, in cents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub binary: i64,
    pub multi_class: i64,
    pub bounding_box: i64,
    pub segmentation: i64,
    pub text_sentiment: i64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            binary: 5,
            multi_class: 8,
            bounding_box: 6,
            segmentation: 7,
            text_sentiment: 4,
        }
    }
}

impl RewardConfig {
    pub fn reward_for(&self, task_type: TaskType) -> i64 {
        match task_type {
            TaskType::Binary => self.binary,
            TaskType::MultiClass => self.multi_class,
            TaskType::BoundingBox => self.bounding_box,
            TaskType::Segmentation => self.segmentation,
            TaskType::TextSentiment => self.text_sentiment,
        }
    }
}

/// Label shape thresholds and rating policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelingConfig {
    pub min_box_width: f64,
    pub min_box_height: f64,
    pub allow_neutral_sentiment: bool,
    pub default_elo: i64,
    pub elo_floor: i64,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            min_box_width: 20.0,
            min_box_height: 20.0,
            allow_neutral_sentiment: false,
            default_elo: 1500,
            elo_floor: 100,
        }
    }
}

/// Root folder resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    toml_config: Option<&TomlConfig>,
) -> PathBuf {
    if let Some(path) = cli_arg {
        debug!("Root folder from command line: {}", path);
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            debug!("Root folder from {}: {}", env_var_name, path);
            return PathBuf::from(path);
        }
    }

    if let Some(root_folder) = toml_config.and_then(|c| c.root_folder.as_ref()) {
        debug!("Root folder from TOML config: {}", root_folder.display());
        return root_folder.clone();
    }

    get_default_root_folder()
}

/// Locate the default configuration file for the platform, if one exists
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("labely").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/labely/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load a TOML config file
///
/// A path that does not exist yields the defaults; a file that exists but
/// fails to parse is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        info!("Config file {} not found, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    validate_config(&config)?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

fn validate_config(config: &TomlConfig) -> Result<()> {
    if config.session.task_limit == 0 {
        return Err(Error::Config("session.task_limit must be at least 1".to_string()));
    }
    if config.session.idle_ttl_secs > MAX_IDLE_TTL_SECS {
        return Err(Error::Config(format!(
            "session.idle_ttl_secs must not exceed {}",
            MAX_IDLE_TTL_SECS
        )));
    }
    if config.labeling.min_box_width <= 0.0 || config.labeling.min_box_height <= 0.0 {
        return Err(Error::Config(
            "labeling.min_box_width and min_box_height must be positive".to_string(),
        ));
    }
    if config.labeling.elo_floor > config.labeling.default_elo {
        return Err(Error::Config(
            "labeling.elo_floor must not exceed labeling.default_elo".to_string(),
        ));
    }
    Ok(())
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("labely"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/labely"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("labely"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/labely"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("labely"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\labely"))
    } else {
        PathBuf::from("./labely_data")
    }
}

/// Creates the root folder layout and hands out derived paths
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create the root folder (and parents) if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    /// Dataset directory, honoring an explicit override from config
    pub fn datasets_path(&self, config: &TomlConfig) -> PathBuf {
        match &config.datasets_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.root_folder.join(dir),
            None => self.root_folder.join("datasets"),
        }
    }
}
