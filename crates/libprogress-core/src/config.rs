use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProgressError;
use crate::pagination::DEFAULT_PAGE_LIMIT;

/// Default interval between two polls of a tracked event
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Name of the config file inside the data directory
pub const CONFIG_FILE: &str = "config.toml";

/// Daemon configuration stored in `<data_dir>/config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Where project mirrors are cloned. Defaults to `<data_dir>/repos`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repos_dir: Option<PathBuf>,
    /// Key required to create events. Event creation is refused while unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_key: Option<String>,
    /// Seconds between two ticks of a tracking task
    pub poll_interval_secs: u64,
    /// Default page size for commit listings
    pub page_limit: u32,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            repos_dir: None,
            auth_key: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl ProgressConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Mirror directory, resolved against the data directory
    pub fn repos_dir(&self, data_dir: &Path) -> PathBuf {
        match &self.repos_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => data_dir.join(dir),
            None => data_dir.join("repos"),
        }
    }
}

/// Sled database path inside the data directory
pub fn store_path(data_dir: &Path) -> PathBuf {
    data_dir.join("db")
}

/// Load config from `<data_dir>/config.toml`
pub fn load_config(data_dir: &Path) -> Result<Option<ProgressConfig>, ProgressError> {
    let config_path = data_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&config_path)?;
    let config: ProgressConfig = toml::from_str(&content)?;
    Ok(Some(config))
}

/// Save config to `<data_dir>/config.toml`
pub fn save_config(data_dir: &Path, config: &ProgressConfig) -> Result<(), ProgressError> {
    std::fs::create_dir_all(data_dir)?;
    let content = toml::to_string_pretty(config)?;
    std::fs::write(data_dir.join(CONFIG_FILE), content)?;
    Ok(())
}
