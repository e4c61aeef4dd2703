//! Configuration loading and management
//!
//! Handles parsing of `config.toml` in the data directory and resolving the
//! data directory itself.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;
use crate::query::{SortKey, StatusFilter, TaskFilter};
use crate::storage::{PREFERENCES_KEY, TASKS_KEY};

/// File name of the configuration inside the data directory
pub const CONFIG_FILE: &str = "config.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Storage slot configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Initial view criteria for `list`
    #[serde(default)]
    pub view: ViewConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Slot key of the task snapshot
    #[serde(default = "default_tasks_key")]
    pub tasks_key: String,

    /// Slot key of the UI preferences
    #[serde(default = "default_preferences_key")]
    pub preferences_key: String,

    /// How long to wait for another process holding a slot lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_tasks_key() -> String {
    TASKS_KEY.to_string()
}

fn default_preferences_key() -> String {
    PREFERENCES_KEY.to_string()
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            tasks_key: default_tasks_key(),
            preferences_key: default_preferences_key(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Default sort key
    #[serde(default)]
    pub sort_by: SortKey,

    /// Default status filter
    #[serde(default)]
    pub status: StatusFilter,
}

impl ViewConfig {
    pub fn filter(&self) -> TaskFilter {
        TaskFilter::with_status(self.status)
    }
}

impl Config {
    /// Load configuration from a `config.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|err| Error::InvalidConfig(format!("{}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a data directory, or return defaults when
    /// no file exists
    pub fn load_from_dir(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.storage.validate()
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<()> {
        validate_key(&self.tasks_key, "storage.tasks_key")?;
        validate_key(&self.preferences_key, "storage.preferences_key")?;

        let keys: HashSet<&str> = [self.tasks_key.as_str(), self.preferences_key.as_str()]
            .into_iter()
            .collect();
        if keys.len() != 2 {
            return Err(Error::InvalidConfig(
                "storage.tasks_key and storage.preferences_key must differ".to_string(),
            ));
        }

        if self.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "storage.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_key(key: &str, field: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidConfig(format!("{field} cannot be empty")));
    }
    if !key
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
    {
        return Err(Error::InvalidConfig(format!(
            "{field} '{key}' may only contain letters, digits, '_' and '-'"
        )));
    }
    Ok(())
}

/// Pick the data directory: an explicit path wins, otherwise the platform
/// data directory for taskmaster.
pub fn resolve_data_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    ProjectDirs::from("", "", "taskmaster")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(Error::DataDirUnavailable)
}
