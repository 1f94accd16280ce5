//! Configuration types and loading for studyvault.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::error::Result;
use crate::rebase::DEFAULT_DEBOUNCE_MINUTES;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the studyvault database.
    pub database: PathBuf,

    /// Usage tracking configuration.
    pub usage: UsageConfig,

    /// HTTP API configuration.
    pub api: ApiConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::APP_NAME);

        Self {
            database: data_dir.join("studyvault.db"),
            usage: UsageConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default config file.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_config_path())
    }

    /// Load configuration from a specific file, with `STUDYVAULT_*`
    /// environment variables layered on top (`__` separates nested keys, as
    /// in `STUDYVAULT_USAGE__DEBOUNCE_MINUTES`). A missing file is not an
    /// error.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config: Config = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(&crate::env_prefix())
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.expand_paths();
        Ok(config)
    }

    /// Get the default config file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::APP_NAME)
            .join("config.toml")
    }

    /// Save configuration to a specific file path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Ensure config exists at the given path, creating defaults if missing.
    pub fn ensure_at(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_path(path)
        } else {
            let mut config = Self::default();
            config.expand_paths();
            config.save_to_path(path)?;
            Self::load_from_path(path)
        }
    }

    /// Expand a path, replacing ~ with home directory.
    pub fn expand_path(path: &str) -> PathBuf {
        let expanded = shellexpand::full(path)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| path.to_string());
        PathBuf::from(expanded)
    }

    fn expand_paths(&mut self) {
        self.database = Self::expand_path(&self.database.to_string_lossy());
    }
}

/// File usage tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageConfig {
    /// Minutes during which repeated opens count as one access.
    pub debounce_minutes: i64,

    /// Default number of entries for recent/frequent listings.
    pub list_limit: i64,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            debounce_minutes: DEFAULT_DEBOUNCE_MINUTES,
            list_limit: 20,
        }
    }
}

impl UsageConfig {
    pub fn debounce(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.debounce_minutes.max(0))
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Port to listen on (loopback only).
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 3210 }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
