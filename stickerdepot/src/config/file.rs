//! Configuration file handling for ~/.stickerdepot/config.ini.

use ini::Ini;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::download::DownloadConfig;
use super::manager::ManagerConfig;
use super::settings::ConfigFile;
use std::time::Duration;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path.
    ///
    /// A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    /// Save configuration to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Render as config.ini text.
    pub fn to_ini_string(&self) -> String {
        super::writer::to_config_string(self)
    }

    /// Runtime download configuration.
    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig::new()
            .with_timeout_secs(self.cdn.timeout_secs)
            .with_max_attempts(self.download.max_attempts)
            .with_backoff_base(Duration::from_millis(self.download.backoff_base_ms))
            .with_manifest_size_limit(self.download.manifest_size_limit)
            .with_sticker_size_limit(self.download.sticker_size_limit)
            .with_pack_concurrency(self.download.pack_concurrency)
            .with_sticker_concurrency(self.download.sticker_concurrency)
    }

    /// Runtime sticker manager configuration.
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig::new(&self.cache.directory)
            .with_download(self.download_config())
            .with_lru_capacity(self.cache.lru_capacity)
            .with_debounce(Duration::from_millis(self.notifications.debounce_ms))
            .with_queue_concurrency(self.download.queue_concurrency)
    }
}

/// Path to the config directory (~/.stickerdepot).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".stickerdepot")
}

/// Path to the config file (~/.stickerdepot/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();

        assert_eq!(config.cdn.base_url, DEFAULT_CDN_BASE_URL);
        assert_eq!(config.download.max_attempts, 4);
        assert_eq!(config.download.pack_concurrency, 3);
        assert_eq!(config.download.sticker_concurrency, 4);
        assert_eq!(config.cache.lru_capacity, 256);
        assert_eq!(config.notifications.debounce_ms, 500);
        assert!(config.cache.directory.ends_with("cache"));
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp_dir.path().join("missing.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.cdn.base_url = "http://localhost:8080".to_string();
        config.download.sticker_concurrency = 8;
        config.download.manifest_size_limit = 512 * 1024;
        config.cache.directory = temp_dir.path().join("cache");
        config.notifications.debounce_ms = 50;
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_runtime_conversions() {
        let mut config = ConfigFile::default();
        config.download.max_attempts = 2;
        config.download.queue_concurrency = 6;
        config.notifications.debounce_ms = 10;

        let manager = config.manager_config();
        assert_eq!(manager.download().max_attempts(), 2);
        assert_eq!(manager.queue_concurrency(), 6);
        assert_eq!(manager.debounce(), Duration::from_millis(10));
        assert_eq!(manager.cache_dir(), config.cache.directory.as_path());
    }
}
