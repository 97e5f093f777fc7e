//! Settings structs, one per `[section]` of config.ini.

use std::path::PathBuf;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    /// CDN settings
    pub cdn: CdnSettings,
    /// Download settings
    pub download: DownloadSettings,
    /// Cache settings
    pub cache: CacheSettings,
    /// Storage settings
    pub storage: StorageSettings,
    /// Notification settings
    pub notifications: NotificationSettings,
}

/// `[cdn]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdnSettings {
    /// Base URL that CDN resource paths are joined onto
    pub base_url: String,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

/// `[download]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    /// Bytes
    pub manifest_size_limit: u64,
    /// Bytes
    pub sticker_size_limit: u64,
    pub pack_concurrency: usize,
    pub sticker_concurrency: usize,
    pub queue_concurrency: usize,
}

/// `[cache]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Directory holding installed sticker files and scratch downloads
    pub directory: PathBuf,
    /// Entries in the sticker file LRU
    pub lru_capacity: usize,
}

/// `[storage]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    /// SQLite database file
    pub database: PathBuf,
}

/// `[notifications]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSettings {
    pub debounce_ms: u64,
}
