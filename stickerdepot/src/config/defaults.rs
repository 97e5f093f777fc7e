//! Default values for every configuration key, and `ConfigFile::default()`.

use std::path::PathBuf;

use super::file::config_directory;
use super::settings::*;

/// Default CDN base URL.
pub const DEFAULT_CDN_BASE_URL: &str = "https://cdn-ca.signal.org";

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Attempts per download, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Base of the exponential backoff between attempts, in milliseconds.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 100;

/// Largest accepted manifest response.
pub const DEFAULT_MANIFEST_SIZE_LIMIT: u64 = 1024 * 1024;

/// Largest accepted sticker response.
pub const DEFAULT_STICKER_SIZE_LIMIT: u64 = 1024 * 1024;

/// Concurrent pack manifest downloads.
pub const DEFAULT_PACK_CONCURRENCY: usize = 3;

/// Concurrent sticker downloads.
pub const DEFAULT_STICKER_CONCURRENCY: usize = 4;

/// Pending pack downloads processed at once by the resumable queue.
pub const DEFAULT_QUEUE_CONCURRENCY: usize = 4;

/// Entries in the sticker file LRU.
pub const DEFAULT_LRU_CAPACITY: usize = 256;

/// Change notification debounce window in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Default cache directory (~/.stickerdepot/cache).
pub fn default_cache_dir() -> PathBuf {
    config_directory().join("cache")
}

/// Default database path (~/.stickerdepot/stickers.db).
pub fn default_database_path() -> PathBuf {
    config_directory().join("stickers.db")
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            cdn: CdnSettings {
                base_url: DEFAULT_CDN_BASE_URL.to_string(),
                timeout_secs: DEFAULT_TIMEOUT_SECS,
            },
            download: DownloadSettings {
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
                manifest_size_limit: DEFAULT_MANIFEST_SIZE_LIMIT,
                sticker_size_limit: DEFAULT_STICKER_SIZE_LIMIT,
                pack_concurrency: DEFAULT_PACK_CONCURRENCY,
                sticker_concurrency: DEFAULT_STICKER_CONCURRENCY,
                queue_concurrency: DEFAULT_QUEUE_CONCURRENCY,
            },
            cache: CacheSettings {
                directory: default_cache_dir(),
                lru_capacity: DEFAULT_LRU_CAPACITY,
            },
            storage: StorageSettings {
                database: default_database_path(),
            },
            notifications: NotificationSettings {
                debounce_ms: DEFAULT_DEBOUNCE_MS,
            },
        }
    }
}
