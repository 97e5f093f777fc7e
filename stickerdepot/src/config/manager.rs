//! Sticker manager configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::defaults::{DEFAULT_DEBOUNCE_MS, DEFAULT_LRU_CAPACITY, DEFAULT_QUEUE_CONCURRENCY};
use super::download::DownloadConfig;

/// Parameters for `StickerManager` and `ResumableDownloadQueue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    cache_dir: PathBuf,
    download: DownloadConfig,
    lru_capacity: usize,
    debounce: Duration,
    queue_concurrency: usize,
}

impl ManagerConfig {
    /// Create a configuration rooted at `cache_dir`, other values default.
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            download: DownloadConfig::default(),
            lru_capacity: DEFAULT_LRU_CAPACITY,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            queue_concurrency: DEFAULT_QUEUE_CONCURRENCY,
        }
    }

    pub fn with_download(mut self, download: DownloadConfig) -> Self {
        self.download = download;
        self
    }

    pub fn with_lru_capacity(mut self, capacity: usize) -> Self {
        self.lru_capacity = capacity.max(1);
        self
    }

    /// Set the change notification debounce window. Zero disables
    /// coalescing.
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    pub fn with_queue_concurrency(mut self, limit: usize) -> Self {
        self.queue_concurrency = limit.max(1);
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Directory of installed sticker files.
    pub fn stickers_dir(&self) -> PathBuf {
        self.cache_dir.join("stickers")
    }

    /// Scratch directory for in-progress downloads.
    pub fn scratch_dir(&self) -> PathBuf {
        self.cache_dir.join("tmp")
    }

    pub fn download(&self) -> &DownloadConfig {
        &self.download
    }

    pub fn lru_capacity(&self) -> usize {
        self.lru_capacity
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn queue_concurrency(&self) -> usize {
        self.queue_concurrency
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directories_derive_from_cache_dir() {
        let config = ManagerConfig::new("/var/cache/sd");
        assert_eq!(config.stickers_dir(), PathBuf::from("/var/cache/sd/stickers"));
        assert_eq!(config.scratch_dir(), PathBuf::from("/var/cache/sd/tmp"));
    }

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::new("/x");
        assert_eq!(config.lru_capacity(), 256);
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert_eq!(config.queue_concurrency(), 4);
        assert_eq!(*config.download(), DownloadConfig::default());
    }
}
