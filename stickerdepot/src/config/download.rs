//! Download configuration.

use std::time::Duration;

use super::defaults::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_MANIFEST_SIZE_LIMIT, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_PACK_CONCURRENCY, DEFAULT_STICKER_CONCURRENCY, DEFAULT_STICKER_SIZE_LIMIT,
    DEFAULT_TIMEOUT_SECS,
};

/// Parameters for CDN downloads.
///
/// # Example
///
/// ```
/// use stickerdepot::config::DownloadConfig;
/// use std::time::Duration;
///
/// let config = DownloadConfig::default();
/// assert_eq!(config.max_attempts(), 4);
/// assert_eq!(config.pack_concurrency(), 3);
/// assert_eq!(config.sticker_concurrency(), 4);
///
/// let config = DownloadConfig::new()
///     .with_max_attempts(1)
///     .with_backoff_base(Duration::ZERO);
/// assert_eq!(config.backoff_for_attempt(1), Duration::ZERO);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadConfig {
    timeout_secs: u64,
    max_attempts: u32,
    backoff_base: Duration,
    manifest_size_limit: u64,
    sticker_size_limit: u64,
    pack_concurrency: usize,
    sticker_concurrency: usize,
}

impl DownloadConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the HTTP request timeout in seconds. Default: 30.
    pub fn with_timeout_secs(mut self, timeout: u64) -> Self {
        self.timeout_secs = timeout;
        self
    }

    /// Set the attempt ceiling, including the first attempt. Default: 4.
    ///
    /// Values below 1 are raised to 1.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the backoff base. Attempt `n` waits `base * 2^n` before retrying.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Set the manifest response size cap in bytes.
    pub fn with_manifest_size_limit(mut self, bytes: u64) -> Self {
        self.manifest_size_limit = bytes;
        self
    }

    /// Set the sticker response size cap in bytes.
    pub fn with_sticker_size_limit(mut self, bytes: u64) -> Self {
        self.sticker_size_limit = bytes;
        self
    }

    /// Set concurrent manifest downloads. Default: 3.
    pub fn with_pack_concurrency(mut self, limit: usize) -> Self {
        self.pack_concurrency = limit.max(1);
        self
    }

    /// Set concurrent sticker downloads. Default: 4.
    pub fn with_sticker_concurrency(mut self, limit: usize) -> Self {
        self.sticker_concurrency = limit.max(1);
        self
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff_base(&self) -> Duration {
        self.backoff_base
    }

    pub fn manifest_size_limit(&self) -> u64 {
        self.manifest_size_limit
    }

    pub fn sticker_size_limit(&self) -> u64 {
        self.sticker_size_limit
    }

    pub fn pack_concurrency(&self) -> usize {
        self.pack_concurrency
    }

    pub fn sticker_concurrency(&self) -> usize {
        self.sticker_concurrency
    }

    /// Delay after failed attempt `attempt` (1-based).
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(1u32 << attempt.min(16))
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
            manifest_size_limit: DEFAULT_MANIFEST_SIZE_LIMIT,
            sticker_size_limit: DEFAULT_STICKER_SIZE_LIMIT,
            pack_concurrency: DEFAULT_PACK_CONCURRENCY,
            sticker_concurrency: DEFAULT_STICKER_CONCURRENCY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DownloadConfig::default();
        assert_eq!(config.timeout_secs(), DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.max_attempts(), DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.manifest_size_limit(), 1024 * 1024);
        assert_eq!(config.pack_concurrency(), 3);
        assert_eq!(config.sticker_concurrency(), 4);
    }

    #[test]
    fn test_builder_chain() {
        let config = DownloadConfig::new()
            .with_timeout_secs(5)
            .with_max_attempts(2)
            .with_sticker_size_limit(10)
            .with_pack_concurrency(1);

        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.max_attempts(), 2);
        assert_eq!(config.sticker_size_limit(), 10);
        assert_eq!(config.pack_concurrency(), 1);
        assert_eq!(config.sticker_concurrency(), DEFAULT_STICKER_CONCURRENCY); // Unchanged
    }

    #[test]
    fn test_zero_limits_are_raised() {
        let config = DownloadConfig::new()
            .with_max_attempts(0)
            .with_sticker_concurrency(0);
        assert_eq!(config.max_attempts(), 1);
        assert_eq!(config.sticker_concurrency(), 1);
    }

    #[test]
    fn test_backoff_is_exponential() {
        let config = DownloadConfig::default();
        assert_eq!(config.backoff_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.backoff_for_attempt(2), Duration::from_millis(400));
        assert_eq!(config.backoff_for_attempt(3), Duration::from_millis(800));
    }
}
