//! INI serialization: `ConfigFile` → commented config.ini text.

use std::path::Path;

use super::settings::ConfigFile;
use super::size::format_size;

/// Render a `ConfigFile` as a commented INI string.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[cdn]
; Base URL of the sticker CDN
base_url = {}
; HTTP request timeout in seconds
timeout_secs = {}

[download]
; Attempts per download, including the first (transient failures only)
max_attempts = {}
; Base of the exponential backoff between attempts, in milliseconds
backoff_base_ms = {}
; Largest accepted manifest and sticker responses (KB, MB suffixes)
manifest_size_limit = {}
sticker_size_limit = {}
; Concurrent downloads
pack_concurrency = {}
sticker_concurrency = {}
; Pending pack downloads processed at once by the resumable queue
queue_concurrency = {}

[cache]
; Installed sticker files live in <directory>/stickers/
directory = {}
; Entries in the in-memory sticker file cache
lru_capacity = {}

[storage]
; SQLite database holding packs, installed stickers and pending downloads
database = {}

[notifications]
; Change notifications within this window collapse (first and last fire)
debounce_ms = {}
"#,
        config.cdn.base_url,
        config.cdn.timeout_secs,
        config.download.max_attempts,
        config.download.backoff_base_ms,
        format_size(config.download.manifest_size_limit),
        format_size(config.download.sticker_size_limit),
        config.download.pack_concurrency,
        config.download.sticker_concurrency,
        config.download.queue_concurrency,
        path_to_string(&config.cache.directory),
        config.cache.lru_capacity,
        path_to_string(&config.storage.database),
        config.notifications.debounce_ms,
    )
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_every_section() {
        let text = to_config_string(&ConfigFile::default());
        for section in ["[cdn]", "[download]", "[cache]", "[storage]", "[notifications]"] {
            assert!(text.contains(section), "missing {section}");
        }
        assert!(text.contains("manifest_size_limit = 1MB"));
        assert!(text.contains("base_url = https://cdn-ca.signal.org"));
    }
}
