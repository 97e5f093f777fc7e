//! INI parsing: `Ini` → `ConfigFile`.
//!
//! The single place where INI key names are mapped to struct fields.

use ini::{Ini, Properties};
use std::path::PathBuf;
use std::str::FromStr;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;

/// Parse an `Ini` into a `ConfigFile`, overlaying values onto the defaults.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [cdn]
    if let Some(section) = ini.section(Some("cdn")) {
        if let Some(v) = section.get("base_url") {
            let v = v.trim();
            if url::Url::parse(v).is_err() {
                return Err(invalid("cdn", "base_url", v, "must be an absolute URL"));
            }
            config.cdn.base_url = v.to_string();
        }
        if let Some(v) = positive(section, "cdn", "timeout_secs")? {
            config.cdn.timeout_secs = v;
        }
    }

    // [download]
    if let Some(section) = ini.section(Some("download")) {
        let d = &mut config.download;
        if let Some(v) = positive(section, "download", "max_attempts")? {
            d.max_attempts = v;
        }
        if let Some(v) = number(section, "download", "backoff_base_ms")? {
            d.backoff_base_ms = v;
        }
        if let Some(v) = size(section, "download", "manifest_size_limit")? {
            d.manifest_size_limit = v;
        }
        if let Some(v) = size(section, "download", "sticker_size_limit")? {
            d.sticker_size_limit = v;
        }
        if let Some(v) = positive(section, "download", "pack_concurrency")? {
            d.pack_concurrency = v;
        }
        if let Some(v) = positive(section, "download", "sticker_concurrency")? {
            d.sticker_concurrency = v;
        }
        if let Some(v) = positive(section, "download", "queue_concurrency")? {
            d.queue_concurrency = v;
        }
    }

    // [cache]
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.cache.directory = expand_tilde(v);
            }
        }
        if let Some(v) = positive(section, "cache", "lru_capacity")? {
            config.cache.lru_capacity = v;
        }
    }

    // [storage]
    if let Some(section) = ini.section(Some("storage")) {
        if let Some(v) = section.get("database") {
            let v = v.trim();
            if !v.is_empty() {
                config.storage.database = expand_tilde(v);
            }
        }
    }

    // [notifications]
    if let Some(section) = ini.section(Some("notifications")) {
        if let Some(v) = number(section, "notifications", "debounce_ms")? {
            config.notifications.debounce_ms = v;
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn number<T: FromStr>(
    props: &Properties,
    section: &str,
    key: &str,
) -> Result<Option<T>, ConfigFileError> {
    props
        .get(key)
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| invalid(section, key, v, "must be a non-negative integer"))
        })
        .transpose()
}

fn positive<T: FromStr + Default + PartialEq>(
    props: &Properties,
    section: &str,
    key: &str,
) -> Result<Option<T>, ConfigFileError> {
    match number::<T>(props, section, key)? {
        Some(v) if v == T::default() => Err(invalid(
            section,
            key,
            props.get(key).unwrap_or_default(),
            "must be greater than zero",
        )),
        other => Ok(other),
    }
}

fn size(props: &Properties, section: &str, key: &str) -> Result<Option<u64>, ConfigFileError> {
    match props.get(key) {
        None => Ok(None),
        Some(v) => match parse_size(v) {
            Ok(0) | Err(_) => Err(invalid(
                section,
                key,
                v,
                "expected a positive size like '512KB' or '1MB'",
            )),
            Ok(bytes) => Ok(Some(bytes)),
        },
    }
}

/// Expand a leading `~` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
