//! Common types and utilities shared across CLI commands.

use std::path::Path;
use std::sync::Arc;
use stickerdepot::cdn::ReqwestTransport;
use stickerdepot::config::{config_file_path, ConfigFile};
use stickerdepot::identity::{PackIdentity, ShareLink};
use stickerdepot::manifest::PackManifest;
use stickerdepot::stickers::StickerManager;
use stickerdepot::store::SqliteStore;
use tracing::info;

use crate::error::CliError;

/// Manager backed by the on-disk database and the HTTP CDN client.
pub type Manager = StickerManager<SqliteStore, ReqwestTransport>;

/// Load configuration from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_file_path);
    Ok(ConfigFile::load_from(&path)?)
}

/// Open the database and connect the manager to the configured CDN.
pub fn build_manager(config: &ConfigFile) -> Result<Arc<Manager>, CliError> {
    let store = SqliteStore::open(&config.storage.database)?;
    let download = config.download_config();
    let transport = ReqwestTransport::new(&config.cdn.base_url, download.timeout())?;

    info!(
        database = %config.storage.database.display(),
        cdn = %config.cdn.base_url,
        "Sticker manager ready"
    );

    Ok(Arc::new(StickerManager::new(
        Arc::new(store),
        transport,
        config.manager_config(),
    )))
}

/// Parse a share link argument into a pack identity.
pub fn parse_link(input: &str) -> Result<PackIdentity, CliError> {
    ShareLink::parse(input)
        .map(ShareLink::into_identity)
        .map_err(|error| CliError::Link {
            input: input.to_string(),
            error,
        })
}

/// One-line description of a pack for listings.
pub fn describe_pack(manifest: &PackManifest) -> String {
    let title = manifest.title.as_deref().unwrap_or("(untitled)");
    let status = if manifest.is_installed {
        "installed"
    } else {
        "available"
    };
    match manifest.author.as_deref() {
        Some(author) => format!(
            "{}  {} by {}  [{}, {} stickers]",
            manifest.identity.pack_id_hex(),
            title,
            author,
            status,
            manifest.items.len()
        ),
        None => format!(
            "{}  {}  [{}, {} stickers]",
            manifest.identity.pack_id_hex(),
            title,
            status,
            manifest.items.len()
        ),
    }
}
