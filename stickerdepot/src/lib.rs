//! StickerDepot - encrypted sticker pack downloads and install tracking
//!
//! This library fetches sticker packs from a content-delivery network,
//! decrypts and caches their content, and tracks which packs and stickers
//! are installed in a transactional store.
//!
//! # High-Level API
//!
//! [`stickers::StickerManager`] is the entry point:
//!
//! ```ignore
//! use std::sync::Arc;
//! use stickerdepot::cdn::ReqwestTransport;
//! use stickerdepot::config::ConfigFile;
//! use stickerdepot::identity::ShareLink;
//! use stickerdepot::stickers::StickerManager;
//! use stickerdepot::store::SqliteStore;
//!
//! let config = ConfigFile::load()?;
//! let store = Arc::new(SqliteStore::open(&config.storage.database)?);
//! let transport = ReqwestTransport::new(&config.cdn.base_url, config.download_config().timeout())?;
//! let manager = StickerManager::new(store, transport, config.manager_config());
//!
//! let link = ShareLink::parse("https://signal.art/addstickers/#pack_id=...&pack_key=...")?;
//! manager.install(link.identity()).await?;
//! ```

pub mod cache;
pub mod cdn;
pub mod config;
pub mod crypto;
pub mod gate;
pub mod identity;
pub mod logging;
pub mod manifest;
pub mod queue;
pub mod stickers;
pub mod store;
pub mod time;

/// Version of the StickerDepot library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
