//! Configuration for stickerdepot.
//!
//! [`ConfigFile`] mirrors `~/.stickerdepot/config.ini` section by section.
//! Components consume the typed runtime objects derived from it:
//!
//! - [`DownloadConfig`] for the downloader, fetchers and concurrency gates
//! - [`ManagerConfig`] for the sticker manager and the resumable queue
//!
//! # Example
//!
//! ```
//! use stickerdepot::config::{DownloadConfig, ManagerConfig};
//!
//! let download = DownloadConfig::new().with_max_attempts(2);
//! let manager = ManagerConfig::new("/tmp/stickers").with_download(download);
//! assert_eq!(manager.download().max_attempts(), 2);
//! ```

mod defaults;
mod download;
mod file;
mod manager;
mod parser;
mod settings;
mod size;
mod writer;

pub use defaults::*;
pub use download::DownloadConfig;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use manager::ManagerConfig;
pub use settings::{
    CacheSettings, CdnSettings, ConfigFile, DownloadSettings, NotificationSettings,
    StorageSettings,
};
pub use size::{format_size, parse_size, SizeParseError};
