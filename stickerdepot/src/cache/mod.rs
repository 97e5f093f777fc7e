//! In-memory caches shared by the download paths.
//!
//! - [`ContentCache`]: bounded LRU from sticker key to a local file.
//! - [`CorruptKeyTracker`]: resources that failed an integrity check.
//! - [`MissingPackSet`]: packs the CDN reported as permanently absent.

mod content;
mod trackers;

pub use content::ContentCache;
pub use trackers::{CorruptKeyTracker, MissingPackSet};
