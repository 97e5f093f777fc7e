//! Sticker pack installation and the public manager API.
//!
//! [`StickerManager`] ties the pieces together:
//!
//! ```text
//! install(pack) ──► store? ──miss──► PackManifestFetcher ──► upsert
//!                                                              │
//!                     cover first, then items ◄────────────────┘
//!                              │
//! fetch_sticker ──► ContentCache ──► installed file ──► coalesced download
//! ```
//!
//! Observers subscribe to debounced [`ChangeEvent`]s.

mod default_packs;
mod emoji;
mod error;
mod install;
mod manager;
mod notify;
mod recents;
mod reconcile;

pub use default_packs::{DefaultPack, DefaultPackRegistry};
pub use emoji::emoji_characters;
pub use error::StickerError;
pub use install::{ContentReport, InstallMode};
pub use manager::StickerManager;
pub use notify::{ChangeEvent, ChangeNotifier, Subscription};
pub use recents::MAX_RECENT_STICKERS;
pub use reconcile::{CleanupReport, RefreshReport};
