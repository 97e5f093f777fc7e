//! Durable install state.
//!
//! The sticker manager only talks to storage through [`StickerStore`]
//! transactions. Two backends are provided:
//!
//! - [`MemoryStore`], an in-process store for tests and ephemeral use
//! - [`SqliteStore`], a WAL-mode SQLite database that survives restarts
//!
//! A write transaction commits only when its closure returns `Ok`. Hooks
//! registered with [`WriteTransaction::after_commit`] run after a
//! successful commit, outside any storage lock.

mod error;
mod memory;
mod records;
mod sqlite;
mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use records::{InstalledStickerRecord, PendingDownloadRecord};
pub use sqlite::SqliteStore;
pub use traits::{CommitHook, ReadTransaction, StickerStore, WriteTransaction};

/// Name of the recent stickers list.
pub const RECENT_STICKERS_LIST: &str = "recent_stickers";

/// Prefix of per-emoji sticker lists.
pub const EMOJI_LIST_PREFIX: &str = "emoji:";
