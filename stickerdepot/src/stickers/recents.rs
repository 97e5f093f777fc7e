//! Recently sent stickers and emoji suggestions.

use std::collections::HashMap;
use std::sync::Arc;

use super::emoji::{emoji_characters, emoji_list_name};
use super::error::StickerError;
use super::manager::StickerManager;
use crate::cdn::CdnTransport;
use crate::identity::StickerIdentity;
use crate::store::{InstalledStickerRecord, ReadTransaction, StickerStore, RECENT_STICKERS_LIST};

/// Length cap of the recent-stickers list.
pub const MAX_RECENT_STICKERS: usize = 25;

/// Resolves sticker keys to installed records, dropping keys that are no
/// longer installed. Order is preserved.
fn resolve_keys<Tx: ReadTransaction + ?Sized>(
    tx: &Tx,
    keys: Vec<String>,
) -> Result<Vec<InstalledStickerRecord>, StickerError> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }
    let mut installed: HashMap<String, InstalledStickerRecord> = tx
        .all_stickers()?
        .into_iter()
        .map(|r| (r.key(), r))
        .collect();
    Ok(keys
        .into_iter()
        .filter_map(|key| installed.remove(&key))
        .collect())
}

impl<S: StickerStore, T: CdnTransport> StickerManager<S, T> {
    /// Moves an installed sticker to the front of the recents list.
    ///
    /// Returns `false` and leaves the list alone if the sticker is not
    /// installed.
    pub fn sticker_was_sent(&self, sticker: &StickerIdentity) -> Result<bool, StickerError> {
        let notifier = Arc::clone(&self.notifier);
        self.write(|tx| {
            if tx.sticker(sticker)?.is_none() {
                return Ok(false);
            }
            let key = sticker.key();
            let mut recents = tx.string_list(RECENT_STICKERS_LIST)?;
            recents.retain(|k| *k != key);
            recents.insert(0, key);
            recents.truncate(MAX_RECENT_STICKERS);
            tx.set_string_list(RECENT_STICKERS_LIST, &recents)?;
            tx.after_commit(Box::new(move || notifier.recent_stickers_changed()));
            Ok(true)
        })
    }

    /// Installed stickers with an existing file, most recently sent first.
    pub fn recent_stickers(&self) -> Result<Vec<InstalledStickerRecord>, StickerError> {
        let records =
            self.read(|tx| resolve_keys(tx, tx.string_list(RECENT_STICKERS_LIST)?))?;
        let dir = self.config.stickers_dir();
        Ok(records
            .into_iter()
            .filter(|r| r.file_path(&dir).is_file())
            .collect())
    }

    /// Installed stickers tagged with the first emoji of `emoji`, most
    /// recently installed first.
    pub fn suggested_stickers(
        &self,
        emoji: &str,
    ) -> Result<Vec<InstalledStickerRecord>, StickerError> {
        let Some(first) = emoji_characters(emoji).into_iter().next() else {
            return Ok(Vec::new());
        };
        let name = emoji_list_name(&first);
        self.read(|tx| resolve_keys(tx, tx.string_list(&name)?))
    }
}
