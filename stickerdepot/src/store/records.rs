//! Row types owned by the store.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::identity::{PackIdentity, StickerIdentity};
use crate::manifest::StickerType;

/// An installed sticker. Its existence is what "installed" means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledStickerRecord {
    pub identity: StickerIdentity,
    pub content_type: String,
    pub emoji_hint: Option<String>,
}

impl InstalledStickerRecord {
    pub fn new(
        identity: StickerIdentity,
        content_type: impl Into<String>,
        emoji_hint: Option<String>,
    ) -> Self {
        Self {
            identity,
            content_type: content_type.into(),
            emoji_hint: emoji_hint.filter(|e| !e.is_empty()),
        }
    }

    /// Storage key, `hex(pack_id)/index`.
    pub fn key(&self) -> String {
        self.identity.key()
    }

    pub fn sticker_type(&self) -> StickerType {
        StickerType::from_content_type(&self.content_type)
    }

    /// Location of the sticker file under `stickers_dir`:
    /// `<stickers_dir>/<hex(pack_id)>/<index>.<ext>`.
    pub fn file_path(&self, stickers_dir: &Path) -> PathBuf {
        stickers_dir
            .join(self.identity.pack().pack_id_hex())
            .join(format!(
                "{}.{}",
                self.identity.index(),
                self.sticker_type().file_extension()
            ))
    }
}

/// A pack download waiting in the resumable queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDownloadRecord {
    /// Store-assigned row id, increasing in enqueue order
    pub id: i64,
    pub identity: PackIdentity,
    pub enqueued_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_path_uses_type_extension() {
        let pack = PackIdentity::new(vec![0x0f], &[1u8; 32]).unwrap();
        let record = InstalledStickerRecord::new(pack.sticker(3), "image/png", None);
        assert_eq!(
            record.file_path(Path::new("/cache/stickers")),
            PathBuf::from("/cache/stickers/0f/3.png")
        );
        let lottie =
            InstalledStickerRecord::new(pack.sticker(4), "text/x-signal-sticker-lottie", None);
        assert!(lottie
            .file_path(Path::new("/s"))
            .ends_with("0f/4.lottiesticker"));
    }

    #[test]
    fn test_empty_emoji_is_none() {
        let pack = PackIdentity::new(vec![1], &[1u8; 32]).unwrap();
        let record = InstalledStickerRecord::new(pack.sticker(0), "", Some(String::new()));
        assert!(record.emoji_hint.is_none());
        assert_eq!(record.key(), "01/0");
    }
}
