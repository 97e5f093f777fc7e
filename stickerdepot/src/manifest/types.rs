//! Manifest type definitions

use crate::identity::{PackIdentity, StickerIdentity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One item of a sticker pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackItem {
    /// Index of the sticker within the pack
    pub index: u32,
    /// Emoji associated with the sticker, possibly empty
    pub emoji_hint: String,
    /// MIME type of the sticker content, possibly empty
    pub content_type: String,
}

impl PackItem {
    /// Creates a pack item.
    pub fn new(index: u32, emoji_hint: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            index,
            emoji_hint: emoji_hint.into(),
            content_type: content_type.into(),
        }
    }

    /// Sticker type derived from the content type.
    pub fn sticker_type(&self) -> StickerType {
        StickerType::from_content_type(&self.content_type)
    }

    /// Emoji hint, `None` when empty.
    pub fn emoji(&self) -> Option<&str> {
        if self.emoji_hint.is_empty() {
            None
        } else {
            Some(&self.emoji_hint)
        }
    }
}

/// A sticker pack description.
///
/// `items` is never empty and `cover` defaults to `items[0]` when the
/// downloaded manifest does not carry an explicit cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackManifest {
    /// Identity of the pack
    pub identity: PackIdentity,
    /// Pack title
    pub title: Option<String>,
    /// Pack author
    pub author: Option<String>,
    /// Cover sticker
    pub cover: PackItem,
    /// All stickers in the pack
    pub items: Vec<PackItem>,
    /// Whether the pack is installed
    pub is_installed: bool,
    /// When the pack record was first created locally
    pub date_created: DateTime<Utc>,
}

impl PackManifest {
    /// Identity of the cover sticker.
    pub fn cover_identity(&self) -> StickerIdentity {
        self.identity.sticker(self.cover.index)
    }

    /// Identity of an item of this pack.
    pub fn item_identity(&self, item: &PackItem) -> StickerIdentity {
        self.identity.sticker(item.index)
    }

    /// Identities of all items, in manifest order.
    pub fn sticker_identities(&self) -> Vec<StickerIdentity> {
        self.items.iter().map(|i| self.item_identity(i)).collect()
    }

    /// Whether `index` is the cover of this pack.
    pub fn is_cover(&self, index: u32) -> bool {
        self.cover.index == index
    }

    /// Looks up an item (or the cover) by index.
    pub fn item(&self, index: u32) -> Option<&PackItem> {
        self.items
            .iter()
            .find(|i| i.index == index)
            .or_else(|| self.is_cover(index).then_some(&self.cover))
    }
}

/// Kind of sticker content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StickerType {
    /// WebP image (the default)
    #[default]
    Webp,
    /// Animated PNG
    Apng,
    /// GIF image
    Gif,
    /// Lottie animation
    Lottie,
}

impl StickerType {
    /// Maps a content type to a sticker type. Unknown types are WebP.
    pub fn from_content_type(content_type: &str) -> Self {
        match content_type.trim().to_ascii_lowercase().as_str() {
            "image/png" | "image/apng" => Self::Apng,
            "image/gif" => Self::Gif,
            "text/x-signal-sticker-lottie" => Self::Lottie,
            _ => Self::Webp,
        }
    }

    /// File extension for installed sticker files.
    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Apng => "png",
            Self::Gif => "gif",
            Self::Lottie => "lottiesticker",
        }
    }

    /// Canonical content type.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Webp => "image/webp",
            Self::Apng => "image/apng",
            Self::Gif => "image/gif",
            Self::Lottie => "text/x-signal-sticker-lottie",
        }
    }
}
