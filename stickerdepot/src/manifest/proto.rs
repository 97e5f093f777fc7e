//! Protobuf wire format of pack manifests.

use super::types::{PackItem, PackManifest};
use crate::identity::PackIdentity;
use chrono::Utc;
use prost::Message;
use thiserror::Error;

/// `Pack` message of `manifest.proto`.
#[derive(Clone, PartialEq, Message)]
pub struct PackProto {
    #[prost(string, optional, tag = "1")]
    pub title: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub author: Option<String>,
    #[prost(message, optional, tag = "3")]
    pub cover: Option<StickerProto>,
    #[prost(message, repeated, tag = "4")]
    pub stickers: Vec<StickerProto>,
}

/// `Sticker` message of `manifest.proto`.
#[derive(Clone, PartialEq, Message)]
pub struct StickerProto {
    #[prost(uint32, optional, tag = "1")]
    pub id: Option<u32>,
    #[prost(string, optional, tag = "2")]
    pub emoji: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub content_type: Option<String>,
}

impl StickerProto {
    fn into_item(self) -> Result<PackItem, ManifestError> {
        let index = self.id.ok_or(ManifestError::MissingStickerId)?;
        Ok(PackItem {
            index,
            emoji_hint: self.emoji.unwrap_or_default(),
            content_type: self.content_type.unwrap_or_default(),
        })
    }
}

impl From<&PackItem> for StickerProto {
    fn from(item: &PackItem) -> Self {
        Self {
            id: Some(item.index),
            emoji: Some(item.emoji_hint.clone()),
            content_type: (!item.content_type.is_empty()).then(|| item.content_type.clone()),
        }
    }
}

/// Errors from manifest download or parsing.
///
/// Only a retryable download failure or an abandoned download may succeed
/// on a later attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    /// The download itself failed
    #[error("manifest download failed: {0}")]
    Download(#[from] crate::cdn::DownloadError),

    /// Decrypted payload is not a valid protobuf
    #[error("malformed manifest: {0}")]
    Decode(String),

    /// Manifest has no stickers
    #[error("manifest has no stickers")]
    Empty,

    /// A sticker entry omitted its id
    #[error("manifest sticker is missing its id")]
    MissingStickerId,

    /// Decrypted payload could not be read back from disk
    #[error("failed to read decrypted manifest: {0}")]
    Io(String),

    /// The shared download ended without a result
    #[error("manifest download was abandoned")]
    Abandoned,
}

impl ManifestError {
    /// Whether a later attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Download(e) => e.is_retryable(),
            Self::Abandoned => true,
            _ => false,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parses a decrypted manifest payload.
///
/// The result is not installed and is dated now; callers persisting it
/// decide the install state.
pub fn parse_manifest(identity: &PackIdentity, bytes: &[u8]) -> Result<PackManifest, ManifestError> {
    let proto = PackProto::decode(bytes).map_err(|e| ManifestError::Decode(e.to_string()))?;

    let items = proto
        .stickers
        .into_iter()
        .map(StickerProto::into_item)
        .collect::<Result<Vec<_>, _>>()?;

    let first = items.first().cloned().ok_or(ManifestError::Empty)?;
    let cover = match proto.cover {
        Some(cover) => cover.into_item()?,
        None => first,
    };

    Ok(PackManifest {
        identity: identity.clone(),
        title: non_empty(proto.title),
        author: non_empty(proto.author),
        cover,
        items,
        is_installed: false,
        date_created: Utc::now(),
    })
}

/// Encodes a manifest back into its wire format.
pub fn encode_manifest(
    title: Option<&str>,
    author: Option<&str>,
    cover: Option<&PackItem>,
    items: &[PackItem],
) -> Vec<u8> {
    PackProto {
        title: title.map(str::to_string),
        author: author.map(str::to_string),
        cover: cover.map(StickerProto::from),
        stickers: items.iter().map(StickerProto::from).collect(),
    }
    .encode_to_vec()
}
