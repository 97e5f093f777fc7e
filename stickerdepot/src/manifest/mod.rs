//! Sticker pack manifests.
//!
//! A manifest is the encrypted protobuf document at
//! `stickers/{hex(pack_id)}/manifest.proto` describing a pack's title,
//! author, cover and items. [`PackManifestFetcher`] downloads, decrypts and
//! parses it into a [`PackManifest`].

mod fetcher;
mod proto;
mod types;

pub use fetcher::PackManifestFetcher;
pub use proto::{encode_manifest, parse_manifest, ManifestError, PackProto, StickerProto};
pub use types::{PackItem, PackManifest, StickerType};
