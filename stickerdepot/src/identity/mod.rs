//! Pack and sticker identities.
//!
//! A sticker pack is addressed by an opaque pack id and protected by a
//! 32-byte pack key. Every lookup key used by caches and storage is derived
//! from the hex-encoded pack id, never from the key.

mod share_link;
mod types;

pub use share_link::{ShareLink, ShareLinkError, SHARE_LINK_HOST, SHARE_LINK_PATH};
pub use types::{IdentityError, PackIdentity, StickerIdentity, PACK_KEY_LENGTH};
