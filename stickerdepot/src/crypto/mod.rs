//! Sticker content encryption.
//!
//! Manifests and sticker files on the CDN are encrypted with keys derived
//! from the pack key. The downloader only sees the [`ContentCipher`] trait;
//! [`StickerCipher`] is the production scheme.

mod cipher;

pub use cipher::{CipherError, ContentCipher, StickerCipher, IV_LENGTH, MAC_LENGTH};
