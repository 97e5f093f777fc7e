//! Identity type definitions

use std::fmt;
use thiserror::Error;

/// Required length of a pack key in bytes.
pub const PACK_KEY_LENGTH: usize = 32;

/// Errors raised while constructing identities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// Pack id was empty
    #[error("pack id must not be empty")]
    EmptyPackId,

    /// Pack key had the wrong length
    #[error("pack key must be {PACK_KEY_LENGTH} bytes, got {0}")]
    InvalidKeyLength(usize),

    /// A hex component could not be decoded
    #[error("invalid hex in {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },
}

/// Identity of a sticker pack: `(pack_id, pack_key)`.
///
/// Equality and hashing cover both fields. The key is never printed by
/// the `Debug` or `Display` implementations.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PackIdentity {
    pack_id: Vec<u8>,
    pack_key: [u8; PACK_KEY_LENGTH],
}

impl PackIdentity {
    /// Creates a pack identity, validating the key length.
    pub fn new(pack_id: impl Into<Vec<u8>>, pack_key: &[u8]) -> Result<Self, IdentityError> {
        let pack_id = pack_id.into();
        if pack_id.is_empty() {
            return Err(IdentityError::EmptyPackId);
        }
        let pack_key: [u8; PACK_KEY_LENGTH] = pack_key
            .try_into()
            .map_err(|_| IdentityError::InvalidKeyLength(pack_key.len()))?;
        Ok(Self { pack_id, pack_key })
    }

    /// Creates a pack identity from hex-encoded id and key.
    pub fn from_hex(pack_id: &str, pack_key: &str) -> Result<Self, IdentityError> {
        let id = hex::decode(pack_id).map_err(|e| IdentityError::InvalidHex {
            field: "pack_id",
            reason: e.to_string(),
        })?;
        let key = hex::decode(pack_key).map_err(|e| IdentityError::InvalidHex {
            field: "pack_key",
            reason: e.to_string(),
        })?;
        Self::new(id, &key)
    }

    /// Raw pack id bytes.
    pub fn pack_id(&self) -> &[u8] {
        &self.pack_id
    }

    /// Raw pack key bytes.
    pub fn pack_key(&self) -> &[u8; PACK_KEY_LENGTH] {
        &self.pack_key
    }

    /// Hex-encoded pack id, used as the storage and CDN key.
    pub fn pack_id_hex(&self) -> String {
        hex::encode(&self.pack_id)
    }

    /// Hex-encoded pack key.
    pub fn pack_key_hex(&self) -> String {
        hex::encode(self.pack_key)
    }

    /// Lookup key for this pack.
    #[inline]
    pub fn key(&self) -> String {
        self.pack_id_hex()
    }

    /// Identity of the sticker at `index` within this pack.
    pub fn sticker(&self, index: u32) -> StickerIdentity {
        StickerIdentity {
            pack: self.clone(),
            index,
        }
    }
}

impl fmt::Debug for PackIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackIdentity")
            .field("pack_id", &self.pack_id_hex())
            .field("pack_key", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for PackIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pack_id_hex())
    }
}

/// Identity of a single sticker: its pack plus an index within the pack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StickerIdentity {
    pack: PackIdentity,
    index: u32,
}

impl StickerIdentity {
    /// Creates a sticker identity.
    pub fn new(pack: PackIdentity, index: u32) -> Self {
        Self { pack, index }
    }

    /// The owning pack.
    pub fn pack(&self) -> &PackIdentity {
        &self.pack
    }

    /// Index of the sticker within its pack.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Lookup key: `hex(pack_id) + "/" + index`.
    pub fn key(&self) -> String {
        Self::key_for(self.pack.pack_id(), self.index)
    }

    /// Builds a sticker key without constructing an identity.
    pub fn key_for(pack_id: &[u8], index: u32) -> String {
        format!("{}/{}", hex::encode(pack_id), index)
    }
}

impl fmt::Display for StickerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
