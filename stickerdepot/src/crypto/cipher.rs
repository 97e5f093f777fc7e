//! HKDF-derived AES-256-CBC + HMAC-SHA256 content cipher.
//!
//! Wire layout: `IV(16) || AES-256-CBC/PKCS7 ciphertext || HMAC-SHA256(32)`,
//! where the MAC covers `IV || ciphertext`. Keys come from
//! `HKDF-SHA256(salt = "", ikm = pack_key, info = "Sticker Pack")`, 64 bytes
//! split into the AES key and the MAC key.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

use crate::identity::PACK_KEY_LENGTH;

type HmacSha256 = Hmac<Sha256>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Length of the CBC initialisation vector.
pub const IV_LENGTH: usize = 16;

/// Length of the trailing HMAC-SHA256 tag.
pub const MAC_LENGTH: usize = 32;

const KEY_INFO: &[u8] = b"Sticker Pack";
const DERIVED_LENGTH: usize = 64;
const BLOCK_LENGTH: usize = 16;

/// Cipher failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    /// Authentication, truncation or padding failure. The payload is
    /// corrupt or was encrypted with a different key.
    #[error("content failed integrity check")]
    Integrity,

    /// Key derivation failed
    #[error("key derivation failed")]
    KeyDerivation,
}

/// Encrypts and decrypts pack content under a pack key.
///
/// Implementations are CPU bound and called from blocking worker threads.
pub trait ContentCipher: Send + Sync + 'static {
    /// Authenticate and decrypt `ciphertext`.
    fn decrypt(
        &self,
        pack_key: &[u8; PACK_KEY_LENGTH],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CipherError>;

    /// Encrypt `plaintext`. Used by tooling and fixtures.
    fn encrypt(
        &self,
        pack_key: &[u8; PACK_KEY_LENGTH],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CipherError>;
}

/// Production sticker content cipher.
#[derive(Debug, Clone, Copy, Default)]
pub struct StickerCipher;

impl StickerCipher {
    pub fn new() -> Self {
        Self
    }

    fn derive_keys(pack_key: &[u8]) -> Result<([u8; 32], [u8; 32]), CipherError> {
        let hk = Hkdf::<Sha256>::new(Some(b"".as_slice()), pack_key);
        let mut okm = [0u8; DERIVED_LENGTH];
        hk.expand(KEY_INFO, &mut okm)
            .map_err(|_| CipherError::KeyDerivation)?;

        let mut aes_key = [0u8; 32];
        let mut mac_key = [0u8; 32];
        aes_key.copy_from_slice(&okm[..32]);
        mac_key.copy_from_slice(&okm[32..]);
        Ok((aes_key, mac_key))
    }

    fn mac(mac_key: &[u8]) -> Result<HmacSha256, CipherError> {
        <HmacSha256 as Mac>::new_from_slice(mac_key).map_err(|_| CipherError::KeyDerivation)
    }
}

impl ContentCipher for StickerCipher {
    fn decrypt(
        &self,
        pack_key: &[u8; PACK_KEY_LENGTH],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CipherError> {
        // Smallest valid payload holds one padded block.
        if ciphertext.len() < IV_LENGTH + BLOCK_LENGTH + MAC_LENGTH {
            return Err(CipherError::Integrity);
        }
        let (aes_key, mac_key) = Self::derive_keys(pack_key)?;

        let (signed, tag) = ciphertext.split_at(ciphertext.len() - MAC_LENGTH);
        let mut mac = Self::mac(&mac_key)?;
        mac.update(signed);
        mac.verify_slice(tag).map_err(|_| CipherError::Integrity)?;

        let (iv, body) = signed.split_at(IV_LENGTH);
        if body.len() % BLOCK_LENGTH != 0 {
            return Err(CipherError::Integrity);
        }
        Aes256CbcDec::new_from_slices(&aes_key, iv)
            .map_err(|_| CipherError::Integrity)?
            .decrypt_padded_vec_mut::<Pkcs7>(body)
            .map_err(|_| CipherError::Integrity)
    }

    fn encrypt(
        &self,
        pack_key: &[u8; PACK_KEY_LENGTH],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CipherError> {
        let (aes_key, mac_key) = Self::derive_keys(pack_key)?;

        let mut iv = [0u8; IV_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut iv);

        let body = Aes256CbcEnc::new_from_slices(&aes_key, &iv)
            .map_err(|_| CipherError::KeyDerivation)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut out = Vec::with_capacity(IV_LENGTH + body.len() + MAC_LENGTH);
        out.extend_from_slice(&iv);
        out.extend_from_slice(&body);

        let mut mac = Self::mac(&mac_key)?;
        mac.update(&out);
        out.extend_from_slice(&mac.finalize().into_bytes());
        Ok(out)
    }
}
