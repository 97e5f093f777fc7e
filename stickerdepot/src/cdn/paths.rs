//! CDN resource paths, relative to the CDN base URL.

use crate::identity::{PackIdentity, StickerIdentity};

/// `stickers/{hex(pack_id)}/manifest.proto`
pub fn manifest_path(identity: &PackIdentity) -> String {
    format!("stickers/{}/manifest.proto", identity.pack_id_hex())
}

/// `stickers/{hex(pack_id)}/full/{index}`
pub fn sticker_path(identity: &StickerIdentity) -> String {
    format!(
        "stickers/{}/full/{}",
        identity.pack().pack_id_hex(),
        identity.index()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let pack = PackIdentity::new(vec![0xde, 0xad], &[0u8; 32]).unwrap();
        assert_eq!(manifest_path(&pack), "stickers/dead/manifest.proto");
        assert_eq!(sticker_path(&pack.sticker(12)), "stickers/dead/full/12");
    }
}
