//! Packs known at compile time.
//!
//! Default packs are downloaded in the background by
//! [`StickerManager::refresh_contents`](super::StickerManager::refresh_contents)
//! and are never fully deleted: uninstalling one only clears its installed
//! flag.

use tracing::error;

use crate::identity::PackIdentity;

struct BuiltinPack {
    name: &'static str,
    pack_id: &'static str,
    pack_key: &'static str,
    auto_install: bool,
}

const BUILTIN_PACKS: &[BuiltinPack] = &[
    BuiltinPack {
        name: "zozo",
        pack_id: "fb535407d2f6497ec074df8b9c51dd1d",
        pack_key: "17e971c134035622781d2ee249e6473b774583750b68c11bb82b7509c68b6dfd",
        auto_install: true,
    },
    BuiltinPack {
        name: "bandit",
        pack_id: "9acc9e8aba563d26a4994e69263e3b25",
        pack_key: "5a6dff3948c28efb9b7aaf93ecc375c69fc316e78077ed26867a14d10a0f6a12",
        auto_install: true,
    },
    BuiltinPack {
        name: "swoon-hands",
        pack_id: "e61fa0867031597467ccc036cc65d403",
        pack_key: "13ae7b1a7407318280e9b38c1261ded38e0e7138b9f964a6ccbb73e40f737a9b",
        auto_install: false,
    },
    BuiltinPack {
        name: "swoon-faces",
        pack_id: "cca32f5b905208b7d0f1e17f23fdc185",
        pack_key: "8bf8e95f7a45bdeafe0c8f5b002ef01ab95b8f1b5baac4019ccd6b6be0b1837a",
        auto_install: false,
    },
];

/// One registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultPack {
    pub identity: PackIdentity,
    pub auto_install: bool,
}

/// Immutable list of default packs.
///
/// Membership is decided by pack id alone.
#[derive(Debug, Clone, Default)]
pub struct DefaultPackRegistry {
    packs: Vec<DefaultPack>,
}

impl DefaultPackRegistry {
    /// The packs shipped with the application.
    pub fn builtin() -> Self {
        let packs = BUILTIN_PACKS
            .iter()
            .filter_map(|p| match PackIdentity::from_hex(p.pack_id, p.pack_key) {
                Ok(identity) => Some(DefaultPack {
                    identity,
                    auto_install: p.auto_install,
                }),
                Err(e) => {
                    error!(pack = p.name, error = %e, "Invalid builtin pack");
                    None
                }
            })
            .collect();
        Self { packs }
    }

    /// A registry with no default packs.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(packs: impl IntoIterator<Item = (PackIdentity, bool)>) -> Self {
        Self {
            packs: packs
                .into_iter()
                .map(|(identity, auto_install)| DefaultPack {
                    identity,
                    auto_install,
                })
                .collect(),
        }
    }

    pub fn is_default(&self, identity: &PackIdentity) -> bool {
        self.is_default_id(identity.pack_id())
    }

    pub fn is_default_id(&self, pack_id: &[u8]) -> bool {
        self.packs
            .iter()
            .any(|p| p.identity.pack_id() == pack_id)
    }

    pub fn packs(&self) -> &[DefaultPack] {
        &self.packs
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_packs_parse() {
        let registry = DefaultPackRegistry::builtin();
        assert_eq!(registry.len(), BUILTIN_PACKS.len());
        assert_eq!(
            registry.packs().iter().filter(|p| p.auto_install).count(),
            2
        );
    }

    #[test]
    fn test_membership_ignores_key() {
        let registry = DefaultPackRegistry::builtin();
        let zozo = &registry.packs()[0].identity;
        assert!(registry.is_default(zozo));

        let other_key = PackIdentity::new(zozo.pack_id().to_vec(), &[9u8; 32]).unwrap();
        assert!(registry.is_default(&other_key));

        let stranger = PackIdentity::new(vec![1, 2, 3], &[9u8; 32]).unwrap();
        assert!(!registry.is_default(&stranger));
        assert!(!DefaultPackRegistry::empty().is_default(zozo));
    }
}
