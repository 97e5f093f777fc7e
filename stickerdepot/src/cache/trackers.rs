//! Process-lifetime sets of known-bad resources.
//!
//! Neither set is persisted; both start empty on every launch.

use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::warn;

use crate::identity::PackIdentity;

/// CDN resources that failed an integrity check.
///
/// The downloader refuses these without touching the network.
#[derive(Debug, Default)]
pub struct CorruptKeyTracker {
    keys: Mutex<HashSet<String>>,
}

impl CorruptKeyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `key` as corrupt. Returns `true` if it was not already known.
    pub fn mark_corrupt(&self, key: &str) -> bool {
        let inserted = self.keys.lock().insert(key.to_string());
        if inserted {
            warn!(key, "Marking resource as corrupt for this session");
        }
        inserted
    }

    pub fn is_corrupt(&self, key: &str) -> bool {
        self.keys.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Packs the CDN reported as permanently absent.
///
/// Advisory only: callers may query it to avoid showing or fetching a
/// pack, but downloads never consult it.
#[derive(Debug, Default)]
pub struct MissingPackSet {
    packs: Mutex<HashSet<Vec<u8>>>,
}

impl MissingPackSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_missing(&self, identity: &PackIdentity) -> bool {
        self.packs.lock().insert(identity.pack_id().to_vec())
    }

    pub fn is_missing(&self, identity: &PackIdentity) -> bool {
        self.packs.lock().contains(identity.pack_id())
    }

    pub fn len(&self) -> usize {
        self.packs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_key_tracker() {
        let tracker = CorruptKeyTracker::new();
        assert!(!tracker.is_corrupt("stickers/aa/full/1"));
        assert!(tracker.mark_corrupt("stickers/aa/full/1"));
        assert!(!tracker.mark_corrupt("stickers/aa/full/1"));
        assert!(tracker.is_corrupt("stickers/aa/full/1"));
        assert!(!tracker.is_corrupt("stickers/aa/full/2"));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_missing_packs_keyed_by_pack_id() {
        let set = MissingPackSet::new();
        let a = PackIdentity::new(vec![1, 2], &[0u8; 32]).unwrap();
        let a_other_key = PackIdentity::new(vec![1, 2], &[9u8; 32]).unwrap();
        let b = PackIdentity::new(vec![3], &[0u8; 32]).unwrap();

        assert!(set.mark_missing(&a));
        assert!(set.is_missing(&a_other_key));
        assert!(!set.is_missing(&b));
        assert!(!set.is_empty());
    }
}
