//! In-memory store.
//!
//! A write transaction works on a copy of the state that replaces the
//! committed state only when the transaction succeeds. The state lock is
//! held for the whole transaction, so transactions are serialisable.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

use super::error::StoreError;
use super::records::{InstalledStickerRecord, PendingDownloadRecord};
use super::traits::{run_hooks, CommitHook, ReadTransaction, StickerStore, WriteTransaction};
use crate::identity::{PackIdentity, StickerIdentity};
use crate::manifest::PackManifest;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    packs: BTreeMap<String, PackManifest>,
    stickers: BTreeMap<String, InstalledStickerRecord>,
    lists: HashMap<String, Vec<String>>,
    pending: BTreeMap<i64, PendingDownloadRecord>,
    next_pending_id: i64,
}

impl ReadTransaction for MemoryState {
    fn pack(&self, identity: &PackIdentity) -> Result<Option<PackManifest>, StoreError> {
        Ok(self.packs.get(&identity.key()).cloned())
    }

    fn all_packs(&self) -> Result<Vec<PackManifest>, StoreError> {
        Ok(self.packs.values().cloned().collect())
    }

    fn sticker(
        &self,
        identity: &StickerIdentity,
    ) -> Result<Option<InstalledStickerRecord>, StoreError> {
        Ok(self.stickers.get(&identity.key()).cloned())
    }

    fn all_stickers(&self) -> Result<Vec<InstalledStickerRecord>, StoreError> {
        Ok(self.stickers.values().cloned().collect())
    }

    fn string_list(&self, name: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.lists.get(name).cloned().unwrap_or_default())
    }

    fn pending_downloads(&self, limit: usize) -> Result<Vec<PendingDownloadRecord>, StoreError> {
        Ok(self.pending.values().take(limit).cloned().collect())
    }

    fn pending_count(&self) -> Result<usize, StoreError> {
        Ok(self.pending.len())
    }
}

struct MemoryWriteTransaction {
    state: MemoryState,
    hooks: Vec<CommitHook>,
}

impl ReadTransaction for MemoryWriteTransaction {
    fn pack(&self, identity: &PackIdentity) -> Result<Option<PackManifest>, StoreError> {
        self.state.pack(identity)
    }

    fn all_packs(&self) -> Result<Vec<PackManifest>, StoreError> {
        self.state.all_packs()
    }

    fn sticker(
        &self,
        identity: &StickerIdentity,
    ) -> Result<Option<InstalledStickerRecord>, StoreError> {
        self.state.sticker(identity)
    }

    fn all_stickers(&self) -> Result<Vec<InstalledStickerRecord>, StoreError> {
        self.state.all_stickers()
    }

    fn string_list(&self, name: &str) -> Result<Vec<String>, StoreError> {
        self.state.string_list(name)
    }

    fn pending_downloads(&self, limit: usize) -> Result<Vec<PendingDownloadRecord>, StoreError> {
        self.state.pending_downloads(limit)
    }

    fn pending_count(&self) -> Result<usize, StoreError> {
        self.state.pending_count()
    }
}

impl WriteTransaction for MemoryWriteTransaction {
    fn put_pack(&mut self, manifest: &PackManifest) -> Result<(), StoreError> {
        self.state
            .packs
            .insert(manifest.identity.key(), manifest.clone());
        Ok(())
    }

    fn delete_pack(&mut self, identity: &PackIdentity) -> Result<bool, StoreError> {
        Ok(self.state.packs.remove(&identity.key()).is_some())
    }

    fn put_sticker(&mut self, record: &InstalledStickerRecord) -> Result<(), StoreError> {
        self.state.stickers.insert(record.key(), record.clone());
        Ok(())
    }

    fn delete_sticker(&mut self, identity: &StickerIdentity) -> Result<bool, StoreError> {
        Ok(self.state.stickers.remove(&identity.key()).is_some())
    }

    fn set_string_list(&mut self, name: &str, values: &[String]) -> Result<(), StoreError> {
        if values.is_empty() {
            self.state.lists.remove(name);
        } else {
            self.state.lists.insert(name.to_string(), values.to_vec());
        }
        Ok(())
    }

    fn enqueue_pending(
        &mut self,
        identity: &PackIdentity,
        enqueued_at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        self.state.next_pending_id += 1;
        let id = self.state.next_pending_id;
        self.state.pending.insert(
            id,
            PendingDownloadRecord {
                id,
                identity: identity.clone(),
                enqueued_at,
            },
        );
        Ok(id)
    }

    fn remove_pending(&mut self, id: i64) -> Result<bool, StoreError> {
        Ok(self.state.pending.remove(&id).is_some())
    }

    fn after_commit(&mut self, hook: CommitHook) {
        self.hooks.push(hook);
    }
}

/// Store kept entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StickerStore for MemoryStore {
    fn read<R, E, F>(&self, f: F) -> Result<R, E>
    where
        E: From<StoreError>,
        F: FnOnce(&dyn ReadTransaction) -> Result<R, E>,
    {
        let state = self.state.lock();
        f(&*state)
    }

    fn write<R, E, F>(&self, f: F) -> Result<R, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut dyn WriteTransaction) -> Result<R, E>,
    {
        let (value, hooks) = {
            let mut committed = self.state.lock();
            let mut tx = MemoryWriteTransaction {
                state: committed.clone(),
                hooks: Vec::new(),
            };
            let result = f(&mut tx);
            match result {
                Ok(value) => {
                    *committed = tx.state;
                    (value, tx.hooks)
                }
                Err(e) => return Err(e),
            }
        };
        run_hooks(hooks);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::PackItem;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn manifest(id: u8, installed: bool) -> PackManifest {
        PackManifest {
            identity: PackIdentity::new(vec![id], &[id; 32]).unwrap(),
            title: None,
            author: None,
            cover: PackItem::new(0, "", ""),
            items: vec![PackItem::new(0, "", ""), PackItem::new(1, "", "")],
            is_installed: installed,
            date_created: Utc::now(),
        }
    }

    #[test]
    fn test_write_commits_on_ok() {
        let store = MemoryStore::new();
        let m = manifest(1, true);
        store
            .write(|tx| tx.put_pack(&m))
            .unwrap();

        let loaded: Option<PackManifest> = store.read(|tx| tx.pack(&m.identity)).unwrap();
        assert_eq!(loaded, Some(m));
    }

    #[test]
    fn test_write_rolls_back_on_err() {
        let store = MemoryStore::new();
        let m = manifest(1, true);
        let result: Result<(), StoreError> = store.write(|tx| {
            tx.put_pack(&m)?;
            Err(StoreError::Database("abort".into()))
        });
        assert!(result.is_err());

        let count = store.read(|tx| tx.all_packs().map(|p| p.len())).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_hooks_run_only_after_commit() {
        let store = MemoryStore::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let r = Arc::clone(&runs);
        store
            .write::<_, StoreError, _>(|tx| {
                tx.after_commit(Box::new(move || {
                    r.fetch_add(1, Ordering::SeqCst);
                }));
                Ok(())
            })
            .unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let r = Arc::clone(&runs);
        let _ = store.write::<(), StoreError, _>(|tx| {
            tx.after_commit(Box::new(move || {
                r.fetch_add(1, Ordering::SeqCst);
            }));
            Err(StoreError::Database("abort".into()))
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hooks_may_use_the_store() {
        let store = Arc::new(MemoryStore::new());
        let inner = Arc::clone(&store);
        let m = manifest(2, false);
        let identity = m.identity.clone();

        store
            .write::<_, StoreError, _>(|tx| {
                tx.put_pack(&m)?;
                tx.after_commit(Box::new(move || {
                    let seen = inner.read(|tx| tx.pack(&identity)).unwrap();
                    assert!(seen.is_some());
                }));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_pending_downloads_fifo() {
        let store = MemoryStore::new();
        let a = manifest(1, false).identity;
        let b = manifest(2, false).identity;

        let (ida, idb) = store
            .write::<_, StoreError, _>(|tx| {
                Ok((tx.enqueue_pending(&a, Utc::now())?, tx.enqueue_pending(&b, Utc::now())?))
            })
            .unwrap();
        assert!(ida < idb);

        let pending = store.read(|tx| tx.pending_downloads(10)).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].identity, a);

        assert!(store.write(|tx| tx.remove_pending(ida)).unwrap());
        assert_eq!(store.read(|tx| tx.pending_count()).unwrap(), 1);
    }

    #[test]
    fn test_string_lists_and_stickers_in_pack() {
        let store = MemoryStore::new();
        let pack = manifest(3, true).identity;
        store
            .write::<_, StoreError, _>(|tx| {
                tx.put_sticker(&InstalledStickerRecord::new(pack.sticker(2), "", None))?;
                tx.put_sticker(&InstalledStickerRecord::new(pack.sticker(1), "", None))?;
                tx.set_string_list("l", &["x".to_string()])
            })
            .unwrap();

        let stickers = store.read(|tx| tx.stickers_in_pack(&pack)).unwrap();
        assert_eq!(
            stickers.iter().map(|r| r.identity.index()).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(store.read(|tx| tx.string_list("l")).unwrap(), vec!["x"]);

        store.write(|tx| tx.set_string_list("l", &[])).unwrap();
        assert!(store.read(|tx| tx.string_list("l")).unwrap().is_empty());
    }
}
