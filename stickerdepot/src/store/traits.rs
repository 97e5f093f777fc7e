//! Transaction interfaces.

use chrono::{DateTime, Utc};

use super::error::StoreError;
use super::records::{InstalledStickerRecord, PendingDownloadRecord};
use crate::identity::{PackIdentity, StickerIdentity};
use crate::manifest::PackManifest;

/// Callback run once after a successful commit.
pub type CommitHook = Box<dyn FnOnce() + Send>;

/// Read access to the install state.
///
/// Packs are keyed by pack id; installed stickers by sticker key.
pub trait ReadTransaction {
    fn pack(&self, identity: &PackIdentity) -> Result<Option<PackManifest>, StoreError>;

    fn all_packs(&self) -> Result<Vec<PackManifest>, StoreError>;

    fn sticker(
        &self,
        identity: &StickerIdentity,
    ) -> Result<Option<InstalledStickerRecord>, StoreError>;

    fn all_stickers(&self) -> Result<Vec<InstalledStickerRecord>, StoreError>;

    /// Installed stickers belonging to `pack`, ordered by index.
    fn stickers_in_pack(
        &self,
        pack: &PackIdentity,
    ) -> Result<Vec<InstalledStickerRecord>, StoreError> {
        let mut records: Vec<_> = self
            .all_stickers()?
            .into_iter()
            .filter(|r| r.identity.pack().pack_id() == pack.pack_id())
            .collect();
        records.sort_by_key(|r| r.identity.index());
        Ok(records)
    }

    /// An ordered string list. Missing lists are empty.
    fn string_list(&self, name: &str) -> Result<Vec<String>, StoreError>;

    /// Oldest pending downloads first, at most `limit`.
    fn pending_downloads(&self, limit: usize) -> Result<Vec<PendingDownloadRecord>, StoreError>;

    fn pending_count(&self) -> Result<usize, StoreError>;
}

/// Read-write access inside one atomic transaction.
pub trait WriteTransaction: ReadTransaction {
    /// Inserts or replaces the pack record.
    fn put_pack(&mut self, manifest: &PackManifest) -> Result<(), StoreError>;

    /// Returns whether a record was removed.
    fn delete_pack(&mut self, identity: &PackIdentity) -> Result<bool, StoreError>;

    fn put_sticker(&mut self, record: &InstalledStickerRecord) -> Result<(), StoreError>;

    fn delete_sticker(&mut self, identity: &StickerIdentity) -> Result<bool, StoreError>;

    /// Replaces a string list. An empty list removes it.
    fn set_string_list(&mut self, name: &str, values: &[String]) -> Result<(), StoreError>;

    /// Appends a pending download and returns its row id.
    fn enqueue_pending(
        &mut self,
        identity: &PackIdentity,
        enqueued_at: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    fn remove_pending(&mut self, id: i64) -> Result<bool, StoreError>;

    /// Registers `hook` to run after this transaction commits. Dropped
    /// unrun on rollback.
    fn after_commit(&mut self, hook: CommitHook);
}

/// Transactional store of packs, installed stickers, string lists and
/// pending downloads.
pub trait StickerStore: Send + Sync + 'static {
    /// Runs `f` against a consistent view of committed state.
    fn read<R, E, F>(&self, f: F) -> Result<R, E>
    where
        E: From<StoreError>,
        F: FnOnce(&dyn ReadTransaction) -> Result<R, E>;

    /// Runs `f` in a write transaction, committing only if it returns `Ok`.
    fn write<R, E, F>(&self, f: F) -> Result<R, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut dyn WriteTransaction) -> Result<R, E>;
}

/// Runs hooks in registration order.
pub(super) fn run_hooks(hooks: Vec<CommitHook>) {
    for hook in hooks {
        hook();
    }
}
