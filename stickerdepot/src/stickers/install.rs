//! Pack install state machine and content completion.
//!
//! ```text
//!  unsaved ──fetch (DoNotInstall)──► saved ──install──► installed
//!     │                                ▲                    │
//!     └──fetch (Install / IfUnsaved)───┼────────────────────┤
//!                                      └─uninstall (default)┘
//!                                        uninstall (other) ──► unsaved
//! ```
//!
//! A pack is marked installed only after its cover is. Content completion
//! installs the cover first and only then the remaining items, so every
//! observer that sees a non-cover sticker of a pack also sees its cover.

use futures::future::join_all;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::emoji::{emoji_characters, emoji_list_name};
use super::error::StickerError;
use super::manager::StickerManager;
use crate::cdn::CdnTransport;
use crate::identity::PackIdentity;
use crate::manifest::{PackItem, PackManifest};
use crate::store::{
    CommitHook, InstalledStickerRecord, StickerStore, StoreError, WriteTransaction,
    RECENT_STICKERS_LIST,
};

/// How a freshly downloaded manifest affects the installed flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallMode {
    /// Save the pack, keep its current installed flag.
    #[default]
    DoNotInstall,
    /// Save and install.
    Install,
    /// Install only if the pack was not saved before.
    InstallIfUnsaved,
}

/// Outcome of installing one sticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum StickerInstall {
    Installed,
    AlreadyInstalled,
    /// The pack no longer wants this sticker; the download was dropped.
    Discarded,
}

/// Counts from one content completion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentReport {
    pub installed: usize,
    pub failed: usize,
}

impl ContentReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }

    pub(super) fn merge(&mut self, other: ContentReport) {
        self.installed += other.installed;
        self.failed += other.failed;
    }
}

/// A pack saved by `upsert`.
struct Upserted {
    pack: PackManifest,
    /// Whether the caller asked for the pack to be installed.
    install: bool,
    /// Whether the pack was not saved before.
    fresh: bool,
}

impl<S: StickerStore, T: CdnTransport> StickerManager<S, T> {
    /// Installs a pack, downloading its manifest if it is not saved yet.
    ///
    /// The pack becomes installed only once its cover is. A cover failure
    /// fails the install and leaves the pack not installed. Failures of the
    /// other stickers are logged and counted but do not fail the install; a
    /// later [`refresh_contents`](Self::refresh_contents) retries them.
    pub async fn install(&self, identity: &PackIdentity) -> Result<PackManifest, StickerError> {
        match self.pack(identity)? {
            Some(pack) if pack.is_installed => {
                self.install_pack_contents(&pack, false).await;
                Ok(pack)
            }
            Some(pack) => {
                info!(pack = %identity, "Installing saved pack");
                self.activate(pack).await
            }
            None => self.download_and_save(identity, InstallMode::Install).await,
        }
    }

    /// Downloads the manifest of `identity` and saves it according to `mode`.
    ///
    /// If the pack ends up installed, its content is completed as well. When
    /// a newly saved pack cannot be installed because its cover failed, the
    /// pack is not kept.
    pub async fn download_and_save(
        &self,
        identity: &PackIdentity,
        mode: InstallMode,
    ) -> Result<PackManifest, StickerError> {
        let manifest = self.manifests.fetch(identity).await.map_err(|e| {
            warn!(pack = %identity, error = %e, "Pack download failed");
            StickerError::from(e)
        })?;

        let saved = self.upsert(manifest, mode)?;
        info!(
            pack = %identity,
            mode = ?mode,
            installed = saved.pack.is_installed,
            "Saved pack"
        );
        if saved.pack.is_installed {
            self.install_pack_contents(&saved.pack, false).await;
            return Ok(saved.pack);
        }
        if !saved.install {
            return Ok(saved.pack);
        }

        match self.activate(saved.pack).await {
            Ok(pack) => Ok(pack),
            Err(e) => {
                if saved.fresh {
                    self.forget_unsaved(identity)?;
                }
                Err(e)
            }
        }
    }

    /// Saves `manifest`, keeping the creation date and installed flag of an
    /// existing record.
    fn upsert(&self, manifest: PackManifest, mode: InstallMode) -> Result<Upserted, StickerError> {
        let notifier = Arc::clone(&self.notifier);
        self.write(move |tx| {
            let existing = tx.pack(&manifest.identity)?;
            let install = match mode {
                InstallMode::DoNotInstall => false,
                InstallMode::Install => true,
                InstallMode::InstallIfUnsaved => existing.is_none(),
            };

            let mut pack = manifest;
            if let Some(old) = &existing {
                pack.date_created = old.date_created;
            }
            pack.is_installed = existing.as_ref().is_some_and(|p| p.is_installed);
            tx.put_pack(&pack)?;
            tx.after_commit(Box::new(move || notifier.packs_changed()));
            Ok(Upserted {
                pack,
                install,
                fresh: existing.is_none(),
            })
        })
    }

    /// Installs the cover of a saved pack, then marks the pack installed and
    /// completes the rest of its content.
    async fn activate(&self, pack: PackManifest) -> Result<PackManifest, StickerError> {
        match self.install_sticker(&pack, &pack.cover).await {
            Ok(StickerInstall::Installed) => self.notifier.stickers_changed(),
            Ok(_) => {}
            Err(e) => {
                warn!(pack = %pack.identity, error = %e, "Cover install failed");
                return Err(e);
            }
        }

        let notifier = Arc::clone(&self.notifier);
        let marked = self.write(|tx| {
            let Some(mut saved) = tx.pack(&pack.identity)? else {
                return Ok(None);
            };
            if !saved.is_installed {
                saved.is_installed = true;
                tx.put_pack(&saved)?;
                tx.after_commit(Box::new(move || notifier.packs_changed()));
            }
            Ok(Some(saved))
        })?;

        match marked {
            Some(installed) => {
                self.install_pack_contents(&installed, false).await;
                Ok(installed)
            }
            None => {
                debug!(pack = %pack.identity, "Pack was removed while installing its cover");
                Ok(pack)
            }
        }
    }

    /// Deletes a pack saved by a failed install, unless something installed
    /// it or any of its stickers in the meantime.
    fn forget_unsaved(&self, identity: &PackIdentity) -> Result<(), StickerError> {
        let notifier = Arc::clone(&self.notifier);
        let forgotten = self.write(|tx| {
            let Some(pack) = tx.pack(identity)? else {
                return Ok(false);
            };
            if pack.is_installed || !tx.stickers_in_pack(identity)?.is_empty() {
                return Ok(false);
            }
            tx.delete_pack(identity)?;
            tx.after_commit(Box::new(move || notifier.packs_changed()));
            Ok(true)
        })?;
        if forgotten {
            debug!(pack = %identity, "Dropped pack after failed install");
        }
        Ok(())
    }

    /// Uninstalls a pack. Returns `false` if it was not saved.
    ///
    /// A default pack stays saved with its cover; any other pack is removed
    /// with all of its stickers. Sticker files are deleted after commit.
    pub fn uninstall(&self, identity: &PackIdentity) -> Result<bool, StickerError> {
        let is_default = self.defaults.is_default(identity);
        let removed = self.write(|tx| {
            let Some(mut pack) = tx.pack(identity)? else {
                return Ok(None);
            };
            let records = tx.stickers_in_pack(identity)?;

            let doomed: Vec<_> = if is_default {
                pack.is_installed = false;
                tx.put_pack(&pack)?;
                records
                    .into_iter()
                    .filter(|r| !pack.is_cover(r.identity.index()))
                    .collect()
            } else {
                tx.delete_pack(identity)?;
                records
            };

            let recents_changed = remove_sticker_records(tx, &doomed)?;
            tx.after_commit(self.removal_hook(&doomed, recents_changed, true));
            Ok(Some(doomed.len()))
        })?;

        match removed {
            Some(stickers) => {
                info!(pack = %identity, default = is_default, stickers, "Uninstalled pack");
                Ok(true)
            }
            None => {
                debug!(pack = %identity, "Skipping uninstall of unsaved pack");
                Ok(false)
            }
        }
    }

    /// Installs the cover of `pack`, then (unless `cover_only`) every other
    /// item concurrently.
    ///
    /// If the cover cannot be installed nothing else is attempted.
    pub(super) async fn install_pack_contents(
        &self,
        pack: &PackManifest,
        cover_only: bool,
    ) -> ContentReport {
        let mut report = ContentReport::default();

        match self.install_sticker(pack, &pack.cover).await {
            Ok(StickerInstall::Installed) => {
                report.installed += 1;
                self.notifier.stickers_changed();
            }
            Ok(StickerInstall::AlreadyInstalled) => {}
            Ok(StickerInstall::Discarded) => return report,
            Err(e) => {
                warn!(pack = %pack.identity, error = %e, "Cover install failed");
                report.failed += 1;
                return report;
            }
        }
        if cover_only {
            return report;
        }

        let items = pack.items.iter().filter(|i| i.index != pack.cover.index);
        let results = join_all(items.map(|item| self.install_sticker(pack, item))).await;

        let mut installed = 0;
        for result in results {
            match result {
                Ok(StickerInstall::Installed) => installed += 1,
                Ok(_) => {}
                Err(e) => {
                    warn!(pack = %pack.identity, error = %e, "Sticker install failed");
                    report.failed += 1;
                }
            }
        }
        if installed > 0 {
            report.installed += installed;
            self.notifier.stickers_changed();
        }
        debug!(
            pack = %pack.identity,
            installed = report.installed,
            failed = report.failed,
            "Pack contents completed"
        );
        report
    }

    /// Downloads one item and registers it as installed.
    ///
    /// The record is written only if the pack still wants the sticker when
    /// the download completes.
    pub(super) async fn install_sticker(
        &self,
        pack: &PackManifest,
        item: &PackItem,
    ) -> Result<StickerInstall, StickerError> {
        let sticker = pack.item_identity(item);
        if self.is_sticker_installed(&sticker)? {
            return Ok(StickerInstall::AlreadyInstalled);
        }

        let record = InstalledStickerRecord::new(
            sticker.clone(),
            item.content_type.clone(),
            item.emoji().map(str::to_string),
        );
        let key = record.key();
        let source = self.download_sticker(&sticker).await?;
        let target = record.file_path(&self.config.stickers_dir());
        if source.starts_with(self.config.scratch_dir()) {
            move_into_place(&source, &target).await?;
            self.remember(&key, &target);
        } else if source != target {
            copy_into_place(&source, &target).await?;
        }

        let outcome = self.write(|tx| {
            let wanted = tx
                .pack(sticker.pack())?
                .is_some_and(|p| p.is_installed || p.is_cover(sticker.index()));
            if !wanted {
                return Ok(StickerInstall::Discarded);
            }
            if tx.sticker(&sticker)?.is_some() {
                return Ok(StickerInstall::AlreadyInstalled);
            }
            tx.put_sticker(&record)?;
            add_to_emoji_lists(tx, &record)?;
            Ok(StickerInstall::Installed)
        })?;

        match outcome {
            StickerInstall::Installed => {
                self.remember(&key, &target);
                debug!(sticker = %sticker, "Installed sticker");
            }
            StickerInstall::Discarded => {
                debug!(sticker = %sticker, "Discarding sticker of uninstalled pack");
                self.cache.remove(&key);
                remove_quietly(&target).await;
            }
            StickerInstall::AlreadyInstalled => {}
        }
        Ok(outcome)
    }

    /// Builds the post-commit hook for removed sticker records: drops their
    /// cache entries, deletes their files and notifies observers.
    pub(super) fn removal_hook(
        &self,
        records: &[InstalledStickerRecord],
        recents_changed: bool,
        packs_changed: bool,
    ) -> CommitHook {
        let dir = self.config.stickers_dir();
        let doomed: Vec<(String, PathBuf)> = records
            .iter()
            .map(|r| (r.key(), r.file_path(&dir)))
            .collect();
        let cache = Arc::clone(&self.cache);
        let notifier = Arc::clone(&self.notifier);

        Box::new(move || {
            let mut files = Vec::with_capacity(doomed.len());
            for (key, file) in doomed {
                cache.remove(&key);
                files.push(file);
            }
            let stickers_changed = !files.is_empty();
            delete_files(files);

            if packs_changed {
                notifier.packs_changed();
            } else if stickers_changed {
                notifier.stickers_changed();
            }
            if recents_changed {
                notifier.recent_stickers_changed();
            }
        })
    }
}

/// Prepends the sticker to the list of every emoji in its hint.
fn add_to_emoji_lists<Tx: WriteTransaction + ?Sized>(
    tx: &mut Tx,
    record: &InstalledStickerRecord,
) -> Result<(), StoreError> {
    let Some(hint) = record.emoji_hint.as_deref() else {
        return Ok(());
    };
    let key = record.key();
    for emoji in emoji_characters(hint) {
        let name = emoji_list_name(&emoji);
        let mut keys = tx.string_list(&name)?;
        keys.retain(|k| *k != key);
        keys.insert(0, key.clone());
        tx.set_string_list(&name, &keys)?;
    }
    Ok(())
}

/// Deletes sticker records together with their emoji and recents entries.
/// Returns whether the recents list changed.
pub(super) fn remove_sticker_records<Tx: WriteTransaction + ?Sized>(
    tx: &mut Tx,
    records: &[InstalledStickerRecord],
) -> Result<bool, StoreError> {
    if records.is_empty() {
        return Ok(false);
    }

    for record in records {
        tx.delete_sticker(&record.identity)?;
        let key = record.key();
        for emoji in emoji_characters(record.emoji_hint.as_deref().unwrap_or_default()) {
            let name = emoji_list_name(&emoji);
            let mut keys = tx.string_list(&name)?;
            let before = keys.len();
            keys.retain(|k| *k != key);
            if keys.len() != before {
                tx.set_string_list(&name, &keys)?;
            }
        }
    }

    let removed: Vec<String> = records.iter().map(InstalledStickerRecord::key).collect();
    let mut recents = tx.string_list(RECENT_STICKERS_LIST)?;
    let before = recents.len();
    recents.retain(|k| !removed.contains(k));
    if recents.len() == before {
        return Ok(false);
    }
    tx.set_string_list(RECENT_STICKERS_LIST, &recents)?;
    Ok(true)
}

/// Copies `source` to `target` through a uniquely named temporary file.
async fn copy_into_place(source: &Path, target: &Path) -> Result<(), StickerError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StickerError::io("failed to create", parent, e))?;
    }
    let part = target.with_extension(format!("{}.part", Uuid::new_v4().simple()));
    if let Err(e) = fs::copy(source, &part).await {
        let _ = fs::remove_file(&part).await;
        return Err(StickerError::io("failed to copy into", &part, e));
    }
    fs::rename(&part, target).await.map_err(|e| {
        StickerError::io("failed to move into place", target, e)
    })
}

/// Moves a scratch download to `target`.
///
/// Concurrent installs of one sticker share the scratch file; whoever loses
/// the rename finds the target already in place. Falls back to a copy when
/// the rename fails for any other reason.
async fn move_into_place(source: &Path, target: &Path) -> Result<(), StickerError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StickerError::io("failed to create", parent, e))?;
    }
    let Err(e) = fs::rename(source, target).await else {
        return Ok(());
    };
    if e.kind() == ErrorKind::NotFound && fs::try_exists(target).await.unwrap_or(false) {
        return Ok(());
    }
    debug!(file = %source.display(), error = %e, "Rename failed, copying instead");
    copy_into_place(source, target).await?;
    remove_quietly(source).await;
    Ok(())
}

/// Deletes files off the calling thread when a runtime is available.
pub(super) fn delete_files(files: Vec<PathBuf>) {
    if files.is_empty() {
        return;
    }
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                for file in files {
                    remove_quietly(&file).await;
                }
            });
        }
        Err(_) => {
            for file in files {
                if let Err(e) = std::fs::remove_file(&file) {
                    debug!(file = %file.display(), error = %e, "Could not delete sticker file");
                }
            }
        }
    }
}

async fn remove_quietly(file: &Path) {
    if let Err(e) = fs::remove_file(file).await {
        debug!(file = %file.display(), error = %e, "Could not delete sticker file");
    }
}
