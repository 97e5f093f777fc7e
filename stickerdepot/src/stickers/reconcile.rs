//! Background maintenance: default pack downloads, content completion and
//! orphan cleanup.

use futures::future::join_all;
use std::collections::HashMap;
use tracing::{info, warn};

use super::default_packs::{DefaultPack, DefaultPackRegistry};
use super::error::StickerError;
use super::install::{remove_sticker_records, ContentReport, InstallMode};
use super::manager::StickerManager;
use crate::cdn::CdnTransport;
use crate::identity::PackIdentity;
use crate::manifest::PackManifest;
use crate::store::{InstalledStickerRecord, ReadTransaction, StickerStore, StoreError};

/// What [`StickerManager::refresh_contents`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Default packs saved for the first time
    pub packs_downloaded: usize,
    pub stickers: ContentReport,
}

/// What [`StickerManager::cleanup_orphaned_data`] removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub packs_removed: usize,
    pub stickers_removed: usize,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        self.packs_removed == 0 && self.stickers_removed == 0
    }
}

struct Orphans {
    packs: Vec<PackIdentity>,
    stickers: Vec<InstalledStickerRecord>,
}

/// A pack is kept when it is installed or a default pack. A sticker is kept
/// when its pack is kept and either installed or the sticker is its cover.
fn find_orphans<Tx: ReadTransaction + ?Sized>(
    tx: &Tx,
    defaults: &DefaultPackRegistry,
) -> Result<Orphans, StoreError> {
    let mut kept: HashMap<Vec<u8>, PackManifest> = HashMap::new();
    let mut packs = Vec::new();
    for pack in tx.all_packs()? {
        if pack.is_installed || defaults.is_default(&pack.identity) {
            kept.insert(pack.identity.pack_id().to_vec(), pack);
        } else {
            packs.push(pack.identity);
        }
    }

    let stickers = tx
        .all_stickers()?
        .into_iter()
        .filter(|s| {
            !kept
                .get(s.identity.pack().pack_id())
                .is_some_and(|p| p.is_installed || p.is_cover(s.identity.index()))
        })
        .collect();

    Ok(Orphans { packs, stickers })
}

impl<S: StickerStore, T: CdnTransport> StickerManager<S, T> {
    /// Saves missing default packs, then completes the content of every
    /// saved pack: all items of installed packs and the cover of the rest.
    pub async fn refresh_contents(&self) -> Result<RefreshReport, StickerError> {
        let packs_downloaded = self.download_default_packs().await?;
        let stickers = self.ensure_downloads().await?;
        Ok(RefreshReport {
            packs_downloaded,
            stickers,
        })
    }

    /// Downloads every default pack that is not saved yet. Auto-install packs
    /// use [`InstallMode::InstallIfUnsaved`], so a pack the user uninstalled
    /// stays uninstalled.
    pub async fn download_default_packs(&self) -> Result<usize, StickerError> {
        let unsaved: Vec<DefaultPack> = self.read(|tx| {
            let mut unsaved = Vec::new();
            for pack in self.defaults.packs() {
                if tx.pack(&pack.identity)?.is_none() {
                    unsaved.push(pack.clone());
                }
            }
            Ok(unsaved)
        })?;

        let results = join_all(unsaved.iter().map(|pack| {
            let mode = if pack.auto_install {
                InstallMode::InstallIfUnsaved
            } else {
                InstallMode::DoNotInstall
            };
            self.download_and_save(&pack.identity, mode)
        }))
        .await;

        // Failures are already logged by download_and_save.
        Ok(results.iter().filter(|r| r.is_ok()).count())
    }

    /// Completes the content of every saved pack.
    pub async fn ensure_downloads(&self) -> Result<ContentReport, StickerError> {
        let packs = self.read(|tx| Ok(tx.all_packs()?))?;
        let reports = join_all(
            packs
                .iter()
                .map(|pack| self.install_pack_contents(pack, !pack.is_installed)),
        )
        .await;

        let mut total = ContentReport::default();
        for report in reports {
            total.merge(report);
        }
        Ok(total)
    }

    /// Whether any pack or sticker record violates the keep rules.
    pub fn has_orphaned_data(&self) -> Result<bool, StickerError> {
        let orphans = self.read(|tx| Ok(find_orphans(tx, &self.defaults)?))?;
        Ok(!orphans.packs.is_empty() || !orphans.stickers.is_empty())
    }

    /// Removes orphaned packs and stickers. Orphans are re-derived inside the
    /// write transaction, so running this repeatedly or concurrently with
    /// installs is safe.
    pub fn cleanup_orphaned_data(&self) -> Result<CleanupReport, StickerError> {
        let report = self.write(|tx| {
            let orphans = find_orphans(&*tx, &self.defaults)?;
            for pack in &orphans.packs {
                tx.delete_pack(pack)?;
            }
            let recents_changed = remove_sticker_records(tx, &orphans.stickers)?;

            let report = CleanupReport {
                packs_removed: orphans.packs.len(),
                stickers_removed: orphans.stickers.len(),
            };
            if !report.is_empty() {
                tx.after_commit(self.removal_hook(
                    &orphans.stickers,
                    recents_changed,
                    report.packs_removed > 0,
                ));
            }
            Ok(report)
        })?;

        if !report.is_empty() {
            warn!(
                packs = report.packs_removed,
                stickers = report.stickers_removed,
                "Removed orphaned sticker data"
            );
        }
        Ok(report)
    }

    /// Deletes leftover download scratch files.
    ///
    /// Only call while no download is running.
    pub async fn purge_scratch(&self) -> Result<usize, StickerError> {
        let removed = self
            .downloader
            .purge_scratch()
            .await
            .map_err(|e| StickerError::io("failed to purge", self.downloader.scratch_dir(), e))?;
        if removed > 0 {
            info!(files = removed, "Purged download scratch files");
        }
        Ok(removed)
    }
}
