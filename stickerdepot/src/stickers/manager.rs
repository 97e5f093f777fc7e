//! The sticker manager: construction, queries and sticker fetches.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

use super::default_packs::DefaultPackRegistry;
use super::error::StickerError;
use super::install::delete_files;
use super::notify::{ChangeNotifier, Subscription};
use crate::cache::{ContentCache, CorruptKeyTracker, MissingPackSet};
use crate::cdn::{sticker_path, CdnTransport, RetryingDownloader};
use crate::config::ManagerConfig;
use crate::crypto::{ContentCipher, StickerCipher};
use crate::gate::{ConcurrencyGate, InFlightCoalescer};
use crate::identity::{PackIdentity, StickerIdentity};
use crate::manifest::{PackManifest, PackManifestFetcher};
use crate::store::{InstalledStickerRecord, ReadTransaction, StickerStore, WriteTransaction};

/// Downloads, installs and tracks sticker packs.
///
/// All network access goes through two gates: one for manifests and one for
/// sticker content. Concurrent requests for the same manifest or sticker
/// share a single download.
pub struct StickerManager<S, T> {
    pub(super) store: Arc<S>,
    pub(super) downloader: Arc<RetryingDownloader<T>>,
    pub(super) manifests: PackManifestFetcher<T>,
    pub(super) pack_gate: Arc<ConcurrencyGate>,
    pub(super) sticker_gate: Arc<ConcurrencyGate>,
    pub(super) downloads: InFlightCoalescer<StickerIdentity, Result<PathBuf, StickerError>>,
    pub(super) cache: Arc<ContentCache>,
    pub(super) missing: Arc<MissingPackSet>,
    pub(super) defaults: DefaultPackRegistry,
    pub(super) notifier: Arc<ChangeNotifier>,
    pub(super) config: ManagerConfig,
}

impl<S: StickerStore, T: CdnTransport> StickerManager<S, T> {
    /// Creates a manager with the standard cipher and the builtin default
    /// packs.
    pub fn new(store: Arc<S>, transport: T, config: ManagerConfig) -> Self {
        Self::with_parts(
            store,
            transport,
            Arc::new(StickerCipher::new()),
            DefaultPackRegistry::builtin(),
            config,
        )
    }

    pub fn with_parts(
        store: Arc<S>,
        transport: T,
        cipher: Arc<dyn ContentCipher>,
        defaults: DefaultPackRegistry,
        config: ManagerConfig,
    ) -> Self {
        let download = *config.download();
        let corrupt = Arc::new(CorruptKeyTracker::new());
        let missing = Arc::new(MissingPackSet::new());
        let downloader = Arc::new(RetryingDownloader::new(
            transport,
            cipher,
            corrupt,
            config.scratch_dir(),
            download,
        ));
        let pack_gate = Arc::new(ConcurrencyGate::new(download.pack_concurrency(), "packs"));
        let sticker_gate = Arc::new(ConcurrencyGate::new(
            download.sticker_concurrency(),
            "stickers",
        ));
        let manifests = PackManifestFetcher::new(
            Arc::clone(&downloader),
            Arc::clone(&pack_gate),
            Arc::clone(&missing),
        );

        Self {
            store,
            downloader,
            manifests,
            pack_gate,
            sticker_gate,
            downloads: InFlightCoalescer::new(),
            cache: Arc::new(ContentCache::new(config.lru_capacity())),
            missing,
            defaults,
            notifier: Arc::new(ChangeNotifier::new(config.debounce())),
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn defaults(&self) -> &DefaultPackRegistry {
        &self.defaults
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    pub fn corrupt_keys(&self) -> &CorruptKeyTracker {
        self.downloader.corrupt_keys()
    }

    pub fn pack_gate(&self) -> &ConcurrencyGate {
        &self.pack_gate
    }

    pub fn sticker_gate(&self) -> &ConcurrencyGate {
        &self.sticker_gate
    }

    /// Subscribes to change notifications.
    pub fn subscribe(&self) -> Subscription {
        self.notifier.subscribe()
    }

    pub(super) fn read<R>(
        &self,
        f: impl FnOnce(&dyn ReadTransaction) -> Result<R, StickerError>,
    ) -> Result<R, StickerError> {
        self.store.read(f)
    }

    pub(super) fn write<R>(
        &self,
        f: impl FnOnce(&mut dyn WriteTransaction) -> Result<R, StickerError>,
    ) -> Result<R, StickerError> {
        self.store.write(f)
    }

    // Packs

    /// The saved manifest of `identity`, if any.
    pub fn pack(&self, identity: &PackIdentity) -> Result<Option<PackManifest>, StickerError> {
        self.read(|tx| Ok(tx.pack(identity)?))
    }

    pub fn is_pack_saved(&self, identity: &PackIdentity) -> Result<bool, StickerError> {
        Ok(self.pack(identity)?.is_some())
    }

    pub fn is_installed(&self, identity: &PackIdentity) -> Result<bool, StickerError> {
        Ok(self.pack(identity)?.is_some_and(|p| p.is_installed))
    }

    pub fn is_default_pack(&self, identity: &PackIdentity) -> bool {
        self.defaults.is_default(identity)
    }

    /// Whether the CDN reported this pack as permanently absent during this
    /// session.
    pub fn is_pack_missing(&self, identity: &PackIdentity) -> bool {
        self.missing.is_missing(identity)
    }

    /// Installed packs, newest first.
    pub fn installed_packs(&self) -> Result<Vec<PackManifest>, StickerError> {
        self.packs_where(|p| p.is_installed)
    }

    /// Saved packs that are not installed, newest first.
    pub fn available_packs(&self) -> Result<Vec<PackManifest>, StickerError> {
        self.packs_where(|p| !p.is_installed)
    }

    fn packs_where(
        &self,
        keep: impl Fn(&PackManifest) -> bool,
    ) -> Result<Vec<PackManifest>, StickerError> {
        let mut packs: Vec<_> = self
            .read(|tx| Ok(tx.all_packs()?))?
            .into_iter()
            .filter(|p| keep(p))
            .collect();
        packs.sort_by(|a, b| b.date_created.cmp(&a.date_created));
        Ok(packs)
    }

    /// Downloads a manifest without saving it, for previewing a pack.
    pub async fn download_pack(&self, identity: &PackIdentity) -> Result<PackManifest, StickerError> {
        Ok(self.manifests.fetch(identity).await?)
    }

    // Stickers

    pub fn is_sticker_installed(&self, sticker: &StickerIdentity) -> Result<bool, StickerError> {
        self.read(|tx| Ok(tx.sticker(sticker)?.is_some()))
    }

    /// Installed stickers of `pack` in index order. With `verify_exists`,
    /// stickers whose file is gone are left out.
    pub fn installed_stickers(
        &self,
        pack: &PackIdentity,
        verify_exists: bool,
    ) -> Result<Vec<InstalledStickerRecord>, StickerError> {
        let records = self.read(|tx| Ok(tx.stickers_in_pack(pack)?))?;
        if !verify_exists {
            return Ok(records);
        }
        let dir = self.config.stickers_dir();
        Ok(records
            .into_iter()
            .filter(|r| r.file_path(&dir).is_file())
            .collect())
    }

    /// The file of an installed sticker, if the record and the file exist.
    pub async fn installed_sticker_file(
        &self,
        sticker: &StickerIdentity,
    ) -> Result<Option<PathBuf>, StickerError> {
        let Some(record) = self.read(|tx| Ok(tx.sticker(sticker)?))? else {
            return Ok(None);
        };
        let file = record.file_path(&self.config.stickers_dir());
        let exists = fs::try_exists(&file).await.unwrap_or(false);
        Ok(exists.then_some(file))
    }

    /// Returns a local file holding the decrypted sticker.
    ///
    /// Served from the content cache, then from the installed file, and
    /// otherwise downloaded. Concurrent calls for one sticker share a single
    /// download.
    pub async fn fetch_sticker(&self, sticker: &StickerIdentity) -> Result<PathBuf, StickerError> {
        let key = sticker.key();
        if let Some(path) = self.cache.get(&key).await {
            return Ok(path);
        }
        if let Some(path) = self.installed_sticker_file(sticker).await? {
            self.remember(&key, &path);
            return Ok(path);
        }
        self.download_sticker(sticker).await
    }

    /// Fetches sticker content from the CDN unless it is cached.
    ///
    /// A fresh download lives in the scratch directory until it is installed
    /// or evicted from the content cache.
    pub(super) async fn download_sticker(
        &self,
        sticker: &StickerIdentity,
    ) -> Result<PathBuf, StickerError> {
        let key = sticker.key();
        if let Some(path) = self.cache.get(&key).await {
            return Ok(path);
        }

        let downloader = Arc::clone(&self.downloader);
        let gate = Arc::clone(&self.sticker_gate);
        let cache = Arc::clone(&self.cache);
        let scratch = self.config.scratch_dir();
        let path = sticker_path(sticker);
        let pack_key = *sticker.pack().pack_key();
        let limit = self.config.download().sticker_size_limit();

        self.downloads
            .run_or_join(sticker.clone(), move || async move {
                debug!(sticker = %key, "Downloading sticker");
                let file = gate.run(downloader.fetch(&path, &pack_key, limit)).await?;
                remember(&cache, &scratch, &key, &file);
                Ok::<_, StickerError>(file)
            })
            .await?
    }

    /// Caches `file` for `key`.
    pub(super) fn remember(&self, key: &str, file: &Path) {
        remember(&self.cache, &self.config.scratch_dir(), key, file);
    }
}

/// Caches `file` for `key`. An evicted download that was never installed is
/// deleted; installed files stay.
fn remember(cache: &ContentCache, scratch: &Path, key: &str, file: &Path) {
    if let Some((evicted, path)) = cache.put(key, file) {
        if path.starts_with(scratch) {
            debug!(sticker = %evicted, "Deleting evicted download");
            delete_files(vec![path]);
        }
    }
}
