//! Manifest download and parsing.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::proto::{parse_manifest, ManifestError};
use super::types::PackManifest;
use crate::cache::MissingPackSet;
use crate::cdn::{manifest_path, CdnTransport, RetryingDownloader};
use crate::gate::{CoalesceError, ConcurrencyGate, InFlightCoalescer};
use crate::identity::PackIdentity;

/// Downloads, decrypts and parses pack manifests.
///
/// Concurrent fetches of the same pack share one download, and all
/// manifest downloads pass through the pack concurrency gate.
pub struct PackManifestFetcher<T> {
    downloader: Arc<RetryingDownloader<T>>,
    gate: Arc<ConcurrencyGate>,
    missing: Arc<MissingPackSet>,
    in_flight: InFlightCoalescer<PackIdentity, Result<PackManifest, ManifestError>>,
}

impl<T: CdnTransport> PackManifestFetcher<T> {
    pub fn new(
        downloader: Arc<RetryingDownloader<T>>,
        gate: Arc<ConcurrencyGate>,
        missing: Arc<MissingPackSet>,
    ) -> Self {
        Self {
            downloader,
            gate,
            missing,
            in_flight: InFlightCoalescer::new(),
        }
    }

    /// Fetches the manifest of `identity`.
    ///
    /// A 404/410 response also records the pack in the missing set.
    pub async fn fetch(&self, identity: &PackIdentity) -> Result<PackManifest, ManifestError> {
        let downloader = Arc::clone(&self.downloader);
        let gate = Arc::clone(&self.gate);
        let missing = Arc::clone(&self.missing);
        let pack = identity.clone();

        self.in_flight
            .run_or_join(identity.clone(), move || async move {
                Self::download(&downloader, &gate, &missing, &pack).await
            })
            .await
            .map_err(|e| match e {
                CoalesceError::Abandoned => ManifestError::Abandoned,
            })?
    }

    async fn download(
        downloader: &RetryingDownloader<T>,
        gate: &ConcurrencyGate,
        missing: &MissingPackSet,
        identity: &PackIdentity,
    ) -> Result<PackManifest, ManifestError> {
        let path = manifest_path(identity);
        let limit = downloader.config().manifest_size_limit();
        debug!(pack = %identity, path = %path, "Fetching manifest");

        let bytes = gate
            .run(downloader.fetch_bytes(&path, identity.pack_key(), limit))
            .await
            .map_err(|e| {
                if e.is_permanently_absent() && missing.mark_missing(identity) {
                    info!(pack = %identity, "Pack is missing from the CDN");
                }
                e
            })?;

        let manifest = parse_manifest(identity, &bytes).map_err(|e| {
            warn!(pack = %identity, error = %e, "Manifest could not be parsed");
            e
        })?;
        debug!(
            pack = %identity,
            items = manifest.items.len(),
            "Manifest parsed"
        );
        Ok(manifest)
    }

    pub fn missing_packs(&self) -> &MissingPackSet {
        &self.missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CorruptKeyTracker;
    use crate::cdn::TransportError;
    use crate::config::DownloadConfig;
    use crate::crypto::{ContentCipher, StickerCipher};
    use crate::manifest::{encode_manifest, PackItem};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Answers every request with `body`. A `None` body panics mid-request.
    struct OneShot {
        body: Option<Result<Vec<u8>, TransportError>>,
        calls: AtomicUsize,
    }

    impl CdnTransport for OneShot {
        async fn get(&self, path: &str, _size_limit: u64) -> Result<Vec<u8>, TransportError> {
            assert!(path.ends_with("/manifest.proto"));
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            match &self.body {
                Some(body) => body.clone(),
                None => panic!("transport crashed"),
            }
        }
    }

    fn identity() -> PackIdentity {
        PackIdentity::new(vec![0xab, 0xcd], &[4u8; 32]).unwrap()
    }

    fn fetcher(
        dir: &TempDir,
        body: Result<Vec<u8>, TransportError>,
    ) -> (PackManifestFetcher<Arc<OneShot>>, Arc<OneShot>) {
        fetcher_answering(dir, Some(body))
    }

    fn fetcher_answering(
        dir: &TempDir,
        body: Option<Result<Vec<u8>, TransportError>>,
    ) -> (PackManifestFetcher<Arc<OneShot>>, Arc<OneShot>) {
        let transport = Arc::new(OneShot {
            body,
            calls: AtomicUsize::new(0),
        });
        let downloader = RetryingDownloader::new(
            Arc::clone(&transport),
            Arc::new(StickerCipher::new()),
            Arc::new(CorruptKeyTracker::new()),
            dir.path(),
            DownloadConfig::new().with_max_attempts(1),
        );
        let fetcher = PackManifestFetcher::new(
            Arc::new(downloader),
            Arc::new(ConcurrencyGate::new(3, "packs")),
            Arc::new(MissingPackSet::new()),
        );
        (fetcher, transport)
    }

    fn sealed_manifest(items: &[PackItem]) -> Vec<u8> {
        let plain = encode_manifest(Some("Title"), None, None, items);
        StickerCipher::new().encrypt(identity().pack_key(), &plain).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_parses_manifest() {
        let dir = TempDir::new().unwrap();
        let (fetcher, _) = fetcher(&dir, Ok(sealed_manifest(&[PackItem::new(0, "😀", "")])));

        let manifest = fetcher.fetch(&identity()).await.unwrap();
        assert_eq!(manifest.title.as_deref(), Some("Title"));
        assert_eq!(manifest.cover.index, 0);
        assert_eq!(manifest.identity, identity());
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_download() {
        let dir = TempDir::new().unwrap();
        let (fetcher, transport) = fetcher(&dir, Ok(sealed_manifest(&[PackItem::new(0, "", "")])));

        let (id_a, id_b) = (identity(), identity());
        let (a, b) = tokio::join!(fetcher.fetch(&id_a), fetcher.fetch(&id_b));
        assert_eq!(a.unwrap().items, b.unwrap().items);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_manifest_is_terminal() {
        let dir = TempDir::new().unwrap();
        let (fetcher, _) = fetcher(&dir, Ok(sealed_manifest(&[])));

        let err = fetcher.fetch(&identity()).await.unwrap_err();
        assert!(matches!(err, ManifestError::Empty));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_not_found_marks_pack_missing() {
        let dir = TempDir::new().unwrap();
        let (fetcher, _) = fetcher(&dir, Err(TransportError::Status(404)));

        let err = fetcher.fetch(&identity()).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(fetcher.missing_packs().is_missing(&identity()));
    }

    #[tokio::test]
    async fn test_server_error_does_not_mark_missing() {
        let dir = TempDir::new().unwrap();
        let (fetcher, _) = fetcher(&dir, Err(TransportError::Status(502)));

        let err = fetcher.fetch(&identity()).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!fetcher.missing_packs().is_missing(&identity()));
    }

    #[tokio::test]
    async fn test_abandoned_download_is_retryable() {
        let dir = TempDir::new().unwrap();
        let (fetcher, _) = fetcher_answering(&dir, None);

        let err = fetcher.fetch(&identity()).await.unwrap_err();
        assert_eq!(err, ManifestError::Abandoned);
        assert!(err.is_retryable());
        assert!(!fetcher.missing_packs().is_missing(&identity()));
    }
}
