//! Retrying, decrypting CDN downloader.
//!
//! One call to [`RetryingDownloader::fetch`]:
//!
//! 1. Refuses resources recorded in the [`CorruptKeyTracker`].
//! 2. Issues up to `max_attempts` GETs, backing off exponentially after
//!    retryable failures.
//! 3. Writes the ciphertext to a scratch `.part` file and renames it into
//!    place.
//! 4. Decrypts on a blocking worker. Integrity failures poison the key.
//! 5. Writes the plaintext the same way and returns its path.
//!
//! Only transport failures can be retryable; local I/O and decryption
//! failures are always terminal.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::transport::{CdnTransport, TransportError};
use crate::cache::CorruptKeyTracker;
use crate::config::DownloadConfig;
use crate::crypto::{CipherError, ContentCipher};
use crate::identity::PACK_KEY_LENGTH;

/// Download failures. `Clone` so one result can reach every coalesced
/// caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    /// Network request failed after all permitted attempts
    #[error("download of {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: TransportError,
    },

    /// Resource failed an integrity check earlier in this session or now
    #[error("{path} is corrupt")]
    Corrupt { path: String },

    /// Local filesystem failure
    #[error("local file operation failed: {0}")]
    Io(String),

    /// Decryption failed for a reason other than integrity
    #[error("decryption failed: {0}")]
    Decrypt(CipherError),
}

impl DownloadError {
    /// Whether a later attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { source, .. } => source.is_retryable(),
            Self::Corrupt { .. } | Self::Io(_) | Self::Decrypt(_) => false,
        }
    }

    /// Whether the CDN reported the resource as permanently absent.
    pub fn is_permanently_absent(&self) -> bool {
        matches!(self, Self::Transport { source, .. } if source.is_permanently_absent())
    }

    fn io(context: &str, path: &Path, error: io::Error) -> Self {
        Self::Io(format!("{context} {}: {error}", path.display()))
    }
}

/// Fetches and decrypts CDN resources into a scratch directory.
pub struct RetryingDownloader<T> {
    transport: T,
    cipher: Arc<dyn ContentCipher>,
    corrupt: Arc<CorruptKeyTracker>,
    scratch_dir: PathBuf,
    config: DownloadConfig,
}

impl<T: CdnTransport> RetryingDownloader<T> {
    pub fn new(
        transport: T,
        cipher: Arc<dyn ContentCipher>,
        corrupt: Arc<CorruptKeyTracker>,
        scratch_dir: impl Into<PathBuf>,
        config: DownloadConfig,
    ) -> Self {
        Self {
            transport,
            cipher,
            corrupt,
            scratch_dir: scratch_dir.into(),
            config,
        }
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    pub fn corrupt_keys(&self) -> &CorruptKeyTracker {
        &self.corrupt
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Downloads and decrypts `path`, returning the plaintext scratch file.
    ///
    /// The caller owns the returned file and is expected to move or delete
    /// it.
    #[instrument(skip_all, fields(path = %path))]
    pub async fn fetch(
        &self,
        path: &str,
        pack_key: &[u8; PACK_KEY_LENGTH],
        size_limit: u64,
    ) -> Result<PathBuf, DownloadError> {
        if self.corrupt.is_corrupt(path) {
            debug!("Refusing known corrupt resource");
            return Err(DownloadError::Corrupt {
                path: path.to_string(),
            });
        }

        let body = self.download_with_retries(path, size_limit).await?;

        fs::create_dir_all(&self.scratch_dir)
            .await
            .map_err(|e| DownloadError::io("failed to create", &self.scratch_dir, e))?;

        let id = Uuid::new_v4();
        let sealed = self.scratch_dir.join(format!("{id}.enc"));
        self.write_atomically(&sealed, &body).await?;
        drop(body);

        let plaintext = self.decrypt_file(path, &sealed, pack_key).await;
        let _ = fs::remove_file(&sealed).await;
        let plaintext = plaintext?;

        let output = self.scratch_dir.join(format!("{id}.dat"));
        self.write_atomically(&output, &plaintext).await?;
        debug!(bytes = plaintext.len(), "Downloaded and decrypted");
        Ok(output)
    }

    /// Like [`fetch`](Self::fetch) but returns the plaintext bytes and removes
    /// the scratch file.
    pub async fn fetch_bytes(
        &self,
        path: &str,
        pack_key: &[u8; PACK_KEY_LENGTH],
        size_limit: u64,
    ) -> Result<Vec<u8>, DownloadError> {
        let file = self.fetch(path, pack_key, size_limit).await?;
        let bytes = fs::read(&file)
            .await
            .map_err(|e| DownloadError::io("failed to read", &file, e));
        let _ = fs::remove_file(&file).await;
        bytes
    }

    /// Deletes leftover scratch files from interrupted downloads.
    ///
    /// Only call while no download is running.
    pub async fn purge_scratch(&self) -> io::Result<usize> {
        let mut entries = match fs::read_dir(&self.scratch_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            if fs::remove_file(entry.path()).await.is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn download_with_retries(
        &self,
        path: &str,
        size_limit: u64,
    ) -> Result<Vec<u8>, DownloadError> {
        let max_attempts = self.config.max_attempts();
        let mut attempt = 1;
        loop {
            match self.transport.get(path, size_limit).await {
                Ok(body) => return Ok(body),
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    let delay = self.config.backoff_for_attempt(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        error = %error,
                        delay_ms = delay.as_millis() as u64,
                        "Download failed, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    warn!(attempt, error = %error, "Download failed");
                    return Err(DownloadError::Transport {
                        path: path.to_string(),
                        source: error,
                    });
                }
            }
        }
    }

    async fn write_atomically(&self, target: &Path, bytes: &[u8]) -> Result<(), DownloadError> {
        let part = target.with_extension("part");
        if let Err(e) = fs::write(&part, bytes).await {
            let _ = fs::remove_file(&part).await;
            return Err(DownloadError::io("failed to write", &part, e));
        }
        fs::rename(&part, target)
            .await
            .map_err(|e| DownloadError::io("failed to move", target, e))
    }

    async fn decrypt_file(
        &self,
        path: &str,
        sealed: &Path,
        pack_key: &[u8; PACK_KEY_LENGTH],
    ) -> Result<Vec<u8>, DownloadError> {
        let ciphertext = fs::read(sealed)
            .await
            .map_err(|e| DownloadError::io("failed to read", sealed, e))?;

        let cipher = Arc::clone(&self.cipher);
        let key = *pack_key;
        let result = tokio::task::spawn_blocking(move || cipher.decrypt(&key, &ciphertext))
            .await
            .map_err(|e| DownloadError::Io(format!("decrypt task failed: {e}")))?;

        match result {
            Ok(plaintext) => Ok(plaintext),
            Err(CipherError::Integrity) => {
                self.corrupt.mark_corrupt(path);
                Err(DownloadError::Corrupt {
                    path: path.to_string(),
                })
            }
            Err(other) => Err(DownloadError::Decrypt(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::StickerCipher;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    const KEY: [u8; 32] = [5u8; 32];

    /// Replays scripted responses and counts calls.
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<Vec<u8>, TransportError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<Vec<u8>, TransportError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl CdnTransport for ScriptedTransport {
        async fn get(&self, _path: &str, size_limit: u64) -> Result<Vec<u8>, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .responses
                .lock()
                .pop_front()
                .unwrap_or(Err(TransportError::Status(404)));
            match next {
                Ok(body) if body.len() as u64 > size_limit => {
                    Err(TransportError::TooLarge { limit: size_limit })
                }
                other => other,
            }
        }
    }

    fn sealed(plaintext: &[u8]) -> Vec<u8> {
        StickerCipher::new().encrypt(&KEY, plaintext).unwrap()
    }

    fn downloader(
        dir: &TempDir,
        responses: Vec<Result<Vec<u8>, TransportError>>,
    ) -> RetryingDownloader<Arc<ScriptedTransport>> {
        RetryingDownloader::new(
            Arc::new(ScriptedTransport::new(responses)),
            Arc::new(StickerCipher::new()),
            Arc::new(CorruptKeyTracker::new()),
            dir.path().join("tmp"),
            DownloadConfig::new().with_backoff_base(Duration::from_millis(1)),
        )
    }

    #[tokio::test]
    async fn test_fetch_decrypts_into_scratch_file() {
        let dir = TempDir::new().unwrap();
        let downloader = downloader(&dir, vec![Ok(sealed(b"webp bytes"))]);

        let file = downloader.fetch("stickers/aa/full/0", &KEY, 1024).await.unwrap();

        assert!(file.starts_with(dir.path().join("tmp")));
        assert_eq!(std::fs::read(&file).unwrap(), b"webp bytes");
        // Only the plaintext remains in scratch.
        assert_eq!(std::fs::read_dir(dir.path().join("tmp")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let dir = TempDir::new().unwrap();
        let downloader = downloader(
            &dir,
            vec![
                Err(TransportError::Timeout),
                Err(TransportError::Status(503)),
                Ok(sealed(b"ok")),
            ],
        );

        let bytes = downloader.fetch_bytes("p", &KEY, 1024).await.unwrap();
        assert_eq!(bytes, b"ok");
        assert_eq!(downloader.transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let dir = TempDir::new().unwrap();
        let downloader = downloader(
            &dir,
            vec![
                Err(TransportError::Timeout),
                Err(TransportError::Timeout),
                Err(TransportError::Timeout),
                Err(TransportError::Timeout),
                Ok(sealed(b"too late")),
            ],
        );

        let err = downloader.fetch("p", &KEY, 1024).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(downloader.transport.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_not_found_is_terminal_without_retry() {
        let dir = TempDir::new().unwrap();
        let downloader = downloader(&dir, vec![Err(TransportError::Status(404))]);

        let err = downloader.fetch("p", &KEY, 1024).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.is_permanently_absent());
        assert_eq!(downloader.transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_oversized_response_is_terminal() {
        let dir = TempDir::new().unwrap();
        let downloader = downloader(&dir, vec![Ok(vec![0u8; 64]), Ok(vec![0u8; 8])]);

        let err = downloader.fetch("p", &KEY, 32).await.unwrap_err();
        assert!(matches!(
            err,
            DownloadError::Transport {
                source: TransportError::TooLarge { limit: 32 },
                ..
            }
        ));
        assert_eq!(downloader.transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_corrupt_payload_poisons_key() {
        let dir = TempDir::new().unwrap();
        let mut bad = sealed(b"sticker");
        bad[20] ^= 0xff;
        let downloader = downloader(&dir, vec![Ok(bad), Ok(sealed(b"sticker"))]);

        let first = downloader.fetch("k", &KEY, 1024).await.unwrap_err();
        assert_eq!(first, DownloadError::Corrupt { path: "k".into() });

        let second = downloader.fetch("k", &KEY, 1024).await.unwrap_err();
        assert_eq!(second, first);
        assert_eq!(downloader.transport.calls.load(Ordering::SeqCst), 1);
        assert!(downloader.corrupt_keys().is_corrupt("k"));
        assert!(!first.is_retryable());
    }

    #[tokio::test]
    async fn test_unwritable_scratch_is_terminal() {
        let dir = TempDir::new().unwrap();
        // A file where the scratch directory should be.
        std::fs::write(dir.path().join("tmp"), b"").unwrap();
        let downloader = downloader(&dir, vec![Ok(sealed(b"x")), Ok(sealed(b"x"))]);

        let err = downloader.fetch("p", &KEY, 1024).await.unwrap_err();
        assert!(matches!(err, DownloadError::Io(_)));
        assert!(!err.is_retryable());
        assert_eq!(downloader.transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_purge_scratch() {
        let dir = TempDir::new().unwrap();
        let downloader = downloader(&dir, vec![]);
        assert_eq!(downloader.purge_scratch().await.unwrap(), 0);

        std::fs::create_dir_all(dir.path().join("tmp")).unwrap();
        std::fs::write(dir.path().join("tmp/a.part"), b"").unwrap();
        std::fs::write(dir.path().join("tmp/b.dat"), b"").unwrap();
        assert_eq!(downloader.purge_scratch().await.unwrap(), 2);
    }
}
