//! Shared fixtures for the integration tests: an instrumented in-memory CDN
//! and helpers to publish encrypted packs on it.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stickerdepot::cdn::{manifest_path, sticker_path, CdnTransport, TransportError};
use stickerdepot::config::{DownloadConfig, ManagerConfig};
use stickerdepot::crypto::{ContentCipher, StickerCipher};
use stickerdepot::identity::PackIdentity;
use stickerdepot::manifest::{encode_manifest, PackItem};
use stickerdepot::stickers::{DefaultPackRegistry, StickerManager};
use stickerdepot::store::StickerStore;

// =============================================================================
// Fake CDN
// =============================================================================

/// In-memory CDN that serves encrypted resources and records every request.
pub struct FakeCdn {
    resources: Mutex<HashMap<String, Vec<u8>>>,
    failures: Mutex<HashMap<String, TransportError>>,
    log: Mutex<Vec<String>>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeCdn {
    pub fn new() -> Arc<Self> {
        Self::with_delay(Duration::from_millis(5))
    }

    /// Every request sleeps `delay` before answering.
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            resources: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
            delay,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn put_raw(&self, path: &str, body: Vec<u8>) {
        self.resources.lock().insert(path.to_string(), body);
    }

    /// Makes every request for `path` fail with `error` until cleared.
    pub fn fail(&self, path: &str, error: TransportError) {
        self.failures.lock().insert(path.to_string(), error);
    }

    pub fn clear_failure(&self, path: &str) {
        self.failures.lock().remove(path);
    }

    /// Request log, with `start:` and `end:` entries per request.
    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Number of requests made for `path`.
    pub fn requests_for(&self, path: &str) -> usize {
        let start = format!("start:{path}");
        self.log.lock().iter().filter(|e| **e == start).count()
    }

    pub fn total_requests(&self) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|e| e.starts_with("start:"))
            .count()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn answer(&self, path: &str, size_limit: u64) -> Result<Vec<u8>, TransportError> {
        if let Some(error) = self.failures.lock().get(path) {
            return Err(error.clone());
        }
        let body = self
            .resources
            .lock()
            .get(path)
            .cloned()
            .ok_or(TransportError::Status(404))?;
        if body.len() as u64 > size_limit {
            return Err(TransportError::TooLarge { limit: size_limit });
        }
        Ok(body)
    }
}

impl CdnTransport for FakeCdn {
    async fn get(&self, path: &str, size_limit: u64) -> Result<Vec<u8>, TransportError> {
        self.log.lock().push(format!("start:{path}"));
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        let result = self.answer(path, size_limit);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.log.lock().push(format!("end:{path}"));
        result
    }
}

// =============================================================================
// Pack fixtures
// =============================================================================

/// A pack to publish on the fake CDN.
pub struct PackFixture {
    pub identity: PackIdentity,
    pub cover: PackItem,
    pub items: Vec<PackItem>,
}

const EMOJI: [&str; 3] = ["😀", "😀🎉", "🎉"];

impl PackFixture {
    /// A pack with `count` webp items. Item 0 is the cover.
    pub fn new(seed: u8, count: u32) -> Self {
        let identity = PackIdentity::new(vec![0xA0, seed], &[seed; 32]).unwrap();
        let items: Vec<PackItem> = (0..count)
            .map(|i| PackItem::new(i, EMOJI[i as usize % EMOJI.len()], "image/webp"))
            .collect();
        Self {
            identity,
            cover: items[0].clone(),
            items,
        }
    }

    pub fn manifest_path(&self) -> String {
        manifest_path(&self.identity)
    }

    pub fn sticker_path(&self, index: u32) -> String {
        sticker_path(&self.identity.sticker(index))
    }

    /// Plaintext of sticker `index`.
    pub fn sticker_body(&self, index: u32) -> Vec<u8> {
        format!("sticker {}/{index}", self.identity.pack_id_hex()).into_bytes()
    }

    /// Encrypts and uploads the manifest and every sticker.
    pub fn publish(&self, cdn: &FakeCdn) {
        let cipher = StickerCipher::new();
        let key = self.identity.pack_key();

        let manifest = encode_manifest(Some("Fixture"), Some("Tests"), Some(&self.cover), &self.items);
        cdn.put_raw(&self.manifest_path(), cipher.encrypt(key, &manifest).unwrap());

        for item in &self.items {
            let body = cipher.encrypt(key, &self.sticker_body(item.index)).unwrap();
            cdn.put_raw(&self.sticker_path(item.index), body);
        }
    }
}

// =============================================================================
// Manager construction
// =============================================================================

/// Fast retries and no debouncing.
pub fn test_config(dir: &Path) -> ManagerConfig {
    ManagerConfig::new(dir)
        .with_download(
            DownloadConfig::new()
                .with_max_attempts(2)
                .with_backoff_base(Duration::from_millis(1)),
        )
        .with_debounce(Duration::ZERO)
}

pub fn manager<S: StickerStore>(
    store: Arc<S>,
    cdn: &Arc<FakeCdn>,
    config: ManagerConfig,
    defaults: DefaultPackRegistry,
) -> Arc<StickerManager<S, Arc<FakeCdn>>> {
    Arc::new(StickerManager::with_parts(
        store,
        Arc::clone(cdn),
        Arc::new(StickerCipher::new()),
        defaults,
        config,
    ))
}

/// Polls until `path` no longer exists. Sticker files are deleted on a
/// background task after commit.
pub async fn wait_until_deleted(path: &Path) -> bool {
    for _ in 0..100 {
        if !path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
