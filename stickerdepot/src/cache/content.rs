//! Bounded LRU of sticker key → local file.
//!
//! Recency is a monotonically increasing tick per entry; an ordered map
//! from tick to key finds the least recently used entry in O(log n).
//! A hit whose file has disappeared from disk is treated as a miss.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::trace;

struct Slot {
    path: PathBuf,
    tick: u64,
}

#[derive(Default)]
struct LruState {
    entries: HashMap<String, Slot>,
    order: BTreeMap<u64, String>,
    next_tick: u64,
}

impl LruState {
    fn touch(&mut self, key: &str) -> Option<PathBuf> {
        let tick = self.next_tick;
        let slot = self.entries.get_mut(key)?;
        self.order.remove(&slot.tick);
        slot.tick = tick;
        self.order.insert(tick, key.to_string());
        self.next_tick += 1;
        Some(slot.path.clone())
    }

    fn remove(&mut self, key: &str) -> Option<PathBuf> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.tick);
        Some(slot.path)
    }

    fn pop_oldest(&mut self) -> Option<(String, PathBuf)> {
        let (_, key) = self.order.pop_first()?;
        let slot = self.entries.remove(&key)?;
        Some((key, slot.path))
    }
}

/// Thread-safe LRU cache of locally available sticker files.
pub struct ContentCache {
    capacity: usize,
    state: Mutex<LruState>,
}

impl ContentCache {
    /// Creates a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(LruState::default()),
        }
    }

    /// Returns the cached file for `key` and marks it most recently used.
    ///
    /// Returns `None` if the key was never cached, was evicted, or its file
    /// no longer exists.
    pub async fn get(&self, key: &str) -> Option<PathBuf> {
        let path = self.state.lock().touch(key)?;
        if fs::try_exists(&path).await.unwrap_or(false) {
            return Some(path);
        }

        trace!(key, path = %path.display(), "Cached sticker file vanished");
        let mut state = self.state.lock();
        if state.entries.get(key).is_some_and(|slot| slot.path == path) {
            state.remove(key);
        }
        None
    }

    /// Caches `path` for `key`, evicting the least recently used entry when
    /// full. Returns the evicted key and file, if any. The evicted file is
    /// left on disk.
    pub fn put(&self, key: &str, path: impl AsRef<Path>) -> Option<(String, PathBuf)> {
        let mut state = self.state.lock();
        state.remove(key);

        let tick = state.next_tick;
        state.next_tick += 1;
        state.entries.insert(
            key.to_string(),
            Slot {
                path: path.as_ref().to_path_buf(),
                tick,
            },
        );
        state.order.insert(tick, key.to_string());

        if state.entries.len() > self.capacity {
            let evicted = state.pop_oldest();
            trace!(evicted = ?evicted.as_ref().map(|(key, _)| key), "Evicted sticker file from LRU");
            evicted
        } else {
            None
        }
    }

    /// Forgets `key`. The file itself is untouched.
    pub fn remove(&self, key: &str) -> Option<PathBuf> {
        self.state.lock().remove(key)
    }

    /// Whether `key` is cached, without refreshing recency or checking disk.
    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.order.clear();
    }
}
