//! SQLite-backed store.
//!
//! One connection guarded by a mutex; each `write` is one SQLite
//! transaction. The database runs in WAL mode so a crash never leaves a
//! half-applied transaction behind.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::error::StoreError;
use super::records::{InstalledStickerRecord, PendingDownloadRecord};
use super::traits::{run_hooks, CommitHook, ReadTransaction, StickerStore, WriteTransaction};
use crate::identity::{PackIdentity, StickerIdentity};
use crate::manifest::{PackItem, PackManifest};
use crate::time::{from_millis, to_millis};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sticker_packs (
    pack_id      TEXT PRIMARY KEY,
    pack_key     TEXT NOT NULL,
    title        TEXT,
    author       TEXT,
    cover        TEXT NOT NULL,
    items        TEXT NOT NULL,
    is_installed INTEGER NOT NULL,
    date_created INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS installed_stickers (
    sticker_key   TEXT PRIMARY KEY,
    pack_id       TEXT NOT NULL,
    pack_key      TEXT NOT NULL,
    sticker_index INTEGER NOT NULL,
    content_type  TEXT NOT NULL,
    emoji_hint    TEXT
);
CREATE INDEX IF NOT EXISTS installed_stickers_by_pack ON installed_stickers (pack_id);
CREATE TABLE IF NOT EXISTS string_lists (
    name  TEXT PRIMARY KEY,
    items TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS pending_pack_downloads (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    pack_id     TEXT NOT NULL,
    pack_key    TEXT NOT NULL,
    enqueued_at INTEGER NOT NULL
);
"#;

/// Durable store in a SQLite database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(mode = %mode, "Journal mode set");
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        let store = Self::init(conn, Some(path.to_path_buf()))?;
        info!(path = %path.display(), "Opened sticker database");
        Ok(store)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl StickerStore for SqliteStore {
    fn read<R, E, F>(&self, f: F) -> Result<R, E>
    where
        E: From<StoreError>,
        F: FnOnce(&dyn ReadTransaction) -> Result<R, E>,
    {
        let conn = self.conn.lock();
        f(&SqliteReader { conn: &conn })
    }

    fn write<R, E, F>(&self, f: F) -> Result<R, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut dyn WriteTransaction) -> Result<R, E>,
    {
        let (value, hooks) = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction().map_err(StoreError::from)?;
            let mut writer = SqliteWriter {
                tx,
                hooks: Vec::new(),
            };
            let value = f(&mut writer)?;
            let SqliteWriter { tx, hooks } = writer;
            tx.commit().map_err(StoreError::from)?;
            (value, hooks)
        };
        if !hooks.is_empty() {
            debug!(hooks = hooks.len(), "Running post-commit hooks");
        }
        run_hooks(hooks);
        Ok(value)
    }
}

struct SqliteReader<'a> {
    conn: &'a Connection,
}

struct SqliteWriter<'a> {
    tx: rusqlite::Transaction<'a>,
    hooks: Vec<CommitHook>,
}

fn corrupt(table: &'static str, reason: impl ToString) -> StoreError {
    StoreError::CorruptRow {
        table,
        reason: reason.to_string(),
    }
}

fn identity_from_hex(table: &'static str, id: &str, key: &str) -> Result<PackIdentity, StoreError> {
    PackIdentity::from_hex(id, key).map_err(|e| corrupt(table, e))
}

struct PackRow {
    pack_id: String,
    pack_key: String,
    title: Option<String>,
    author: Option<String>,
    cover: String,
    items: String,
    is_installed: bool,
    date_created: i64,
}

impl PackRow {
    const COLUMNS: &'static str =
        "pack_id, pack_key, title, author, cover, items, is_installed, date_created";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            pack_id: row.get(0)?,
            pack_key: row.get(1)?,
            title: row.get(2)?,
            author: row.get(3)?,
            cover: row.get(4)?,
            items: row.get(5)?,
            is_installed: row.get(6)?,
            date_created: row.get(7)?,
        })
    }

    fn into_manifest(self) -> Result<PackManifest, StoreError> {
        const TABLE: &str = "sticker_packs";
        let cover: PackItem = serde_json::from_str(&self.cover).map_err(|e| corrupt(TABLE, e))?;
        let items: Vec<PackItem> =
            serde_json::from_str(&self.items).map_err(|e| corrupt(TABLE, e))?;
        if items.is_empty() {
            return Err(corrupt(TABLE, "pack has no items"));
        }
        Ok(PackManifest {
            identity: identity_from_hex(TABLE, &self.pack_id, &self.pack_key)?,
            title: self.title,
            author: self.author,
            cover,
            items,
            is_installed: self.is_installed,
            date_created: from_millis(self.date_created),
        })
    }
}

struct StickerRow {
    pack_id: String,
    pack_key: String,
    index: u32,
    content_type: String,
    emoji_hint: Option<String>,
}

impl StickerRow {
    const COLUMNS: &'static str = "pack_id, pack_key, sticker_index, content_type, emoji_hint";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            pack_id: row.get(0)?,
            pack_key: row.get(1)?,
            index: row.get(2)?,
            content_type: row.get(3)?,
            emoji_hint: row.get(4)?,
        })
    }

    fn into_record(self) -> Result<InstalledStickerRecord, StoreError> {
        let pack = identity_from_hex("installed_stickers", &self.pack_id, &self.pack_key)?;
        Ok(InstalledStickerRecord::new(
            pack.sticker(self.index),
            self.content_type,
            self.emoji_hint,
        ))
    }
}

fn read_pack(conn: &Connection, identity: &PackIdentity) -> Result<Option<PackManifest>, StoreError> {
    let sql = format!(
        "SELECT {} FROM sticker_packs WHERE pack_id = ?1",
        PackRow::COLUMNS
    );
    conn.query_row(&sql, params![identity.key()], PackRow::from_row)
        .optional()?
        .map(PackRow::into_manifest)
        .transpose()
}

fn read_all_packs(conn: &Connection) -> Result<Vec<PackManifest>, StoreError> {
    let sql = format!(
        "SELECT {} FROM sticker_packs ORDER BY date_created, pack_id",
        PackRow::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], PackRow::from_row)?;
    rows.map(|row| row.map_err(StoreError::from)?.into_manifest())
        .collect()
}

fn read_sticker(
    conn: &Connection,
    identity: &StickerIdentity,
) -> Result<Option<InstalledStickerRecord>, StoreError> {
    let sql = format!(
        "SELECT {} FROM installed_stickers WHERE sticker_key = ?1",
        StickerRow::COLUMNS
    );
    conn.query_row(&sql, params![identity.key()], StickerRow::from_row)
        .optional()?
        .map(StickerRow::into_record)
        .transpose()
}

fn read_stickers(
    conn: &Connection,
    pack_id: Option<&str>,
) -> Result<Vec<InstalledStickerRecord>, StoreError> {
    let sql = format!(
        "SELECT {} FROM installed_stickers WHERE ?1 IS NULL OR pack_id = ?1 \
         ORDER BY pack_id, sticker_index",
        StickerRow::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![pack_id], StickerRow::from_row)?;
    rows.map(|row| row.map_err(StoreError::from)?.into_record())
        .collect()
}

fn read_string_list(conn: &Connection, name: &str) -> Result<Vec<String>, StoreError> {
    let items: Option<String> = conn
        .query_row(
            "SELECT items FROM string_lists WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    match items {
        None => Ok(Vec::new()),
        Some(json) => serde_json::from_str(&json).map_err(|e| corrupt("string_lists", e)),
    }
}

fn read_pending(conn: &Connection, limit: usize) -> Result<Vec<PendingDownloadRecord>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, pack_id, pack_key, enqueued_at FROM pending_pack_downloads \
         ORDER BY id LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
        ))
    })?;
    rows.map(|row| -> Result<PendingDownloadRecord, StoreError> {
        let (id, pack_id, pack_key, enqueued_at) = row?;
        Ok(PendingDownloadRecord {
            id,
            identity: identity_from_hex("pending_pack_downloads", &pack_id, &pack_key)?,
            enqueued_at: from_millis(enqueued_at),
        })
    })
    .collect()
}

fn count_pending(conn: &Connection) -> Result<usize, StoreError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM pending_pack_downloads", [], |row| {
        row.get(0)
    })?;
    Ok(count as usize)
}

macro_rules! impl_read_transaction {
    ($ty:ty, $conn:ident => $expr:expr) => {
        impl ReadTransaction for $ty {
            fn pack(&self, identity: &PackIdentity) -> Result<Option<PackManifest>, StoreError> {
                let $conn = self;
                read_pack($expr, identity)
            }

            fn all_packs(&self) -> Result<Vec<PackManifest>, StoreError> {
                let $conn = self;
                read_all_packs($expr)
            }

            fn sticker(
                &self,
                identity: &StickerIdentity,
            ) -> Result<Option<InstalledStickerRecord>, StoreError> {
                let $conn = self;
                read_sticker($expr, identity)
            }

            fn all_stickers(&self) -> Result<Vec<InstalledStickerRecord>, StoreError> {
                let $conn = self;
                read_stickers($expr, None)
            }

            fn stickers_in_pack(
                &self,
                pack: &PackIdentity,
            ) -> Result<Vec<InstalledStickerRecord>, StoreError> {
                let $conn = self;
                read_stickers($expr, Some(pack.key().as_str()))
            }

            fn string_list(&self, name: &str) -> Result<Vec<String>, StoreError> {
                let $conn = self;
                read_string_list($expr, name)
            }

            fn pending_downloads(
                &self,
                limit: usize,
            ) -> Result<Vec<PendingDownloadRecord>, StoreError> {
                let $conn = self;
                read_pending($expr, limit)
            }

            fn pending_count(&self) -> Result<usize, StoreError> {
                let $conn = self;
                count_pending($expr)
            }
        }
    };
}

impl_read_transaction!(SqliteReader<'_>, this => this.conn);
impl_read_transaction!(SqliteWriter<'_>, this => &this.tx);

impl WriteTransaction for SqliteWriter<'_> {
    fn put_pack(&mut self, manifest: &PackManifest) -> Result<(), StoreError> {
        let cover = serde_json::to_string(&manifest.cover).map_err(|e| corrupt("sticker_packs", e))?;
        let items = serde_json::to_string(&manifest.items).map_err(|e| corrupt("sticker_packs", e))?;
        self.tx.execute(
            "INSERT OR REPLACE INTO sticker_packs \
             (pack_id, pack_key, title, author, cover, items, is_installed, date_created) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                manifest.identity.key(),
                manifest.identity.pack_key_hex(),
                manifest.title,
                manifest.author,
                cover,
                items,
                manifest.is_installed,
                to_millis(&manifest.date_created),
            ],
        )?;
        Ok(())
    }

    fn delete_pack(&mut self, identity: &PackIdentity) -> Result<bool, StoreError> {
        let removed = self.tx.execute(
            "DELETE FROM sticker_packs WHERE pack_id = ?1",
            params![identity.key()],
        )?;
        Ok(removed > 0)
    }

    fn put_sticker(&mut self, record: &InstalledStickerRecord) -> Result<(), StoreError> {
        let pack = record.identity.pack();
        self.tx.execute(
            "INSERT OR REPLACE INTO installed_stickers \
             (sticker_key, pack_id, pack_key, sticker_index, content_type, emoji_hint) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.key(),
                pack.key(),
                pack.pack_key_hex(),
                record.identity.index(),
                record.content_type,
                record.emoji_hint,
            ],
        )?;
        Ok(())
    }

    fn delete_sticker(&mut self, identity: &StickerIdentity) -> Result<bool, StoreError> {
        let removed = self.tx.execute(
            "DELETE FROM installed_stickers WHERE sticker_key = ?1",
            params![identity.key()],
        )?;
        Ok(removed > 0)
    }

    fn set_string_list(&mut self, name: &str, values: &[String]) -> Result<(), StoreError> {
        if values.is_empty() {
            self.tx
                .execute("DELETE FROM string_lists WHERE name = ?1", params![name])?;
        } else {
            let json = serde_json::to_string(values).map_err(|e| corrupt("string_lists", e))?;
            self.tx.execute(
                "INSERT OR REPLACE INTO string_lists (name, items) VALUES (?1, ?2)",
                params![name, json],
            )?;
        }
        Ok(())
    }

    fn enqueue_pending(
        &mut self,
        identity: &PackIdentity,
        enqueued_at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        self.tx.execute(
            "INSERT INTO pending_pack_downloads (pack_id, pack_key, enqueued_at) \
             VALUES (?1, ?2, ?3)",
            params![
                identity.key(),
                identity.pack_key_hex(),
                to_millis(&enqueued_at)
            ],
        )?;
        Ok(self.tx.last_insert_rowid())
    }

    fn remove_pending(&mut self, id: i64) -> Result<bool, StoreError> {
        let removed = self
            .tx
            .execute("DELETE FROM pending_pack_downloads WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn after_commit(&mut self, hook: CommitHook) {
        self.hooks.push(hook);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manifest(id: u8, installed: bool) -> PackManifest {
        PackManifest {
            identity: PackIdentity::new(vec![id, 0xee], &[id; 32]).unwrap(),
            title: Some(format!("Pack {id}")),
            author: None,
            cover: PackItem::new(1, "🐱", "image/webp"),
            items: vec![PackItem::new(0, "", ""), PackItem::new(1, "🐱", "image/webp")],
            is_installed: installed,
            date_created: from_millis(1_700_000_000_000 + id as i64),
        }
    }

    #[test]
    fn test_pack_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let m = manifest(1, true);
        store.write(|tx| tx.put_pack(&m)).unwrap();

        let loaded = store.read(|tx| tx.pack(&m.identity)).unwrap();
        assert_eq!(loaded, Some(m.clone()));

        assert!(store.write(|tx| tx.delete_pack(&m.identity)).unwrap());
        assert!(store.read(|tx| tx.pack(&m.identity)).unwrap().is_none());
    }

    #[test]
    fn test_rollback_on_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        let m = manifest(1, false);
        let result: Result<(), StoreError> = store.write(|tx| {
            tx.put_pack(&m)?;
            tx.after_commit(Box::new(|| panic!("must not run")));
            Err(StoreError::Database("abort".into()))
        });
        assert!(result.is_err());
        assert!(store.read(|tx| tx.all_packs()).unwrap().is_empty());
    }

    #[test]
    fn test_stickers_by_pack() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = manifest(1, true).identity;
        let b = manifest(2, true).identity;
        store
            .write::<_, StoreError, _>(|tx| {
                tx.put_sticker(&InstalledStickerRecord::new(a.sticker(1), "image/webp", Some("😀".into())))?;
                tx.put_sticker(&InstalledStickerRecord::new(a.sticker(0), "", None))?;
                tx.put_sticker(&InstalledStickerRecord::new(b.sticker(0), "", None))
            })
            .unwrap();

        let in_a = store.read(|tx| tx.stickers_in_pack(&a)).unwrap();
        assert_eq!(in_a.len(), 2);
        assert_eq!(in_a[0].identity.index(), 0);
        assert_eq!(in_a[1].emoji_hint.as_deref(), Some("😀"));
        assert_eq!(store.read(|tx| tx.all_stickers()).unwrap().len(), 3);

        assert!(store.write(|tx| tx.delete_sticker(&a.sticker(1))).unwrap());
        assert!(!store.write(|tx| tx.delete_sticker(&a.sticker(1))).unwrap());
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db").join("stickers.db");
        let m = manifest(5, true);

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .write::<_, StoreError, _>(|tx| {
                    tx.put_pack(&m)?;
                    tx.enqueue_pending(&m.identity, Utc::now())?;
                    tx.set_string_list("recent_stickers", &["05ee/1".to_string()])
                })
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        assert_eq!(store.read(|tx| tx.pack(&m.identity)).unwrap(), Some(m.clone()));
        let pending = store.read(|tx| tx.pending_downloads(4)).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].identity, m.identity);
        assert_eq!(
            store.read(|tx| tx.string_list("recent_stickers")).unwrap(),
            vec!["05ee/1"]
        );
    }

    #[test]
    fn test_pending_ids_increase() {
        let store = SqliteStore::open_in_memory().unwrap();
        let m = manifest(1, false);
        let first = store.write(|tx| tx.enqueue_pending(&m.identity, Utc::now())).unwrap();
        let second = store.write(|tx| tx.enqueue_pending(&m.identity, Utc::now())).unwrap();
        assert!(second > first);

        assert!(store.write(|tx| tx.remove_pending(first)).unwrap());
        let pending = store.read(|tx| tx.pending_downloads(10)).unwrap();
        assert_eq!(pending.iter().map(|p| p.id).collect::<Vec<_>>(), vec![second]);
        assert_eq!(store.read(|tx| tx.pending_count()).unwrap(), 1);
    }
}
