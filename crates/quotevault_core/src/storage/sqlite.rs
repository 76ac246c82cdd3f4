//! SQLite-backed key-value store.
//!
//! # Responsibility
//! - Open file or in-memory SQLite storage and apply schema migrations.
//! - Implement the `KeyValueStore` contract over a single upsert table.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - The handle is clonable; all clones share one serialized connection.

use super::{KeyValueStore, StorageError, StorageResult};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: "CREATE TABLE IF NOT EXISTS kv_entries (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
    );",
}];

fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Clonable storage handle over a shared SQLite connection.
///
/// Cloning is cheap; every clone serializes access through the same
/// connection, so concurrent components (store, filter, sync) can each
/// hold their own handle.
#[derive(Clone)]
pub struct SqliteKeyValueStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKeyValueStore {
    /// Opens file-backed storage, creating parent directories as needed.
    ///
    /// # Side effects
    /// - Applies pending migrations before returning a usable handle.
    /// - Emits `storage_open` log events with duration and status.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let started_at = Instant::now();
        info!("event=storage_open module=storage status=start mode=file");

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(err) = std::fs::create_dir_all(parent) {
                    error!(
                        "event=storage_open module=storage status=error mode=file error_code=dir_create_failed error={err}"
                    );
                    return Err(StorageError::Io(err));
                }
            }
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn, "file", started_at)
    }

    /// Opens in-memory storage; used by tests and the smoke probe.
    pub fn open_in_memory() -> StorageResult<Self> {
        let started_at = Instant::now();
        info!("event=storage_open module=storage status=start mode=memory");
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, "memory", started_at)
    }

    fn from_connection(
        mut conn: Connection,
        mode: &str,
        started_at: Instant,
    ) -> StorageResult<Self> {
        match bootstrap(&mut conn) {
            Ok(()) => {
                info!(
                    "event=storage_open module=storage status=ok mode={mode} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(Self {
                    conn: Arc::new(Mutex::new(conn)),
                })
            }
            Err(err) => {
                error!(
                    "event=storage_open module=storage status=error mode={mode} duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StorageResult<T>) -> StorageResult<T> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        f(&conn)
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM kv_entries WHERE key = ?1;",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_entries (key, value, updated_at)
                 VALUES (?1, ?2, strftime('%s', 'now') * 1000)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at;",
                params![key, value],
            )?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM kv_entries WHERE key = ?1;", params![key])?;
            Ok(())
        })
    }
}

fn bootstrap(conn: &mut Connection) -> StorageResult<()> {
    conn.busy_timeout(Duration::from_secs(5))?;

    let current: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let latest = latest_version();
    if current > latest {
        return Err(StorageError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }
    if current == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::SqliteKeyValueStore;
    use crate::storage::{KeyValueStore, StorageError};

    #[test]
    fn set_get_remove_round_trip() {
        let store = SqliteKeyValueStore::open_in_memory().unwrap();

        assert_eq!(store.get("missing").unwrap(), None);

        store.set("k", "v1").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v1"));

        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));

        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn json_helpers_round_trip_and_report_key_on_decode_error() {
        let store = SqliteKeyValueStore::open_in_memory().unwrap();

        store.set_json("nums", &vec![1u32, 2, 3]).unwrap();
        assert_eq!(
            store.get_json::<Vec<u32>>("nums").unwrap(),
            Some(vec![1, 2, 3])
        );

        store.set("nums", "{broken").unwrap();
        let err = store.get_json::<Vec<u32>>("nums").unwrap_err();
        assert!(matches!(err, StorageError::Decode { ref key, .. } if key == "nums"));
    }

    #[test]
    fn clones_share_the_same_backing_data() {
        let store = SqliteKeyValueStore::open_in_memory().unwrap();
        let other = store.clone();

        store.set("shared", "yes").unwrap();
        assert_eq!(other.get("shared").unwrap().as_deref(), Some("yes"));
    }

    #[test]
    fn file_backed_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.db");

        {
            let store = SqliteKeyValueStore::open(&path).unwrap();
            store.set("k", "persisted").unwrap();
        }

        let reopened = SqliteKeyValueStore::open(&path).unwrap();
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("persisted"));
    }
}
