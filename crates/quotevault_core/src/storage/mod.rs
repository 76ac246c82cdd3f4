//! Storage collaborators: persistent key-value store and session store.
//!
//! # Responsibility
//! - Define the string-keyed, JSON-encoded persistence contract the core
//!   consumes (get/set/remove), without fixing a backend.
//! - Provide the process-lifetime session store for ephemeral state.
//!
//! # Invariants
//! - Values are JSON documents; encode/decode failures carry the offending
//!   key in the error.
//! - A `set` is a single upsert: persistence is all-or-nothing per call.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod sqlite;

pub use sqlite::SqliteKeyValueStore;

/// Well-known storage keys.
///
/// Persistent keys hold the quote collection, the last selected filter,
/// sync bookkeeping and the cached remote batch awaiting resolution.
/// `LAST_VIEWED` is session-scoped only.
pub mod keys {
    pub const QUOTES: &str = "quotes";
    pub const LAST_FILTER: &str = "last_filter";
    pub const LAST_SYNC_MS: &str = "last_sync_ms";
    pub const REMOTE_BATCH: &str = "remote_batch";
    pub const LAST_VIEWED: &str = "last_viewed";
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence-layer error.
#[derive(Debug)]
pub enum StorageError {
    Sqlite(rusqlite::Error),
    Encode {
        key: String,
        source: serde_json::Error,
    },
    Decode {
        key: String,
        source: serde_json::Error,
    },
    /// A previous panic poisoned the shared connection handle.
    Poisoned,
    Io(std::io::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Encode { key, source } => {
                write!(f, "failed to encode value for key `{key}`: {source}")
            }
            Self::Decode { key, source } => {
                write!(f, "failed to decode value for key `{key}`: {source}")
            }
            Self::Poisoned => write!(f, "storage handle poisoned by an earlier panic"),
            Self::Io(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "storage schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Encode { source, .. } | Self::Decode { source, .. } => Some(source),
            Self::Io(err) => Some(err),
            Self::Poisoned | Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Persistent key-value contract consumed by core components.
///
/// Implementations must make `set` atomic per call; partially-written
/// values are never observable.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Reads and decodes a JSON value, `None` when the key is absent.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StorageError::Decode {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Encodes and writes a JSON value under `key`.
    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let raw = serde_json::to_string(value).map_err(|source| StorageError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.set(key, &raw)
    }
}

/// Per-session store: plain in-memory map, dropped with the process.
///
/// Holds the last-viewed quote record; nothing here survives a restart.
#[derive(Debug, Default)]
pub struct SessionStore {
    entries: HashMap<String, String>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_json<T: Serialize>(&mut self, key: &str, value: &T) -> StorageResult<()> {
        let raw = serde_json::to_string(value).map_err(|source| StorageError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.entries.insert(key.to_string(), raw);
        Ok(())
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.entries.get(key) {
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(|source| StorageError::Decode {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::{SessionStore, StorageError};

    #[test]
    fn session_store_round_trips_and_removes() {
        let mut session = SessionStore::new();
        session.set_json("k", &vec![1, 2, 3]).unwrap();
        assert_eq!(
            session.get_json::<Vec<i32>>("k").unwrap(),
            Some(vec![1, 2, 3])
        );

        session.remove("k");
        assert_eq!(session.get_json::<Vec<i32>>("k").unwrap(), None);
    }

    #[test]
    fn session_store_decode_error_names_the_key() {
        let mut session = SessionStore::new();
        session.set_json("k", &"not a number").unwrap();
        let err = session.get_json::<i64>("k").unwrap_err();
        match err {
            StorageError::Decode { key, .. } => assert_eq!(key, "k"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
