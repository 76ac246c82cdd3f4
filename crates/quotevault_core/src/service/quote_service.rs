//! Quote use-case service.
//!
//! # Responsibility
//! - Own store, filter and session state as one service object constructed
//!   at startup and torn down on shutdown.
//! - Provide display selection, import/export and cross-context reload
//!   entry points.
//!
//! # Invariants
//! - Clearing the store also resets the filter to `"all"` and drops the
//!   session's last-viewed record.
//! - External-change handling fully replaces in-memory state from storage,
//!   never merges.

use crate::filter::{pick_random, FilterState};
use crate::model::quote::Quote;
use crate::storage::{keys, KeyValueStore, SessionStore};
use crate::store::quote_store::{
    FormatError, QuoteStore, StoreDigest, StoreError, StoreResult,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

/// Session record of the most recently displayed quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastViewed {
    pub text: String,
    pub category: String,
    pub viewed_at_ms: i64,
}

/// Persisted-state change observed from another context (e.g. a second
/// process sharing the storage file).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalChange {
    Quotes,
    Filter,
}

impl ExternalChange {
    /// Maps a storage key to the state it invalidates.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            keys::QUOTES => Some(Self::Quotes),
            keys::LAST_FILTER => Some(Self::Filter),
            _ => None,
        }
    }
}

/// Service object bundling the quote store, filter state and session store.
pub struct QuoteService<S: KeyValueStore> {
    store: QuoteStore<S>,
    filter: FilterState<S>,
    session: SessionStore,
}

impl<S: KeyValueStore + Clone> QuoteService<S> {
    /// Opens the service from a storage handle, loading (or seeding) the
    /// collection and the last selected filter.
    pub fn open(storage: S) -> StoreResult<Self> {
        let store = QuoteStore::load(storage.clone())?;
        let filter = FilterState::load(storage)?;
        info!(
            "event=service_open module=service status=ok count={} filter={}",
            store.len(),
            filter.current()
        );
        Ok(Self {
            store,
            filter,
            session: SessionStore::new(),
        })
    }
}

impl<S: KeyValueStore> QuoteService<S> {
    pub fn store(&self) -> &QuoteStore<S> {
        &self.store
    }

    /// Mutable store access for the reconciliation engine.
    pub fn store_mut(&mut self) -> &mut QuoteStore<S> {
        &mut self.store
    }

    pub fn filter(&self) -> &FilterState<S> {
        &self.filter
    }

    pub fn quote_count(&self) -> usize {
        self.store.len()
    }

    pub fn categories(&self) -> Vec<String> {
        self.store.categories()
    }

    /// Digest subscription passthrough for display consumers.
    pub fn subscribe(&mut self) -> Receiver<StoreDigest> {
        self.store.subscribe()
    }

    pub fn add_quote(&mut self, text: &str, category: &str) -> StoreResult<Quote> {
        self.store.add(text, category)
    }

    pub fn set_filter(&mut self, category: &str) -> StoreResult<()> {
        Ok(self.filter.set(category)?)
    }

    /// Picks a quote uniformly at random from the filtered view and records
    /// it as last viewed in session storage.
    ///
    /// `None` means the filtered view is empty; callers render a
    /// "no quotes for category" message instead of selecting.
    pub fn random_quote(&mut self) -> StoreResult<Option<Quote>> {
        let view = self.filter.apply(self.store.snapshot());
        let Some(picked) = pick_random(&view).cloned() else {
            return Ok(None);
        };

        self.session.set_json(
            keys::LAST_VIEWED,
            &LastViewed {
                text: picked.text.clone(),
                category: picked.category.clone(),
                viewed_at_ms: chrono::Utc::now().timestamp_millis(),
            },
        )?;
        Ok(Some(picked))
    }

    /// The most recently displayed quote this session, if any.
    pub fn last_viewed(&self) -> StoreResult<Option<LastViewed>> {
        Ok(self.session.get_json(keys::LAST_VIEWED)?)
    }

    /// Serializes the full ordered collection as a pretty JSON array.
    pub fn export_json(&self) -> StoreResult<String> {
        serde_json::to_string_pretty(self.store.snapshot()).map_err(|source| {
            StoreError::Storage(crate::storage::StorageError::Encode {
                key: keys::QUOTES.to_string(),
                source,
            })
        })
    }

    /// Writes the export into `dir` under a dated filename
    /// (`quotes_export_<YYYY-MM-DD>.json`) and returns the path.
    pub fn export_to_file(&self, dir: &Path) -> StoreResult<PathBuf> {
        let name = format!(
            "quotes_export_{}.json",
            chrono::Utc::now().format("%Y-%m-%d")
        );
        let path = dir.join(name);
        std::fs::write(&path, self.export_json()?)?;
        info!(
            "event=service_export module=service status=ok count={} path={}",
            self.store.len(),
            path.display()
        );
        Ok(path)
    }

    /// Decodes a JSON document and imports the contained quotes. Returns
    /// the number imported.
    pub fn import_json(&mut self, payload: &str) -> StoreResult<usize> {
        let value: serde_json::Value =
            serde_json::from_str(payload).map_err(FormatError::Parse)?;
        self.store.import_batch(&value)
    }

    /// Imports quotes from a user-supplied file; the name must end in
    /// `.json`.
    pub fn import_from_file(&mut self, path: &Path) -> StoreResult<usize> {
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if !is_json {
            return Err(FormatError::UnsupportedExtension(path.display().to_string()).into());
        }

        let payload = std::fs::read_to_string(path)?;
        let imported = self.import_json(&payload)?;
        info!(
            "event=service_import module=service status=ok imported={imported} path={}",
            path.display()
        );
        Ok(imported)
    }

    /// Empties the collection, clears the session record and resets the
    /// filter to `"all"`.
    pub fn clear_all(&mut self) -> StoreResult<()> {
        self.store.clear()?;
        self.session.remove(keys::LAST_VIEWED);
        self.filter.reset()?;
        info!("event=service_clear module=service status=ok");
        Ok(())
    }

    /// Reacts to a persisted-state change made by another context: reloads
    /// the affected component from storage, fully replacing in-memory
    /// state. Returns `true` when the key was one of ours.
    pub fn handle_external_change(&mut self, key: &str) -> StoreResult<bool> {
        match ExternalChange::from_key(key) {
            Some(ExternalChange::Quotes) => {
                self.store.reload()?;
                Ok(true)
            }
            Some(ExternalChange::Filter) => {
                self.filter.reload()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ExternalChange, QuoteService};
    use crate::storage::{keys, SqliteKeyValueStore};

    #[test]
    fn external_change_maps_only_known_keys() {
        assert_eq!(
            ExternalChange::from_key(keys::QUOTES),
            Some(ExternalChange::Quotes)
        );
        assert_eq!(
            ExternalChange::from_key(keys::LAST_FILTER),
            Some(ExternalChange::Filter)
        );
        assert_eq!(ExternalChange::from_key("unrelated"), None);
    }

    #[test]
    fn open_seeds_defaults_and_default_filter() {
        let service = QuoteService::open(SqliteKeyValueStore::open_in_memory().unwrap()).unwrap();
        assert_eq!(service.quote_count(), 10);
        assert_eq!(service.filter().current(), "all");
    }
}
