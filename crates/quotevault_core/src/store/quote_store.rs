//! Quote Store: ordered collection with write-through persistence.
//!
//! # Responsibility
//! - Load/seed the collection and keep it mirrored to the key-value store.
//! - Provide add, bulk import, clear, snapshot and merge-support APIs.
//!
//! # Invariants
//! - The derived category set and count are republished to subscribers on
//!   every mutation.
//! - Loading falls back to the seed set on absent or unparsable data; it
//!   never propagates a decode error.

use crate::model::quote::{default_quotes, Quote, QuoteValidationError};
use crate::storage::{keys, KeyValueStore, StorageError};
use log::{error, info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{channel, Receiver, Sender};

pub type StoreResult<T> = Result<T, StoreError>;

/// Malformed import payload.
#[derive(Debug)]
pub enum FormatError {
    /// The decoded document is not a JSON array.
    NotAnArray,
    /// The array held no entry with non-empty `text` and `category`.
    NoValidEntries,
    /// The import file does not look like JSON at all.
    UnsupportedExtension(String),
    Parse(serde_json::Error),
}

impl Display for FormatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnArray => write!(f, "import payload must be a JSON array of quotes"),
            Self::NoValidEntries => write!(f, "no valid quotes found in the import payload"),
            Self::UnsupportedExtension(name) => {
                write!(f, "`{name}` is not a JSON file")
            }
            Self::Parse(err) => write!(f, "import payload is not valid JSON: {err}"),
        }
    }
}

impl Error for FormatError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

/// Store-level error for collection operations.
#[derive(Debug)]
pub enum StoreError {
    Validation(QuoteValidationError),
    Format(FormatError),
    /// Persistence failed; the in-memory mutation, if any, still stands.
    Storage(StorageError),
    Io(std::io::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Format(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Format(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<QuoteValidationError> for StoreError {
    fn from(value: QuoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<FormatError> for StoreError {
    fn from(value: FormatError) -> Self {
        Self::Format(value)
    }
}

impl From<StorageError> for StoreError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Snapshot of the derived store state pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreDigest {
    /// Distinct lowercase categories, sorted ascending.
    pub categories: Vec<String>,
    pub count: usize,
}

/// Ordered quote collection with write-through persistence.
pub struct QuoteStore<S: KeyValueStore> {
    storage: S,
    quotes: Vec<Quote>,
    subscribers: Vec<Sender<StoreDigest>>,
}

impl<S: KeyValueStore> QuoteStore<S> {
    /// Loads the persisted collection, seeding the default set when storage
    /// holds nothing usable.
    ///
    /// Decode failures fall back to the seed set; only storage transport
    /// errors propagate.
    pub fn load(storage: S) -> StoreResult<Self> {
        let (quotes, origin) = match storage.get_json::<Vec<Quote>>(keys::QUOTES) {
            Ok(Some(quotes)) => (quotes, "storage"),
            Ok(None) => (default_quotes(), "seed"),
            Err(StorageError::Decode { key, source }) => {
                warn!(
                    "event=store_load module=store status=fallback key={key} error={source}"
                );
                (default_quotes(), "seed")
            }
            Err(err) => return Err(err.into()),
        };

        let mut store = Self {
            storage,
            quotes,
            subscribers: Vec::new(),
        };
        if origin == "seed" {
            store.persist()?;
        }
        info!(
            "event=store_load module=store status=ok origin={origin} count={}",
            store.quotes.len()
        );
        Ok(store)
    }

    /// Appends a user-authored quote and persists.
    ///
    /// # Errors
    /// - `Validation` when either field is empty after trimming; the
    ///   collection is untouched.
    /// - `Storage` when the write-through fails; the appended quote stays
    ///   in memory.
    pub fn add(&mut self, text: &str, category: &str) -> StoreResult<Quote> {
        let quote = Quote::new(text, category)?;
        self.quotes.push(quote.clone());
        info!(
            "event=store_add module=store status=ok category={} count={}",
            quote.category,
            self.quotes.len()
        );
        self.commit()?;
        Ok(quote)
    }

    /// Imports quotes from an arbitrary decoded JSON document.
    ///
    /// Entries that are not objects with non-empty string `text` and
    /// `category` are discarded silently. Returns the number imported.
    ///
    /// # Errors
    /// - `Format(NotAnArray)` when the document is not an array.
    /// - `Format(NoValidEntries)` when nothing survives filtering.
    pub fn import_batch(&mut self, payload: &serde_json::Value) -> StoreResult<usize> {
        let entries = payload
            .as_array()
            .ok_or(FormatError::NotAnArray)?;

        let mut accepted = Vec::new();
        for entry in entries {
            // Metadata (provenance, server id, timestamp) survives the trip
            // when present; anything that does not decode as a quote shape
            // is dropped.
            let Ok(mut quote) = serde_json::from_value::<Quote>(entry.clone()) else {
                continue;
            };
            let text = quote.text.trim();
            let category = quote.category.trim().to_lowercase();
            if text.is_empty() || category.is_empty() {
                continue;
            }
            quote.text = text.to_string();
            quote.category = category;
            accepted.push(quote);
        }

        if accepted.is_empty() {
            return Err(FormatError::NoValidEntries.into());
        }

        let imported = accepted.len();
        self.quotes.extend(accepted);
        info!(
            "event=store_import module=store status=ok imported={imported} count={}",
            self.quotes.len()
        );
        self.commit()?;
        Ok(imported)
    }

    /// Empties the collection and persists the empty state.
    pub fn clear(&mut self) -> StoreResult<()> {
        self.quotes.clear();
        info!("event=store_clear module=store status=ok");
        self.commit()
    }

    /// Full ordered view for display selection and export serialization.
    pub fn snapshot(&self) -> &[Quote] {
        &self.quotes
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Distinct lowercase categories, sorted ascending.
    pub fn categories(&self) -> Vec<String> {
        let set: BTreeSet<String> = self
            .quotes
            .iter()
            .map(|quote| quote.category.to_lowercase())
            .collect();
        set.into_iter().collect()
    }

    /// Re-reads the collection from storage, fully replacing in-memory
    /// state. Used when another context changed the persisted data.
    pub fn reload(&mut self) -> StoreResult<()> {
        match self.storage.get_json::<Vec<Quote>>(keys::QUOTES) {
            Ok(Some(quotes)) => {
                self.quotes = quotes;
            }
            Ok(None) => {
                self.quotes = default_quotes();
                self.persist()?;
            }
            Err(StorageError::Decode { key, source }) => {
                warn!(
                    "event=store_reload module=store status=fallback key={key} error={source}"
                );
                self.quotes = default_quotes();
                self.persist()?;
            }
            Err(err) => return Err(err.into()),
        }
        info!(
            "event=store_reload module=store status=ok count={}",
            self.quotes.len()
        );
        self.publish();
        Ok(())
    }

    /// True when a quote with this exact lowercased text exists.
    ///
    /// This is the merge-dedup notion, not the conflict heuristic.
    pub fn contains_text(&self, text_key: &str) -> bool {
        self.quotes.iter().any(|quote| quote.text_key() == text_key)
    }

    /// Appends pre-validated merged quotes in one persisted batch.
    pub fn append_merged(&mut self, merged: Vec<Quote>) -> StoreResult<usize> {
        if merged.is_empty() {
            return Ok(0);
        }
        let added = merged.len();
        self.quotes.extend(merged);
        info!(
            "event=store_merge module=store status=ok added={added} count={}",
            self.quotes.len()
        );
        self.commit()?;
        Ok(added)
    }

    /// Overwrites the first quote whose text equals `original_text` exactly.
    ///
    /// Returns `false` when no such quote remains; a conflict whose local
    /// entry was already rewritten earlier in the batch resolves to a
    /// no-op by design.
    pub fn overwrite_by_text(
        &mut self,
        original_text: &str,
        replacement: Quote,
    ) -> StoreResult<bool> {
        let Some(slot) = self
            .quotes
            .iter_mut()
            .find(|quote| quote.text == original_text)
        else {
            return Ok(false);
        };
        *slot = replacement;
        info!("event=store_overwrite module=store status=ok");
        self.commit()?;
        Ok(true)
    }

    /// Registers a digest subscriber; disconnected receivers are pruned on
    /// the next publication.
    pub fn subscribe(&mut self) -> Receiver<StoreDigest> {
        let (tx, rx) = channel();
        // Seed the new subscriber with the current state so it never starts
        // stale.
        let _ = tx.send(self.digest());
        self.subscribers.push(tx);
        rx
    }

    pub fn digest(&self) -> StoreDigest {
        StoreDigest {
            categories: self.categories(),
            count: self.quotes.len(),
        }
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.publish();
        self.persist()
    }

    fn publish(&mut self) {
        let digest = self.digest();
        self.subscribers
            .retain(|subscriber| subscriber.send(digest.clone()).is_ok());
    }

    fn persist(&self) -> StoreResult<()> {
        if let Err(err) = self.storage.set_json(keys::QUOTES, &self.quotes) {
            error!("event=store_persist module=store status=error error={err}");
            return Err(err.into());
        }
        Ok(())
    }
}
