//! Filter State and random display selection.
//!
//! # Responsibility
//! - Hold the single selected category, persisted across sessions.
//! - Derive filtered views of a store snapshot for display.
//!
//! # Invariants
//! - The current value is either the `"all"` sentinel or a lowercase
//!   category string; existence in the store is deliberately not checked.
//! - An empty filtered view is a normal outcome callers must render as
//!   "no quotes for category", never an error.

use crate::model::quote::Quote;
use crate::storage::{keys, KeyValueStore, StorageError, StorageResult};
use log::{info, warn};
use rand::Rng;

/// Sentinel meaning "no category restriction".
pub const ALL_CATEGORIES: &str = "all";

/// Persisted category filter.
pub struct FilterState<S: KeyValueStore> {
    storage: S,
    current: String,
}

impl<S: KeyValueStore> FilterState<S> {
    /// Loads the last selected filter, defaulting to `"all"`.
    pub fn load(storage: S) -> StorageResult<Self> {
        let current = read_current(&storage)?;
        Ok(Self { storage, current })
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn is_all(&self) -> bool {
        self.current == ALL_CATEGORIES
    }

    /// Selects a category (or `"all"`) and persists the choice.
    ///
    /// Selecting a category no quote carries is allowed; it simply yields
    /// an empty view downstream.
    pub fn set(&mut self, category: &str) -> StorageResult<()> {
        self.current = normalize(category);
        info!(
            "event=filter_set module=filter status=ok filter={}",
            self.current
        );
        self.storage.set_json(keys::LAST_FILTER, &self.current)
    }

    /// Resets to `"all"`; used when the store is cleared.
    pub fn reset(&mut self) -> StorageResult<()> {
        self.set(ALL_CATEGORIES)
    }

    /// Re-reads the persisted filter, replacing the in-memory value. Used
    /// when another context changed the persisted state.
    pub fn reload(&mut self) -> StorageResult<()> {
        self.current = read_current(&self.storage)?;
        info!(
            "event=filter_reload module=filter status=ok filter={}",
            self.current
        );
        Ok(())
    }

    /// Produces the subsequence matching the current filter, recomputed
    /// fresh on every call. The full sequence when the filter is `"all"`.
    pub fn apply<'a>(&self, snapshot: &'a [Quote]) -> Vec<&'a Quote> {
        if self.is_all() {
            return snapshot.iter().collect();
        }
        snapshot
            .iter()
            .filter(|quote| quote.category.to_lowercase() == self.current)
            .collect()
    }
}

fn read_current<S: KeyValueStore>(storage: &S) -> StorageResult<String> {
    match storage.get_json::<String>(keys::LAST_FILTER) {
        Ok(Some(value)) => Ok(normalize(&value)),
        Ok(None) => Ok(ALL_CATEGORIES.to_string()),
        Err(StorageError::Decode { key, source }) => {
            warn!("event=filter_load module=filter status=fallback key={key} error={source}");
            Ok(ALL_CATEGORIES.to_string())
        }
        Err(err) => Err(err),
    }
}

fn normalize(category: &str) -> String {
    let normalized = category.trim().to_lowercase();
    if normalized.is_empty() {
        return ALL_CATEGORIES.to_string();
    }
    normalized
}

/// Picks a quote uniformly at random from a filtered view.
///
/// Returns `None` on an empty view; callers check before rendering instead
/// of treating this as an error.
pub fn pick_random<'a>(view: &[&'a Quote]) -> Option<&'a Quote> {
    if view.is_empty() {
        return None;
    }
    let index = rand::thread_rng().gen_range(0..view.len());
    Some(view[index])
}

#[cfg(test)]
mod tests {
    use super::{pick_random, FilterState, ALL_CATEGORIES};
    use crate::model::quote::Quote;
    use crate::storage::SqliteKeyValueStore;

    fn quotes() -> Vec<Quote> {
        vec![
            Quote::new("a", "wisdom").unwrap(),
            Quote::new("b", "humor").unwrap(),
            Quote::new("c", "wisdom").unwrap(),
        ]
    }

    #[test]
    fn defaults_to_all_and_applies_no_restriction() {
        let filter = FilterState::load(SqliteKeyValueStore::open_in_memory().unwrap()).unwrap();
        assert_eq!(filter.current(), ALL_CATEGORIES);
        assert_eq!(filter.apply(&quotes()).len(), 3);
    }

    #[test]
    fn set_lowercases_and_filters_matching_category() {
        let mut filter = FilterState::load(SqliteKeyValueStore::open_in_memory().unwrap()).unwrap();
        filter.set("  Wisdom ").unwrap();
        assert_eq!(filter.current(), "wisdom");

        let all = quotes();
        let view = filter.apply(&all);
        assert_eq!(view.len(), 2);
        assert!(view.iter().all(|quote| quote.category == "wisdom"));
    }

    #[test]
    fn unknown_category_yields_empty_view_not_error() {
        let mut filter = FilterState::load(SqliteKeyValueStore::open_in_memory().unwrap()).unwrap();
        filter.set("nonexistent").unwrap();
        assert!(filter.apply(&quotes()).is_empty());
    }

    #[test]
    fn filter_persists_across_reload() {
        let storage = SqliteKeyValueStore::open_in_memory().unwrap();
        let mut filter = FilterState::load(storage.clone()).unwrap();
        filter.set("humor").unwrap();

        let reopened = FilterState::load(storage).unwrap();
        assert_eq!(reopened.current(), "humor");
    }

    #[test]
    fn pick_random_handles_empty_and_stays_in_bounds() {
        assert!(pick_random(&[]).is_none());

        let all = quotes();
        let filter = FilterState::load(SqliteKeyValueStore::open_in_memory().unwrap()).unwrap();
        let view = filter.apply(&all);
        for _ in 0..50 {
            let picked = pick_random(&view).unwrap();
            assert!(all.iter().any(|quote| quote == picked));
        }
    }
}
