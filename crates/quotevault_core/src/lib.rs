//! Core domain logic for QuoteVault.
//!
//! A persistent quote collection with category filtering, random display
//! selection, JSON import/export, and periodic reconciliation against a
//! simulated remote source with manual conflict resolution.

pub mod filter;
pub mod logging;
pub mod model;
pub mod service;
pub mod storage;
pub mod store;
pub mod sync;

pub use filter::{pick_random, FilterState, ALL_CATEGORIES};
pub use logging::{default_log_level, init_logging};
pub use model::quote::{default_quotes, Provenance, Quote, QuoteValidationError};
pub use service::quote_service::{ExternalChange, LastViewed, QuoteService};
pub use storage::{keys, KeyValueStore, SessionStore, SqliteKeyValueStore, StorageError};
pub use store::quote_store::{FormatError, QuoteStore, StoreDigest, StoreError, StoreResult};
pub use sync::{
    Conflict, ConflictKind, HttpRemoteSource, ReconciliationEngine, RemoteError, RemoteSource,
    Resolution, RunState, SyncController, SyncError, SyncGuard, SyncOutcome, SyncReport, SyncTick,
    DEFAULT_SYNC_INTERVAL, STARTUP_SYNC_DELAY,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn core_version_is_set() {
        assert!(!core_version().is_empty());
    }
}
