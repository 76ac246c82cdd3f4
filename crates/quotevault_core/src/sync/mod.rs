//! Reconciliation against the simulated remote source.
//!
//! # Responsibility
//! - Define the remote-source seam, the reconciliation engine and the
//!   periodic controller.
//! - Share one single-flight guard between manual and scheduled runs.
//!
//! # Invariants
//! - At most one reconciliation run is in flight at any time; a tick that
//!   loses the race is skipped, never queued.
//! - A failed fetch aborts the run before any store mutation.

use crate::storage::StorageError;
use crate::store::quote_store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub mod engine;
pub mod remote;
pub mod scheduler;

pub use engine::{
    Conflict, ConflictKind, ReconciliationEngine, Resolution, RunState, SyncOutcome, SyncReport,
};
pub use remote::{HttpRemoteSource, RemoteError, RemoteSource};
pub use scheduler::{SyncController, SyncTick, DEFAULT_SYNC_INTERVAL, STARTUP_SYNC_DELAY};

pub type SyncResult<T> = Result<T, SyncError>;

/// Failure of a reconciliation run.
#[derive(Debug)]
pub enum SyncError {
    Remote(RemoteError),
    /// The engine's own bookkeeping writes (batch cache, last-sync) failed.
    Storage(StorageError),
    /// A store mutation issued by merge or resolution failed.
    Store(StoreError),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Remote(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<RemoteError> for SyncError {
    fn from(value: RemoteError) -> Self {
        Self::Remote(value)
    }
}

impl From<StorageError> for SyncError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Single-flight guard shared by the engine and the controller.
///
/// Acquisition is a compare-and-swap, so two entrants racing across a
/// suspension point can never both start a run.
#[derive(Clone, Debug, Default)]
pub struct SyncGuard {
    busy: Arc<AtomicBool>,
}

impl SyncGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to claim the in-flight slot. Returns `false` when a run
    /// already holds it.
    pub fn try_begin(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Releases the slot at the end of a run, successful or not.
    pub fn finish(&self) {
        self.busy.store(false, Ordering::Release);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}
