//! Reconciliation engine: fetch, compare, merge, resolve.
//!
//! # Responsibility
//! - Map raw remote records into quote shape (the engine owns the mapping,
//!   not the transport).
//! - Detect category conflicts with the prefix-containment heuristic and
//!   drive the resolution protocol.
//!
//! # Invariants
//! - Conflict similarity (fuzzy prefix containment) and merge identity
//!   (exact case-insensitive text) are different notions and stay separate.
//! - A failed fetch aborts the run without touching the quote store.
//! - Resolution is single-pass per batch: entries are matched by their
//!   exact original text, so a rewritten entry no longer matches.

use crate::model::quote::Quote;
use crate::storage::{keys, KeyValueStore};
use crate::store::quote_store::QuoteStore;
use crate::sync::remote::RemoteSource;
use crate::sync::{SyncGuard, SyncResult};
use log::{info, warn};
use uuid::Uuid;

/// How many records of the fetched batch are mapped into quotes.
const REMOTE_BATCH_CAP: usize = 5;

/// Similarity window for conflict detection. Texts shorter than this
/// collapse to whole-string containment; the heuristic is intentionally
/// fuzzy and kept for compatibility with the observed behavior.
const CONFLICT_PREFIX_LEN: usize = 20;

/// Categories assigned to mapped records, alternating by batch index.
const MAPPED_CATEGORIES: [&str; 2] = ["server", "remote"];

/// Lifecycle of a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Fetching,
    Comparing,
    Merging,
    AwaitingResolution,
    Persisting,
    Failed,
}

impl RunState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Comparing => "comparing",
            Self::Merging => "merging",
            Self::AwaitingResolution => "awaiting_resolution",
            Self::Persisting => "persisting",
            Self::Failed => "failed",
        }
    }
}

/// The only conflict kind the heuristic produces today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    CategoryMismatch,
}

/// A detected disagreement between a local quote and a similar remote one.
///
/// Ephemeral: computed per run, held until resolved or discarded. The
/// cached remote batch allows re-derivation later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub kind: ConflictKind,
    /// Snapshot of the local quote at detection time; resolution matches
    /// it by exact text.
    pub local: Quote,
    pub remote: Quote,
    /// Position of the remote quote in the mapped batch.
    pub remote_index: usize,
}

/// User- or strategy-selected answer for one conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    KeepLocal,
    AcceptServer,
}

/// Result of a completed (or skipped) run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another run held the in-flight slot; nothing happened.
    SkippedInFlight,
    /// No conflicts; non-duplicate remote quotes were merged.
    Merged { added: usize },
    /// Conflicts detected; the mapped batch is cached and the run parks
    /// until resolution completes.
    ConflictsPending { conflicts: Vec<Conflict> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub outcome: SyncOutcome,
}

/// Reconciliation engine over a storage handle and a remote source.
pub struct ReconciliationEngine<S: KeyValueStore, R: RemoteSource> {
    storage: S,
    remote: R,
    guard: SyncGuard,
    state: RunState,
}

impl<S: KeyValueStore, R: RemoteSource> ReconciliationEngine<S, R> {
    pub fn new(storage: S, remote: R, guard: SyncGuard) -> Self {
        Self {
            storage,
            remote,
            guard,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn guard(&self) -> &SyncGuard {
        &self.guard
    }

    /// Epoch milliseconds of the last successful sync, if any.
    pub fn last_sync_ms(&self) -> SyncResult<Option<i64>> {
        Ok(self.storage.get_json(keys::LAST_SYNC_MS)?)
    }

    /// Executes one reconciliation run against the store.
    ///
    /// Subject to the single-flight guard: when another run is active the
    /// report carries `SkippedInFlight` and nothing else happens.
    pub fn run(&mut self, store: &mut QuoteStore<S>) -> SyncResult<SyncReport> {
        let run_id = Uuid::new_v4();
        if !self.guard.try_begin() {
            info!("event=sync_run module=sync status=skipped run_id={run_id} reason=in_flight");
            return Ok(SyncReport {
                run_id,
                outcome: SyncOutcome::SkippedInFlight,
            });
        }

        info!("event=sync_run module=sync status=start run_id={run_id}");
        let result = self.run_guarded(run_id, store);
        self.guard.finish();

        match result {
            Ok(outcome) => Ok(SyncReport { run_id, outcome }),
            Err(err) => {
                self.set_state(RunState::Failed);
                warn!("event=sync_run module=sync status=error run_id={run_id} error={err}");
                self.set_state(RunState::Idle);
                Err(err)
            }
        }
    }

    fn run_guarded(&mut self, run_id: Uuid, store: &mut QuoteStore<S>) -> SyncResult<SyncOutcome> {
        self.set_state(RunState::Fetching);
        let records = self.remote.fetch_records()?;

        let observed_at_ms = chrono::Utc::now().timestamp_millis();
        let batch = map_records(&records, observed_at_ms);

        self.set_state(RunState::Comparing);
        let conflicts = detect_conflicts(&batch, store.snapshot());

        if conflicts.is_empty() {
            self.set_state(RunState::Merging);
            let added = self.merge_non_conflicting(store, &batch)?;
            self.push_local(store);
            self.set_state(RunState::Persisting);
            self.record_sync_success()?;
            info!("event=sync_run module=sync status=ok run_id={run_id} added={added}");
            self.set_state(RunState::Idle);
            return Ok(SyncOutcome::Merged { added });
        }

        // Cache the mapped batch so conflicts can be re-derived and the
        // leftover entries merged once resolution completes.
        self.storage.set_json(keys::REMOTE_BATCH, &batch)?;
        self.push_local(store);
        self.record_sync_success()?;
        info!(
            "event=sync_run module=sync status=conflicts run_id={run_id} conflicts={}",
            conflicts.len()
        );
        self.set_state(RunState::AwaitingResolution);
        Ok(SyncOutcome::ConflictsPending { conflicts })
    }

    /// Re-derives the open conflicts from the cached batch; empty when no
    /// batch is cached or nothing conflicts anymore.
    pub fn pending_conflicts(&self, store: &QuoteStore<S>) -> SyncResult<Vec<Conflict>> {
        let batch: Option<Vec<Quote>> = self.storage.get_json(keys::REMOTE_BATCH)?;
        Ok(batch
            .map(|batch| detect_conflicts(&batch, store.snapshot()))
            .unwrap_or_default())
    }

    /// Applies one resolution choice.
    ///
    /// `KeepLocal` leaves the store untouched. `AcceptServer` overwrites
    /// the matched local entry in place; when a previous resolution already
    /// rewrote it, the overwrite is a silent no-op.
    pub fn resolve_one(
        &mut self,
        store: &mut QuoteStore<S>,
        conflict: &Conflict,
        choice: Resolution,
    ) -> SyncResult<()> {
        match choice {
            Resolution::KeepLocal => {
                info!("event=sync_resolve module=sync status=ok choice=local");
                Ok(())
            }
            Resolution::AcceptServer => {
                let replaced =
                    store.overwrite_by_text(&conflict.local.text, conflict.remote.clone())?;
                info!("event=sync_resolve module=sync status=ok choice=server replaced={replaced}");
                Ok(())
            }
        }
    }

    /// Applies the same choice to every open conflict in batch order.
    pub fn resolve_all(
        &mut self,
        store: &mut QuoteStore<S>,
        conflicts: &[Conflict],
        choice: Resolution,
    ) -> SyncResult<()> {
        for conflict in conflicts {
            self.resolve_one(store, conflict, choice)?;
        }
        Ok(())
    }

    /// Completes a conflicted run: merges the remaining non-conflicting
    /// entries from the cached batch, clears the cache and returns to idle.
    /// Returns the number of merged quotes.
    pub fn finish_resolution(&mut self, store: &mut QuoteStore<S>) -> SyncResult<usize> {
        let batch: Vec<Quote> = self
            .storage
            .get_json(keys::REMOTE_BATCH)?
            .unwrap_or_default();

        self.set_state(RunState::Merging);
        let added = self.merge_non_conflicting(store, &batch)?;

        self.set_state(RunState::Persisting);
        self.storage.remove(keys::REMOTE_BATCH)?;
        self.record_sync_success()?;

        info!("event=sync_resolution_done module=sync status=ok merged={added}");
        self.set_state(RunState::Idle);
        Ok(added)
    }

    /// Appends remote quotes whose exact lowercased text is absent locally.
    ///
    /// Entries the fuzzy matcher flagged are still skipped here when their
    /// exact text already exists; the two equality notions differ on
    /// purpose.
    fn merge_non_conflicting(
        &mut self,
        store: &mut QuoteStore<S>,
        batch: &[Quote],
    ) -> SyncResult<usize> {
        let mut fresh: Vec<Quote> = Vec::new();
        for remote in batch {
            let key = remote.text_key();
            if store.contains_text(&key) {
                continue;
            }
            if fresh.iter().any(|queued| queued.text_key() == key) {
                continue;
            }
            fresh.push(remote.clone());
        }
        Ok(store.append_merged(fresh)?)
    }

    /// Best-effort notification of the full local list. Failures are
    /// logged and never roll back local mutations.
    fn push_local(&self, store: &QuoteStore<S>) {
        match self.remote.push_quotes(store.snapshot()) {
            Ok(()) => info!(
                "event=sync_push module=sync status=ok count={}",
                store.len()
            ),
            Err(err) => warn!("event=sync_push module=sync status=error error={err}"),
        }
    }

    fn record_sync_success(&self) -> SyncResult<()> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.storage.set_json(keys::LAST_SYNC_MS, &now_ms)?;
        Ok(())
    }

    fn set_state(&mut self, state: RunState) {
        if self.state != state {
            log::debug!(
                "event=sync_state module=sync from={} to={}",
                self.state.as_str(),
                state.as_str()
            );
            self.state = state;
        }
    }
}

/// Maps raw remote records into quote shape.
///
/// Takes the first few records, numbers them, reads `title` (falling back
/// to `body`) and alternates the mapped category by index. Records without
/// usable text are skipped.
pub fn map_records(records: &[serde_json::Value], observed_at_ms: i64) -> Vec<Quote> {
    records
        .iter()
        .take(REMOTE_BATCH_CAP)
        .enumerate()
        .filter_map(|(index, record)| {
            let title = record
                .get("title")
                .and_then(serde_json::Value::as_str)
                .or_else(|| record.get("body").and_then(serde_json::Value::as_str))?;
            let server_id = record.get("id").and_then(serde_json::Value::as_i64);
            let text = format!("Server quote {}: {}", index + 1, title);
            let category = MAPPED_CATEGORIES[index % MAPPED_CATEGORIES.len()];
            Quote::from_server(text, category, server_id, observed_at_ms).ok()
        })
        .collect()
}

/// Finds category conflicts between a mapped remote batch and the local
/// collection.
///
/// Similarity: the local text contains the first `CONFLICT_PREFIX_LEN`
/// characters of the remote text, or vice versa, case-insensitively.
/// The first similar local quote in insertion order is the only one
/// attributed per remote quote; a conflict is recorded when categories
/// differ.
pub fn detect_conflicts(batch: &[Quote], local: &[Quote]) -> Vec<Conflict> {
    batch
        .iter()
        .enumerate()
        .filter_map(|(remote_index, remote)| {
            let remote_lower = remote.text.to_lowercase();
            let remote_prefix = prefix(&remote_lower);

            let similar = local.iter().find(|candidate| {
                let local_lower = candidate.text.to_lowercase();
                let local_prefix = prefix(&local_lower);
                local_lower.contains(remote_prefix) || remote_lower.contains(local_prefix)
            })?;

            if similar.category == remote.category {
                return None;
            }

            Some(Conflict {
                kind: ConflictKind::CategoryMismatch,
                local: similar.clone(),
                remote: remote.clone(),
                remote_index,
            })
        })
        .collect()
}

/// First `CONFLICT_PREFIX_LEN` characters; the whole string when shorter.
fn prefix(text: &str) -> &str {
    match text.char_indices().nth(CONFLICT_PREFIX_LEN) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
