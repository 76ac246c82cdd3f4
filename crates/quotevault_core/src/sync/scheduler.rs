//! Periodic sync controller.
//!
//! # Responsibility
//! - Arm a recurring ticker that emits sync ticks over a channel, consumed
//!   by a single reconciliation task.
//! - Skip ticks entirely while a run is in flight; never queue them.
//!
//! # Invariants
//! - `stop` is idempotent and only prevents future ticks; an in-flight run
//!   completes or fails on its own.
//! - One startup tick fires after a short fixed delay when arming.

use crate::sync::SyncGuard;
use log::{debug, info};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Default cadence of scheduled reconciliation runs.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Delay before the initial run after arming the controller.
pub const STARTUP_SYNC_DELAY: Duration = Duration::from_secs(2);

/// A request to execute one reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTick {
    /// First tick after arming.
    Startup,
    /// Regular interval tick.
    Scheduled,
    /// Manually requested via `run_once`.
    Manual,
}

struct Ticker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Schedules reconciliation runs and exposes manual triggering.
///
/// The controller never runs the engine itself: it emits `SyncTick`s into
/// the channel returned by `new`, and one consumer drives the engine per
/// tick. The shared guard makes overlapping triggers skip instead of queue.
pub struct SyncController {
    guard: SyncGuard,
    interval: Duration,
    startup_delay: Duration,
    tick_tx: Sender<SyncTick>,
    ticker: Option<Ticker>,
}

impl SyncController {
    /// Creates a disarmed controller and the tick channel consumed by the
    /// reconciliation task.
    pub fn new(guard: SyncGuard) -> (Self, Receiver<SyncTick>) {
        Self::with_startup_delay(guard, STARTUP_SYNC_DELAY)
    }

    /// Startup-delay override; tests use a short one.
    pub fn with_startup_delay(
        guard: SyncGuard,
        startup_delay: Duration,
    ) -> (Self, Receiver<SyncTick>) {
        let (tick_tx, tick_rx) = channel();
        (
            Self {
                guard,
                interval: DEFAULT_SYNC_INTERVAL,
                startup_delay,
                tick_tx,
                ticker: None,
            },
            tick_rx,
        )
    }

    /// Arms the recurring ticker. Re-arming replaces the previous schedule.
    pub fn start(&mut self, interval: Duration) {
        self.stop();
        self.interval = interval;

        let (stop_tx, stop_rx) = channel();
        let guard = self.guard.clone();
        let tick_tx = self.tick_tx.clone();
        let startup_delay = self.startup_delay;

        let handle = std::thread::spawn(move || {
            // Initial run shortly after arming, then the regular cadence.
            let mut wait = startup_delay;
            let mut kind = SyncTick::Startup;
            loop {
                match stop_rx.recv_timeout(wait) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                    Err(RecvTimeoutError::Timeout) => {}
                }
                if guard.is_busy() {
                    debug!("event=sync_tick module=sync status=skipped reason=in_flight");
                } else if tick_tx.send(kind).is_err() {
                    return;
                }
                wait = interval;
                kind = SyncTick::Scheduled;
            }
        });

        self.ticker = Some(Ticker { stop_tx, handle });
        info!(
            "event=sync_schedule module=sync status=armed interval_ms={}",
            interval.as_millis()
        );
    }

    /// Cancels future ticks; idempotent. Does not cancel an in-flight run.
    pub fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.stop_tx.send(());
            let _ = ticker.handle.join();
            info!("event=sync_schedule module=sync status=disarmed");
        }
    }

    /// Flips armed/disarmed state, reusing `start`/`stop`.
    pub fn toggle(&mut self) {
        if self.is_armed() {
            self.stop();
        } else {
            self.start(self.interval);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.ticker.is_some()
    }

    /// Requests one run outside the timer, subject to the overlap guard.
    ///
    /// Returns `false` when a run is already in flight and the request was
    /// dropped.
    pub fn run_once(&self) -> bool {
        if self.guard.is_busy() {
            info!("event=sync_tick module=sync status=skipped reason=in_flight trigger=manual");
            return false;
        }
        self.tick_tx.send(SyncTick::Manual).is_ok()
    }
}

impl Drop for SyncController {
    fn drop(&mut self) {
        self.stop();
    }
}
