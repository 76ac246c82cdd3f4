use quotevault_core::{
    Quote, QuoteService, ReconciliationEngine, RemoteError, RemoteSource, SqliteKeyValueStore,
    SyncController, SyncGuard, SyncOutcome, SyncTick,
};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

const SHORT: Duration = Duration::from_millis(10);
const WAIT: Duration = Duration::from_millis(500);

struct SilentRemote;

impl RemoteSource for SilentRemote {
    fn fetch_records(&self) -> Result<Vec<serde_json::Value>, RemoteError> {
        Ok(vec![serde_json::json!({
            "id": 1,
            "title": "steady as she goes today"
        })])
    }

    fn push_quotes(&self, _quotes: &[Quote]) -> Result<(), RemoteError> {
        Ok(())
    }
}

#[test]
fn armed_controller_emits_startup_then_scheduled_ticks() {
    let (mut controller, rx) = SyncController::with_startup_delay(SyncGuard::new(), SHORT);
    controller.start(SHORT);

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), SyncTick::Startup);
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), SyncTick::Scheduled);
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), SyncTick::Scheduled);
}

#[test]
fn ticks_are_skipped_not_queued_while_a_run_is_in_flight() {
    let guard = SyncGuard::new();
    let (mut controller, rx) = SyncController::with_startup_delay(guard.clone(), SHORT);

    assert!(guard.try_begin());
    controller.start(SHORT);

    // Several intervals pass without a single tick getting through.
    std::thread::sleep(SHORT * 6);
    assert!(matches!(rx.try_recv(), Err(_)));

    // Releasing the guard lets the next interval fire again.
    guard.finish();
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), SyncTick::Scheduled);
}

#[test]
fn stop_is_idempotent_and_prevents_future_ticks() {
    let (mut controller, rx) = SyncController::with_startup_delay(SyncGuard::new(), SHORT);
    controller.start(SHORT);
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), SyncTick::Startup);

    controller.stop();
    controller.stop();
    assert!(!controller.is_armed());

    // Drain whatever was in flight at stop time, then expect silence.
    while rx.try_recv().is_ok() {}
    assert_eq!(rx.recv_timeout(SHORT * 6), Err(RecvTimeoutError::Timeout));
}

#[test]
fn toggle_flips_between_armed_and_disarmed() {
    let (mut controller, rx) = SyncController::with_startup_delay(SyncGuard::new(), SHORT);
    controller.start(SHORT);
    assert!(controller.is_armed());

    controller.toggle();
    assert!(!controller.is_armed());

    controller.toggle();
    assert!(controller.is_armed());
    assert!(rx.recv_timeout(WAIT).is_ok());
}

#[test]
fn manual_run_once_drives_a_full_reconciliation_pass() {
    let guard = SyncGuard::new();
    let (controller, rx) = SyncController::with_startup_delay(guard.clone(), SHORT);

    let storage = SqliteKeyValueStore::open_in_memory().unwrap();
    let mut service = QuoteService::open(storage.clone()).unwrap();
    service.clear_all().unwrap();
    let mut engine = ReconciliationEngine::new(storage, SilentRemote, guard);

    // The single reconciliation task: consume one tick, run the engine.
    let (report_tx, report_rx) = std::sync::mpsc::channel();
    let worker = std::thread::spawn(move || {
        let tick = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(tick, SyncTick::Manual);
        let report = engine.run(service.store_mut()).unwrap();
        report_tx.send(report).unwrap();
    });

    assert!(controller.run_once());
    let report = report_rx.recv_timeout(WAIT).unwrap();
    assert_eq!(report.outcome, SyncOutcome::Merged { added: 1 });
    worker.join().unwrap();
}

#[test]
fn run_once_is_a_no_op_while_syncing() {
    let guard = SyncGuard::new();
    let (controller, rx) = SyncController::with_startup_delay(guard.clone(), SHORT);

    assert!(guard.try_begin());
    assert!(!controller.run_once());
    assert!(rx.try_recv().is_err());

    guard.finish();
    assert!(controller.run_once());
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), SyncTick::Manual);
}
