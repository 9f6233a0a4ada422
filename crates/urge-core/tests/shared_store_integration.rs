//! Two services over one database file, as when the foreground ticker and a
//! one-shot command run side by side.

use std::path::Path;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use urge_core::storage::keys;
use urge_core::{
    AllowanceConfig, Database, LoopbackTransport, ManualClock, PeerMirror, RecordingSink, Store,
    SubstanceProfile, UrgeService,
};

type Service = UrgeService<Database, ManualClock, LoopbackTransport>;

// ============================================================================
// Test Helpers
// ============================================================================

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 12, 9, 0, 0).unwrap())
}

fn open(
    path: &Path,
    clock: &ManualClock,
    sink: Arc<RecordingSink>,
    transport: &LoopbackTransport,
) -> Service {
    let mut service = UrgeService::new(
        Database::open_at(path).unwrap(),
        clock.clone(),
        sink,
        true,
        transport.clone(),
        "urge-primary",
    )
    .unwrap();
    service.resume().unwrap();
    service
}

fn pair(config: AllowanceConfig) -> (TempDir, ManualClock, Service, Service) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("urge.db");
    let clock = clock();
    let transport = LoopbackTransport::new(false);

    let mut first = open(&path, &clock, Arc::new(RecordingSink::new()), &transport);
    first
        .complete_onboarding(SubstanceProfile::Snus, config)
        .unwrap();
    let second = open(&path, &clock, Arc::new(RecordingSink::new()), &transport);
    (dir, clock, first, second)
}

// ============================================================================
// Lost updates
// ============================================================================

#[test]
fn rollover_keeps_panic_used_by_other_process() {
    let (dir, clock, mut ticker, mut command) = pair(AllowanceConfig::new(8, 3600, 3));

    command.use_panic().unwrap();
    command.use_panic().unwrap();

    clock.set(Utc.with_ymd_and_hms(2025, 3, 13, 0, 0, 30).unwrap());
    let result = ticker.rollover_tick().unwrap();
    assert!(result.daily);
    assert!(!result.weekly);

    assert_eq!(ticker.ledger().unwrap().weekly_panic_remaining(), 1);
    let reopened = Database::open_at(&dir.path().join("urge.db")).unwrap();
    assert_eq!(reopened.get_u32(keys::WEEKLY_PANIC_REMAINING).unwrap(), Some(1));
}

#[test]
fn take_builds_on_other_process_count() {
    let (_dir, _clock, mut first, mut second) = pair(AllowanceConfig::new(8, 3600, 3));

    first.take_one().unwrap();
    second.take_one().unwrap();
    first.take_one().unwrap();

    assert_eq!(first.ledger().unwrap().daily_remaining(), 5);
    assert_eq!(
        second.store().get_u32(keys::DAILY_REMAINING).unwrap(),
        Some(5)
    );
}

#[test]
fn stop_from_other_process_is_not_undone() {
    let (_dir, _clock, mut ticker, mut command) = pair(AllowanceConfig::new(8, 3600, 3));
    ticker.take_one().unwrap();

    command.stop().unwrap();
    ticker.use_panic().unwrap();

    assert!(ticker.is_ready());
    assert!(ticker
        .store()
        .get(keys::COUNTDOWN_END_TIMESTAMP)
        .unwrap()
        .is_none());
}

// ============================================================================
// Countdown seen across processes
// ============================================================================

#[test]
fn countdown_started_elsewhere_expires_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("urge.db");
    let clock = clock();
    let transport = LoopbackTransport::new(false);
    let ticker_sink = Arc::new(RecordingSink::new());
    let command_sink = Arc::new(RecordingSink::new());

    let mut ticker = open(&path, &clock, Arc::clone(&ticker_sink), &transport);
    ticker
        .complete_onboarding(SubstanceProfile::Snus, AllowanceConfig::new(8, 3600, 3))
        .unwrap();
    let mut command = open(&path, &clock, Arc::clone(&command_sink), &transport);

    command.take_one().unwrap();
    assert_eq!(ticker.remaining(), 3600);

    clock.advance_secs(3601);
    for _ in 0..3 {
        assert_eq!(ticker.remaining(), 0);
        assert_eq!(command.remaining(), 0);
    }
    assert_eq!(ticker_sink.expiries().len(), 1);
    assert!(command_sink.expiries().is_empty());
}

#[test]
fn onboarding_elsewhere_is_picked_up() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("urge.db");
    let clock = clock();
    let transport = LoopbackTransport::new(false);

    let mut ticker = open(&path, &clock, Arc::new(RecordingSink::new()), &transport);
    assert!(!ticker.is_configured());

    let mut command = open(&path, &clock, Arc::new(RecordingSink::new()), &transport);
    command
        .complete_onboarding(SubstanceProfile::Cigarette, AllowanceConfig::new(4, 3600, 2))
        .unwrap();

    ticker.take_one().unwrap();
    assert_eq!(ticker.substance(), Some(SubstanceProfile::Cigarette));
    assert_eq!(ticker.ledger().unwrap().daily_remaining(), 3);
    assert!(ticker
        .complete_onboarding(SubstanceProfile::Snus, AllowanceConfig::default())
        .is_err());
}

#[test]
fn companion_sequence_stays_monotonic_across_processes() {
    let (_dir, _clock, mut first, mut second) = pair(AllowanceConfig::new(8, 3600, 3));
    let mut mirror = PeerMirror::new();

    first.take_one().unwrap();
    assert!(mirror.accept(first.channel().transport().context().unwrap()));
    second.use_panic().unwrap();
    assert!(mirror.accept(second.channel().transport().context().unwrap()));
    first.take_one().unwrap();
    assert!(mirror.accept(first.channel().transport().context().unwrap()));

    assert_eq!(mirror.daily_remaining(), 6);
    assert_eq!(mirror.panic_remaining(), 2);
}
