//! Primary and companion mirror talking over the loopback transport, plus
//! the failure paths the link has to tolerate.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use urge_core::storage::keys;
use urge_core::{
    AllowanceConfig, Clock, CoreError, Database, Event, LinkState, LoopbackTransport, ManualClock,
    MemoryStore, PeerMirror, RecordingSink, RemoteAction, ReplyStatus, Store, SubstanceProfile,
    UrgeService,
};

type Service<S> = UrgeService<S, ManualClock, LoopbackTransport>;

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 20, 8, 0, 0).unwrap())
}

fn service_with<S: Store + urge_core::UsageLog>(
    store: S,
    clock: &ManualClock,
    transport: &LoopbackTransport,
    unlocked: bool,
) -> Service<S> {
    let mut service = UrgeService::new(
        store,
        clock.clone(),
        RecordingSink::new(),
        unlocked,
        transport.clone(),
        "urge-primary",
    )
    .unwrap();
    service.channel_mut().activate();
    service.channel_mut().on_activation_complete(true);
    if !service.is_configured() {
        service
            .complete_onboarding(SubstanceProfile::Snus, AllowanceConfig::new(5, 3600, 2))
            .unwrap();
    }
    service
}

// ============================================================================
// Mirror
// ============================================================================

#[test]
fn mirror_renders_context_after_take() {
    let clock = clock();
    let transport = LoopbackTransport::new(true);
    let mut service = service_with(MemoryStore::new(), &clock, &transport, true);
    assert_eq!(service.channel().state(), LinkState::Connected);

    service.take_one().unwrap();

    let mut mirror = PeerMirror::new();
    assert!(mirror.accept(transport.context().unwrap()));
    assert_eq!(mirror.daily_remaining(), 4);
    assert_eq!(mirror.panic_remaining(), 2);
    assert_eq!(mirror.substance_label(), Some("snus"));
    assert_eq!(mirror.remaining_secs(clock.now()), 3600);
}

#[test]
fn remote_take_confirms_optimistic_display() {
    let clock = clock();
    let transport = LoopbackTransport::new(true);
    let mut service = service_with(MemoryStore::new(), &clock, &transport, true);

    let mut mirror = PeerMirror::new();
    mirror.accept(transport.context().unwrap());

    let request = mirror.request_for(RemoteAction::TakeOne);
    assert_eq!(mirror.daily_remaining(), 4);

    let reply = service.on_remote_message(&request.to_json());
    assert_eq!(reply.status, ReplyStatus::Success);
    assert!(mirror.accept(transport.context().unwrap()));
    assert_eq!(mirror.daily_remaining(), 4);
    assert!(!mirror.is_ready(clock.now()));

    let events = service.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::RemoteActionHandled { action: RemoteAction::TakeOne, status: ReplyStatus::Success, .. }
    )));
}

#[test]
fn refused_remote_action_still_confirms_state() {
    let clock = clock();
    let transport = LoopbackTransport::new(true);
    let mut service = service_with(MemoryStore::new(), &clock, &transport, true);
    service.apply_manual_override(0, 0).unwrap();

    let mut mirror = PeerMirror::new();
    mirror.accept(transport.context().unwrap());
    let sequence = mirror.watermark().unwrap();

    let request = mirror.request_for(RemoteAction::UsePanic);
    let reply = service.on_remote_message(&request.to_json());
    assert_eq!(reply.status, ReplyStatus::OutOfAllowance);

    let confirmation = transport.context().unwrap();
    assert!(confirmation.sequence > sequence);
    assert!(mirror.accept(confirmation));
    assert_eq!(mirror.panic_remaining(), 0);
}

#[test]
fn stale_payloads_are_dropped_by_mirror() {
    let clock = clock();
    let transport = LoopbackTransport::new(true);
    let mut service = service_with(MemoryStore::new(), &clock, &transport, true);
    service.take_one().unwrap();
    service.use_panic().unwrap();

    let mut mirror = PeerMirror::new();
    assert!(mirror.accept(transport.context().unwrap()));

    // Immediate messages may arrive late and out of order.
    for old in transport.messages() {
        assert!(!mirror.accept(old));
    }
    assert_eq!(mirror.panic_remaining(), 1);
}

#[test]
fn unreachable_peer_gets_context_only() {
    let clock = clock();
    let transport = LoopbackTransport::new(true);
    let mut service = service_with(MemoryStore::new(), &clock, &transport, true);
    let delivered = transport.messages().len();

    transport.set_reachable(false);
    service.channel_mut().on_reachability_changed(false);
    service.take_one().unwrap();

    assert_eq!(transport.messages().len(), delivered);
    assert_eq!(transport.context().unwrap().daily_remaining, 4);
}

#[test]
fn sequence_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("urge.db");
    let clock = clock();
    let transport = LoopbackTransport::new(true);

    let last = {
        let mut service = service_with(Database::open_at(&path).unwrap(), &clock, &transport, true);
        service.take_one().unwrap();
        service.channel().sequence()
    };
    assert_eq!(
        Database::open_at(&path)
            .unwrap()
            .get_u64(keys::COMPANION_SEQUENCE)
            .unwrap(),
        Some(last)
    );

    let mut service = service_with(Database::open_at(&path).unwrap(), &clock, &transport, true);
    service.resume().unwrap();
    assert!(transport.context().unwrap().sequence > last);
}

// ============================================================================
// Entitlement
// ============================================================================

#[test]
fn locked_feature_skips_pushes_and_refuses_actions() {
    let clock = clock();
    let transport = LoopbackTransport::new(true);
    let mut service = service_with(MemoryStore::new(), &clock, &transport, false);

    service.take_one().unwrap();
    assert!(transport.context().is_none());
    assert!(transport.messages().is_empty());

    let reply = service.on_remote_message(r#"{"action":"takeOne"}"#);
    assert_eq!(reply.status, ReplyStatus::FeatureLocked);
    assert_eq!(service.ledger().unwrap().daily_remaining(), 4);
}

// ============================================================================
// Persistence failure
// ============================================================================

#[test]
fn failing_store_rolls_back_take() {
    let clock = clock();
    let transport = LoopbackTransport::new(true);
    let sink = Arc::new(RecordingSink::new());
    let mut service = UrgeService::new(
        MemoryStore::new(),
        clock.clone(),
        Arc::clone(&sink),
        true,
        transport.clone(),
        "urge-primary",
    )
    .unwrap();
    service
        .complete_onboarding(SubstanceProfile::Snus, AllowanceConfig::new(5, 3600, 2))
        .unwrap();
    service.drain_events();
    let before = service.snapshot().unwrap();
    let pushes = transport.context().unwrap().sequence;
    let notified = sink.allowance_changes().len();

    service.store_mut().set_fail_writes(true);
    let err = service.take_one().unwrap_err();
    assert!(matches!(err, CoreError::Persistence(_)));

    assert_eq!(service.snapshot().unwrap(), before);
    assert!(service.drain_events().is_empty());
    assert_eq!(sink.allowance_changes().len(), notified);
    assert_eq!(transport.context().unwrap().sequence, pushes);

    service.store_mut().set_fail_writes(false);
    service.take_one().unwrap();
    assert_eq!(service.ledger().unwrap().daily_remaining(), 4);
}

#[test]
fn failing_store_reports_failed_to_companion() {
    let clock = clock();
    let transport = LoopbackTransport::new(true);
    let mut service = service_with(MemoryStore::new(), &clock, &transport, true);

    service.store_mut().set_fail_writes(true);
    let reply = service.on_remote_message(r#"{"action":"usePanic"}"#);
    assert_eq!(reply.status, ReplyStatus::Failed);
    assert_eq!(service.ledger().unwrap().weekly_panic_remaining(), 2);
}

// ============================================================================
// Statistics
// ============================================================================

#[test]
fn stats_follow_the_usage_log() {
    let dir = TempDir::new().unwrap();
    let clock = clock();
    let transport = LoopbackTransport::new(false);
    let mut service = service_with(
        Database::open_at(&dir.path().join("urge.db")).unwrap(),
        &clock,
        &transport,
        true,
    );

    for _day in 0..3 {
        service.take_one().unwrap();
        service.take_one().unwrap();
        clock.advance_secs(24 * 3600);
        service.rollover_tick().unwrap();
    }
    service.use_panic().unwrap();

    let stats = service.stats().unwrap();
    assert_eq!(stats.total, 6);
    assert_eq!(stats.days_in_balance, 3);
    assert_eq!(stats.average_per_day, 2.0);
    assert_eq!(stats.panic_used, 1);
    // Nothing taken today yet; yesterday keeps the streak alive.
    assert_eq!(stats.current_streak, 3);

    service.change_substance().unwrap();
    assert_eq!(service.stats().unwrap().total, 0);
}

#[test]
fn failed_wipe_keeps_profile_and_usage() {
    let clock = clock();
    let transport = LoopbackTransport::new(false);
    let mut service = service_with(MemoryStore::new(), &clock, &transport, true);
    service.take_one().unwrap();

    service.store_mut().set_fail_writes(true);
    assert!(matches!(
        service.change_substance(),
        Err(CoreError::Persistence(_))
    ));
    service.store_mut().set_fail_writes(false);

    assert!(service.is_configured());
    assert_eq!(service.stats().unwrap().total, 1);
    assert_eq!(
        service.store().get_u32(keys::DAILY_REMAINING).unwrap(),
        Some(service.ledger().unwrap().daily_remaining())
    );
}
