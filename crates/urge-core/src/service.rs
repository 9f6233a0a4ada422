//! The explicitly constructed service that ties the components together.
//!
//! Every user-facing operation goes through [`UrgeService`]. Other processes
//! write to the same store, so every read and mutation starts from what the
//! store holds now. Mutations follow one rule: reload the profile, copy it,
//! apply the change, write every affected key in one batch. If the batch fails the copy is restored and the
//! operation reports [`CoreError::Persistence`] without emitting events,
//! notifications or companion pushes.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::allowance::{AllowanceConfig, AllowanceLedger, AllowanceState, RolloverResult, WeekStart};
use crate::clock::Clock;
use crate::companion::{
    CompanionSyncChannel, PeerTransport, RemoteAction, RemoteReply, RemoteRequest, ReplyStatus,
};
use crate::entitlement::EntitlementOracle;
use crate::error::{CoreError, Result, StoreError, ValidationError};
use crate::events::Event;
use crate::notify::{ExpiryNotice, NotificationSink};
use crate::snapshot::Snapshot;
use crate::stats::{summarize, UsageRecord, UsageStats};
use crate::storage::{encode_timestamp, keys, Store, UsageLog, Write};
use crate::substance::SubstanceProfile;
use crate::timer::{CountdownEngine, Observation};

/// Everything created at onboarding.
#[derive(Debug, Clone, PartialEq)]
struct Profile {
    substance: SubstanceProfile,
    ledger: AllowanceLedger,
    countdown: CountdownEngine,
}

impl Profile {
    fn writes(&self) -> Vec<Write<'static>> {
        let config = self.ledger.config();
        let state = self.ledger.state();
        vec![
            (keys::SUBSTANCE_ID, Some(self.substance.id().to_string())),
            (keys::DAILY_LIMIT, Some(config.daily_limit().to_string())),
            (keys::PANIC_LIMIT, Some(config.weekly_panic_limit().to_string())),
            (keys::INTERVAL_SECONDS, Some(config.interval_secs().to_string())),
            (keys::DAILY_REMAINING, Some(state.daily_remaining.to_string())),
            (keys::WEEKLY_PANIC_REMAINING, Some(state.weekly_panic_remaining.to_string())),
            (keys::DAILY_STARTED_FLAG, Some(state.daily_started.to_string())),
            (keys::LAST_DAILY_RESET_DATE, state.last_daily_reset.map(encode_timestamp)),
            (keys::LAST_WEEKLY_RESET_DATE, state.last_weekly_reset.map(encode_timestamp)),
            (keys::COUNTDOWN_END_TIMESTAMP, self.countdown.end().map(encode_timestamp)),
            (keys::CONFIGURED_FLAG, Some("true".to_string())),
        ]
    }

    fn load(store: &impl Store) -> Result<Option<Self>, StoreError> {
        if !store.get_bool(keys::CONFIGURED_FLAG)?.unwrap_or(false) {
            return Ok(None);
        }

        let substance = match store.get(keys::SUBSTANCE_ID)? {
            Some(raw) => raw.parse().map_err(|_| StoreError::Corrupt {
                key: keys::SUBSTANCE_ID.to_string(),
                value: raw,
            })?,
            None => SubstanceProfile::default(),
        };

        let defaults = AllowanceConfig::default();
        let config = AllowanceConfig::new(
            store.get_u32(keys::DAILY_LIMIT)?.unwrap_or(defaults.daily_limit()),
            store
                .get_seconds(keys::INTERVAL_SECONDS)?
                .unwrap_or(defaults.interval_secs()),
            store
                .get_u32(keys::PANIC_LIMIT)?
                .unwrap_or(defaults.weekly_panic_limit()),
        );

        let state = AllowanceState {
            daily_remaining: store
                .get_u32(keys::DAILY_REMAINING)?
                .unwrap_or(config.daily_limit()),
            weekly_panic_remaining: store
                .get_u32(keys::WEEKLY_PANIC_REMAINING)?
                .unwrap_or(config.weekly_panic_limit()),
            daily_started: store.get_bool(keys::DAILY_STARTED_FLAG)?.unwrap_or(false),
            last_daily_reset: store.get_timestamp(keys::LAST_DAILY_RESET_DATE)?,
            last_weekly_reset: store.get_timestamp(keys::LAST_WEEKLY_RESET_DATE)?,
        };

        let countdown = CountdownEngine::restore(
            store.get_timestamp(keys::COUNTDOWN_END_TIMESTAMP)?,
            config.interval_secs(),
        );

        Ok(Some(Self {
            substance,
            ledger: AllowanceLedger::restore(config, state),
            countdown,
        }))
    }
}

/// The habit-moderation engine.
pub struct UrgeService<S, C, T> {
    store: S,
    clock: C,
    channel: CompanionSyncChannel<T>,
    sink: Box<dyn NotificationSink>,
    entitlement: Box<dyn EntitlementOracle>,
    week_start: WeekStart,
    profile: Option<Profile>,
    events: Vec<Event>,
}

impl<S, C, T> UrgeService<S, C, T>
where
    S: Store + UsageLog,
    C: Clock,
    T: PeerTransport,
{
    /// Build the service over an existing store. State is read from the
    /// store; nothing is written until the first operation.
    pub fn new(
        store: S,
        clock: C,
        sink: impl NotificationSink + 'static,
        entitlement: impl EntitlementOracle + 'static,
        transport: T,
        device_id: impl Into<String>,
    ) -> Result<Self> {
        let sequence = store.get_u64(keys::COMPANION_SEQUENCE)?.unwrap_or(0);
        let profile = Profile::load(&store)?;
        Ok(Self {
            store,
            clock,
            channel: CompanionSyncChannel::new(transport, device_id, sequence),
            sink: Box::new(sink),
            entitlement: Box::new(entitlement),
            week_start: WeekStart::default(),
            profile,
            events: Vec::new(),
        })
    }

    pub fn with_week_start(mut self, week_start: WeekStart) -> Self {
        self.week_start = week_start;
        self
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn channel(&self) -> &CompanionSyncChannel<T> {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut CompanionSyncChannel<T> {
        &mut self.channel
    }

    pub fn week_start(&self) -> WeekStart {
        self.week_start
    }

    pub fn is_configured(&self) -> bool {
        self.profile.is_some()
    }

    pub fn substance(&self) -> Option<SubstanceProfile> {
        self.profile.as_ref().map(|p| p.substance)
    }

    pub fn ledger(&self) -> Option<&AllowanceLedger> {
        self.profile.as_ref().map(|p| &p.ledger)
    }

    pub fn countdown(&self) -> Option<&CountdownEngine> {
        self.profile.as_ref().map(|p| &p.countdown)
    }

    /// Events queued since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Point-in-time copy of the current state. `None` before onboarding.
    pub fn snapshot(&self) -> Option<Snapshot> {
        let profile = self.profile.as_ref()?;
        let now = self.clock.now();
        let config = profile.ledger.config();
        let state = profile.ledger.state();
        Some(Snapshot {
            substance: profile.substance,
            countdown_end: profile.countdown.end(),
            remaining_secs: profile.countdown.remaining(now),
            ready: profile.countdown.is_ready(now),
            daily_remaining: state.daily_remaining,
            daily_limit: config.daily_limit(),
            weekly_panic_remaining: state.weekly_panic_remaining,
            weekly_panic_limit: config.weekly_panic_limit(),
            interval_secs: config.interval_secs(),
            daily_started: state.daily_started,
            captured_at: now,
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Rebuild state from the store and the clock, then run the checks that
    /// were missed while suspended. Call before ticks resume.
    pub fn resume(&mut self) -> Result<()> {
        self.profile = Profile::load(&self.store)?;
        debug!(configured = self.profile.is_some(), "state reloaded");
        self.refresh();
        self.rollover_tick()?;
        self.publish();
        Ok(())
    }

    /// Create the profile with full allowances.
    pub fn complete_onboarding(
        &mut self,
        substance: SubstanceProfile,
        config: AllowanceConfig,
    ) -> Result<()> {
        self.reload()?;
        if self.profile.is_some() {
            return Err(ValidationError::InvalidValue {
                field: "onboarding".to_string(),
                message: "already completed; change substance to start over".to_string(),
            }
            .into());
        }

        let now = self.clock.now();
        let mut ledger = AllowanceLedger::new(config);
        let mut countdown = CountdownEngine::new(config.interval_secs());
        ledger.check_rollover(&self.clock, self.week_start, &mut countdown);

        let profile = Profile {
            substance,
            ledger,
            countdown,
        };
        self.store.apply(&profile.writes())?;
        self.profile = Some(profile);

        info!(%substance, daily_limit = config.daily_limit(), "onboarding completed");
        self.events.push(Event::Onboarded {
            substance,
            daily_limit: config.daily_limit(),
            interval_secs: config.interval_secs(),
            weekly_panic_limit: config.weekly_panic_limit(),
            at: now,
        });
        self.notify_allowance();
        self.publish();
        Ok(())
    }

    // ── Countdown reads ──────────────────────────────────────────────

    /// Seconds left in the current wait. Detects expiry as a side effect.
    pub fn remaining(&mut self) -> u64 {
        self.refresh().unwrap_or(0)
    }

    pub fn is_ready(&mut self) -> bool {
        self.remaining() == 0
    }

    /// Display tick: a read, never a write of remaining time.
    pub fn tick(&mut self) -> u64 {
        self.remaining()
    }

    /// Rollover tick: apply any daily or weekly reset that is due.
    pub fn rollover_tick(&mut self) -> Result<RolloverResult> {
        self.refresh();
        if self.profile.is_none() {
            return Ok(RolloverResult::default());
        }

        let week_start = self.week_start;
        let result = self.mutate(|profile, clock, now| {
            let result = profile
                .ledger
                .check_rollover(clock, week_start, &mut profile.countdown);
            let mut events = Vec::new();
            if result.daily {
                events.push(Event::DailyRollover {
                    countdown_preserved: result.countdown_preserved,
                    daily_remaining: profile.ledger.daily_remaining(),
                    at: now,
                });
            }
            if result.weekly {
                events.push(Event::WeeklyRollover {
                    weekly_panic_remaining: profile.ledger.weekly_panic_remaining(),
                    at: now,
                });
            }
            Ok((result, events))
        })?;

        if result.daily || result.weekly {
            self.notify_allowance();
            self.publish();
        }
        Ok(result)
    }

    // ── Allowance operations ─────────────────────────────────────────

    /// Use one from the daily allowance and start the wait.
    pub fn take_one(&mut self) -> Result<()> {
        let first_of_day = self
            .mutate(|profile, _clock, now| {
                let first_of_day = profile.ledger.take_one()?;
                let interval = profile.ledger.config().interval_secs();
                let started = profile.countdown.start(now, interval);
                let taken = Event::Taken {
                    daily_remaining: profile.ledger.daily_remaining(),
                    first_of_day,
                    at: now,
                };
                Ok((first_of_day, vec![taken, started]))
            })
            .inspect_err(|e| self.record_rejection(e))?;

        debug!(first_of_day, "taken");
        self.log_usage(UsageRecord::take(self.clock.now()));
        self.notify_allowance();
        self.publish();
        Ok(())
    }

    /// Use one from the weekly panic allowance. The countdown is untouched.
    pub fn use_panic(&mut self) -> Result<()> {
        self.mutate(|profile, _clock, now| {
            profile.ledger.use_panic()?;
            Ok((
                (),
                vec![Event::PanicUsed {
                    weekly_panic_remaining: profile.ledger.weekly_panic_remaining(),
                    at: now,
                }],
            ))
        })
        .inspect_err(|e| self.record_rejection(e))?;

        self.log_usage(UsageRecord::panic(self.clock.now()));
        self.notify_allowance();
        self.publish();
        Ok(())
    }

    /// Cancel the current wait. Stopping a stopped countdown does nothing.
    pub fn stop(&mut self) -> Result<()> {
        let stopped = self.mutate(|profile, _clock, now| {
            Ok(match profile.countdown.stop(now) {
                Some(event) => (true, vec![event]),
                None => (false, Vec::new()),
            })
        })?;
        if stopped {
            self.publish();
        }
        Ok(())
    }

    /// Set both counts directly, limits notwithstanding.
    pub fn apply_manual_override(&mut self, daily_remaining: u32, weekly_panic_remaining: u32) -> Result<()> {
        self.mutate(|profile, _clock, now| {
            profile
                .ledger
                .apply_manual_override(daily_remaining, weekly_panic_remaining);
            Ok((
                (),
                vec![Event::AllowanceOverridden {
                    daily_remaining,
                    weekly_panic_remaining,
                    at: now,
                }],
            ))
        })?;
        self.notify_allowance();
        self.publish();
        Ok(())
    }

    /// Replace the limits. A running wait keeps its elapsed fraction under
    /// the new interval; counts above the new limits are lowered.
    pub fn update_settings(&mut self, config: AllowanceConfig) -> Result<()> {
        self.mutate(|profile, _clock, now| {
            let old_interval = profile.ledger.config().interval_secs();
            profile.ledger.set_config(config);
            let mut events = Vec::new();
            if let Some(rescaled) =
                profile
                    .countdown
                    .rescale(now, old_interval, config.interval_secs())
            {
                events.push(rescaled);
            }
            events.push(Event::SettingsChanged {
                daily_limit: config.daily_limit(),
                interval_secs: config.interval_secs(),
                weekly_panic_limit: config.weekly_panic_limit(),
                at: now,
            });
            Ok(((), events))
        })?;
        self.notify_allowance();
        self.publish();
        Ok(())
    }

    /// Start the day over: countdown stopped, full daily allowance, the
    /// first-of-day gate open again. The panic allowance is kept.
    pub fn reset_day(&mut self) -> Result<()> {
        self.mutate(|profile, _clock, now| {
            profile.countdown.stop(now);
            profile.ledger.reset_day(now);
            Ok(((), vec![Event::DayReset { at: now }]))
        })?;
        info!("day reset");
        self.notify_allowance();
        self.publish();
        Ok(())
    }

    /// Wipe every profile key and the usage log. Onboarding is required
    /// again afterwards.
    pub fn change_substance(&mut self) -> Result<()> {
        let now = self.clock.now();
        let writes: Vec<Write<'static>> = keys::PROFILE_KEYS.iter().map(|k| (*k, None)).collect();
        self.store.wipe(&writes)?;
        self.profile = None;

        info!("profile wiped");
        self.events.push(Event::ProfileWiped { at: now });
        Ok(())
    }

    // ── Companion intake ─────────────────────────────────────────────

    /// Handle a raw request from the companion.
    pub fn on_remote_message(&mut self, raw: &str) -> RemoteReply {
        match RemoteRequest::parse(raw) {
            Some(request) => self.on_remote_action(request.action),
            None => {
                debug!(raw, "unknown companion action");
                RemoteReply::new(ReplyStatus::UnknownAction)
            }
        }
    }

    /// Run `action` as if the local UI had triggered it, then confirm the
    /// resulting state through the persistent context.
    pub fn on_remote_action(&mut self, action: RemoteAction) -> RemoteReply {
        let now = self.clock.now();
        self.refresh();
        let status = if !self.entitlement.is_unlocked() {
            ReplyStatus::FeatureLocked
        } else if self.profile.is_none() {
            ReplyStatus::NotConfigured
        } else {
            let outcome = match action {
                RemoteAction::TakeOne => self.take_one(),
                RemoteAction::UsePanic => self.use_panic(),
                RemoteAction::RequestSnapshot => {
                    self.refresh();
                    self.confirm();
                    Ok(())
                }
            };
            match outcome {
                Ok(()) if action == RemoteAction::RequestSnapshot => ReplyStatus::Updating,
                Ok(()) => ReplyStatus::Success,
                Err(e) => {
                    // Undo the companion's optimistic display.
                    self.confirm();
                    if e.is_out_of_allowance() {
                        ReplyStatus::OutOfAllowance
                    } else {
                        warn!(error = %e, ?action, "remote action failed");
                        ReplyStatus::Failed
                    }
                }
            }
        };

        self.events.push(Event::RemoteActionHandled { action, status, at: now });
        RemoteReply::new(status)
    }

    // ── Statistics ───────────────────────────────────────────────────

    pub fn stats(&self) -> Result<UsageStats> {
        let records = self.store.usage_records()?;
        Ok(summarize(&records, &self.clock))
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Re-read the profile, keeping the expiry flag of a wait that is still
    /// the same one.
    fn reload(&mut self) -> Result<(), StoreError> {
        let mut loaded = Profile::load(&self.store)?;
        if let (Some(fresh), Some(current)) = (loaded.as_mut(), self.profile.as_ref()) {
            fresh.countdown.carry_expiry_from(&current.countdown);
        }
        self.profile = loaded;
        Ok(())
    }

    /// Apply `op` to the stored profile and persist it, or restore the
    /// previous profile if either step fails. Events are queued only on
    /// success.
    fn mutate<R>(
        &mut self,
        op: impl FnOnce(&mut Profile, &C, DateTime<Utc>) -> Result<(R, Vec<Event>)>,
    ) -> Result<R> {
        self.reload()?;
        let now = self.clock.now();
        let profile = self.profile.as_mut().ok_or(CoreError::NotConfigured)?;
        let previous = profile.clone();

        let (value, events) = match op(profile, &self.clock, now) {
            Ok(done) => done,
            Err(e) => {
                *profile = previous;
                return Err(e);
            }
        };

        if *profile != previous {
            if let Err(e) = self.store.apply(&profile.writes()) {
                warn!(error = %e, "write failed, operation rolled back");
                *profile = previous;
                return Err(e.into());
            }
        }

        self.events.extend(events);
        Ok(value)
    }

    /// Read the countdown, handling expiry and a clock that went backwards.
    /// Returns the remaining seconds, `None` before onboarding.
    fn refresh(&mut self) -> Option<u64> {
        if let Err(e) = self.reload() {
            warn!(error = %e, "store unreadable, using cached state");
        }
        let now = self.clock.now();
        let profile = self.profile.as_mut()?;

        match profile.countdown.observe(now) {
            Observation::Ready => Some(0),
            Observation::Running { remaining_secs } => Some(remaining_secs),
            Observation::Expired { ended_at, first } => {
                if let Err(e) = self.store.remove(keys::COUNTDOWN_END_TIMESTAMP) {
                    warn!(error = %e, "could not clear expired countdown, retrying on next read");
                    profile.countdown.defer_clear(ended_at);
                }
                if first {
                    info!(%ended_at, "countdown expired");
                    let notice = ExpiryNotice {
                        substance: profile.substance,
                        ended_at,
                    };
                    self.events.push(Event::CountdownExpired { ended_at, at: now });
                    self.sink.countdown_expired(&notice);
                    self.publish();
                }
                Some(0)
            }
            Observation::Stale { stale_end } => {
                warn!(%stale_end, %now, "clock is behind the stored countdown, clearing it");
                if let Err(e) = self.store.remove(keys::COUNTDOWN_END_TIMESTAMP) {
                    warn!(error = %e, "could not clear stale countdown");
                }
                self.events.push(Event::StaleClockRecovered { stale_end, at: now });
                self.publish();
                Some(0)
            }
        }
    }

    fn record_rejection(&mut self, error: &CoreError) {
        if let CoreError::OutOfAllowance(rejected) = error {
            debug!(kind = %rejected.kind, "allowance exhausted");
            self.events.push(Event::AllowanceRejected {
                kind: rejected.kind,
                at: self.clock.now(),
            });
        }
    }

    fn log_usage(&mut self, record: UsageRecord) {
        if let Err(e) = self.store.record_usage(&record) {
            warn!(error = %e, kind = %record.kind, "usage not recorded");
        }
    }

    fn notify_allowance(&self) {
        if let Some(snapshot) = self.snapshot() {
            self.sink.allowance_changed(&snapshot);
        }
    }

    /// Push the current state both ways: immediate message if reachable,
    /// and the store-and-forward context.
    fn publish(&mut self) {
        if !self.entitlement.is_unlocked() {
            debug!("companion feature locked, push skipped");
            return;
        }
        let Some(snapshot) = self.snapshot() else {
            return;
        };
        self.sync_sequence();
        self.channel.push_snapshot(&snapshot, snapshot.captured_at);
        self.push_context(&snapshot);
    }

    /// Another process may have pushed since this one last did.
    fn sync_sequence(&mut self) {
        match self.store.get_u64(keys::COMPANION_SEQUENCE) {
            Ok(Some(used)) => self.channel.skip_past(used),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "companion sequence unreadable"),
        }
    }

    /// Only the store-and-forward context.
    fn confirm(&mut self) {
        if !self.entitlement.is_unlocked() {
            return;
        }
        if let Some(snapshot) = self.snapshot() {
            self.push_context(&snapshot);
        }
    }

    fn push_context(&mut self, snapshot: &Snapshot) {
        self.sync_sequence();
        if let Err(e) = self
            .channel
            .push_persistent_context(snapshot, snapshot.captured_at)
        {
            warn!(error = %e, "companion context not updated");
        }
        let sequence = self.channel.sequence().to_string();
        if let Err(e) = self.store.set(keys::COMPANION_SEQUENCE, &sequence) {
            warn!(error = %e, "companion sequence not persisted");
        }
    }
}
