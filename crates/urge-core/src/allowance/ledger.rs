use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::rollover::{crossed_day_boundary, crossed_week_boundary, WeekStart};
use super::{AllowanceConfig, AllowanceKind, OutOfAllowance};
use crate::clock::Clock;
use crate::timer::CountdownEngine;

/// Counts left and the rollover bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceState {
    pub daily_remaining: u32,
    pub weekly_panic_remaining: u32,
    /// Set by the first take of the day. Cleared only by a full daily
    /// rollover or an explicit day reset.
    pub daily_started: bool,
    pub last_daily_reset: Option<DateTime<Utc>>,
    pub last_weekly_reset: Option<DateTime<Utc>>,
}

impl AllowanceState {
    /// Full allowances, nothing taken yet.
    pub fn full(config: &AllowanceConfig) -> Self {
        Self {
            daily_remaining: config.daily_limit(),
            weekly_panic_remaining: config.weekly_panic_limit(),
            daily_started: false,
            last_daily_reset: None,
            last_weekly_reset: None,
        }
    }
}

/// What a rollover check did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RolloverResult {
    pub daily: bool,
    pub weekly: bool,
    /// Daily rollover happened while a countdown was running; it was kept.
    pub countdown_preserved: bool,
    /// Daily rollover stopped an expired countdown that was still stored.
    pub countdown_stopped: bool,
    /// Missing bookkeeping dates were filled in without a reset.
    pub initialised: bool,
}

impl RolloverResult {
    /// Anything needs persisting.
    pub fn changed(&self) -> bool {
        self.daily || self.weekly || self.initialised
    }
}

/// Allowance limits and counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowanceLedger {
    config: AllowanceConfig,
    state: AllowanceState,
}

impl AllowanceLedger {
    /// Fresh ledger with full allowances.
    pub fn new(config: AllowanceConfig) -> Self {
        let state = AllowanceState::full(&config);
        Self { config, state }
    }

    pub fn restore(config: AllowanceConfig, state: AllowanceState) -> Self {
        Self { config, state }
    }

    pub fn config(&self) -> &AllowanceConfig {
        &self.config
    }

    pub fn state(&self) -> &AllowanceState {
        &self.state
    }

    pub fn daily_remaining(&self) -> u32 {
        self.state.daily_remaining
    }

    pub fn weekly_panic_remaining(&self) -> u32 {
        self.state.weekly_panic_remaining
    }

    pub fn daily_started(&self) -> bool {
        self.state.daily_started
    }

    /// Replace the limits. Counts above the new limits are lowered to them.
    pub fn set_config(&mut self, config: AllowanceConfig) {
        self.config = config;
        self.state.daily_remaining = self.state.daily_remaining.min(config.daily_limit());
        self.state.weekly_panic_remaining = self
            .state
            .weekly_panic_remaining
            .min(config.weekly_panic_limit());
    }

    /// Use one from the daily allowance. Returns whether this was the first
    /// take of the day.
    pub fn take_one(&mut self) -> Result<bool, OutOfAllowance> {
        if self.state.daily_remaining == 0 {
            return Err(OutOfAllowance {
                kind: AllowanceKind::Daily,
            });
        }
        self.state.daily_remaining -= 1;
        let first_of_day = !self.state.daily_started;
        self.state.daily_started = true;
        Ok(first_of_day)
    }

    /// Use one from the weekly panic allowance. Never touches the countdown.
    pub fn use_panic(&mut self) -> Result<(), OutOfAllowance> {
        if self.state.weekly_panic_remaining == 0 {
            return Err(OutOfAllowance {
                kind: AllowanceKind::Panic,
            });
        }
        self.state.weekly_panic_remaining -= 1;
        Ok(())
    }

    /// Set both counts directly, limits notwithstanding.
    pub fn apply_manual_override(&mut self, daily_remaining: u32, weekly_panic_remaining: u32) {
        self.state.daily_remaining = daily_remaining;
        self.state.weekly_panic_remaining = weekly_panic_remaining;
    }

    /// Start the day over: full daily allowance, first-of-day gate open.
    /// The panic allowance is untouched.
    pub fn reset_day(&mut self, now: DateTime<Utc>) {
        self.state.daily_remaining = self.config.daily_limit();
        self.state.daily_started = false;
        self.state.last_daily_reset = Some(now);
    }

    /// Apply any due daily and weekly rollover. However many boundaries were
    /// missed, each kind of reset happens at most once.
    pub fn check_rollover(
        &mut self,
        clock: &impl Clock,
        week_start: WeekStart,
        countdown: &mut CountdownEngine,
    ) -> RolloverResult {
        let now = clock.now();
        let today = clock.local_date(now);
        let mut result = RolloverResult::default();

        match self.state.last_daily_reset {
            None => {
                self.state.last_daily_reset = Some(now);
                result.initialised = true;
            }
            Some(last) if crossed_day_boundary(clock.local_date(last), today) => {
                if countdown.remaining(now) > 0 {
                    self.state.daily_remaining = self.config.daily_limit();
                    result.countdown_preserved = true;
                    info!(remaining = countdown.remaining(now), "daily rollover, countdown kept");
                } else {
                    self.state.daily_remaining = self.config.daily_limit();
                    self.state.daily_started = false;
                    result.countdown_stopped = countdown.stop(now).is_some();
                    info!("daily rollover, full reset");
                }
                self.state.last_daily_reset = Some(now);
                result.daily = true;
            }
            Some(_) => {}
        }

        match self.state.last_weekly_reset {
            None => {
                self.state.last_weekly_reset = Some(now);
                result.initialised = true;
            }
            Some(last) if crossed_week_boundary(clock.local_date(last), today, week_start) => {
                self.state.weekly_panic_remaining = self.config.weekly_panic_limit();
                self.state.last_weekly_reset = Some(now);
                result.weekly = true;
                info!(?week_start, "weekly rollover");
            }
            Some(_) => {}
        }

        result
    }
}
