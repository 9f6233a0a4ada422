//! Daily and weekly allowances.
//!
//! The ledger owns the counts and limits; the rollover rules decide when a
//! calendar boundary has been crossed.

mod ledger;
mod rollover;

pub use ledger::{AllowanceLedger, AllowanceState, RolloverResult};
pub use rollover::{crossed_day_boundary, crossed_week_boundary, WeekStart};

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which allowance an operation draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowanceKind {
    Daily,
    Panic,
}

impl fmt::Display for AllowanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllowanceKind::Daily => f.write_str("daily"),
            AllowanceKind::Panic => f.write_str("panic"),
        }
    }
}

/// The requested allowance is exhausted. State was left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("No {kind} allowance left")]
pub struct OutOfAllowance {
    pub kind: AllowanceKind,
}

/// Limits chosen at onboarding or in settings.
///
/// Construction clamps the wait interval to between one hour and one week,
/// and the weekly panic limit to at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceConfig {
    daily_limit: u32,
    interval_secs: u64,
    weekly_panic_limit: u32,
}

impl AllowanceConfig {
    pub const MIN_INTERVAL_SECS: u64 = 3600;
    pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 3600;
    pub const MIN_WEEKLY_PANIC_LIMIT: u32 = 1;

    pub fn new(daily_limit: u32, interval_secs: u64, weekly_panic_limit: u32) -> Self {
        Self {
            daily_limit,
            interval_secs: interval_secs.clamp(Self::MIN_INTERVAL_SECS, Self::MAX_INTERVAL_SECS),
            weekly_panic_limit: weekly_panic_limit.max(Self::MIN_WEEKLY_PANIC_LIMIT),
        }
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    pub fn weekly_panic_limit(&self) -> u32 {
        self.weekly_panic_limit
    }
}

impl Default for AllowanceConfig {
    fn default() -> Self {
        Self::new(10, 7200, 5)
    }
}
