//! Usage statistics.
//!
//! Every take and every panic use appends a [`UsageRecord`] to the store's
//! usage log. The figures shown to the user are computed from that log on
//! demand; nothing here is persisted separately.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageKind {
    Take,
    Panic,
}

impl UsageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageKind::Take => "take",
            UsageKind::Panic => "panic",
        }
    }
}

impl fmt::Display for UsageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UsageKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "take" => Ok(UsageKind::Take),
            "panic" => Ok(UsageKind::Panic),
            other => Err(ValidationError::InvalidValue {
                field: "usage kind".to_string(),
                message: format!("unknown kind '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub kind: UsageKind,
    pub at: DateTime<Utc>,
}

impl UsageRecord {
    pub fn take(at: DateTime<Utc>) -> Self {
        Self { kind: UsageKind::Take, at }
    }

    pub fn panic(at: DateTime<Utc>) -> Self {
        Self { kind: UsageKind::Panic, at }
    }
}

/// Aggregated usage figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    /// Distinct days with at least one take.
    pub days_in_balance: u32,
    /// Takes per active day.
    pub average_per_day: f64,
    pub total: u32,
    pub panic_used: u32,
    /// Consecutive active days ending today, or ending yesterday when
    /// nothing was taken today yet.
    pub current_streak: u32,
}

/// Summarize a usage log. Days are calendar days in the clock's timezone.
pub fn summarize(records: &[UsageRecord], clock: &impl Clock) -> UsageStats {
    let today = clock.local_date(clock.now());

    let mut per_day: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    let mut panic_used = 0;
    for record in records {
        match record.kind {
            UsageKind::Take => *per_day.entry(clock.local_date(record.at)).or_default() += 1,
            UsageKind::Panic => panic_used += 1,
        }
    }

    let total: u32 = per_day.values().sum();
    let days_in_balance = per_day.len() as u32;
    let average_per_day = if days_in_balance == 0 {
        0.0
    } else {
        f64::from(total) / f64::from(days_in_balance)
    };

    let active_days: BTreeSet<NaiveDate> = per_day.keys().copied().collect();

    UsageStats {
        days_in_balance,
        average_per_day,
        total,
        panic_used,
        current_streak: current_streak(&active_days, today),
    }
}

fn current_streak(active_days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let yesterday = today - Duration::days(1);
    let mut day = if active_days.contains(&today) {
        today
    } else if active_days.contains(&yesterday) {
        yesterday
    } else {
        return 0;
    };

    let mut streak = 0;
    while active_days.contains(&day) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}
