//! Calendar boundary rules.
//!
//! Dates passed in here are already in the user's timezone. A week is named
//! by the date of its first day, so a week that straddles New Year is still
//! one week.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// First day of the calendar week.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    /// ISO 8601 week.
    #[default]
    Monday,
    /// Sunday-first week. The panic allowance refills twice per week here:
    /// once entering Sunday (a new week) and once on the Sunday to Monday
    /// step inside it, which is always a weekly boundary.
    Sunday,
}

impl WeekStart {
    /// Date of the first day of the week containing `date`.
    pub fn week_of(&self, date: NaiveDate) -> NaiveDate {
        let offset = match self {
            WeekStart::Monday => date.weekday().num_days_from_monday(),
            WeekStart::Sunday => date.weekday().num_days_from_sunday(),
        };
        date - Duration::days(i64::from(offset))
    }
}

/// A daily rollover is due when `today` is not the day of the last reset.
pub fn crossed_day_boundary(last_reset: NaiveDate, today: NaiveDate) -> bool {
    last_reset != today
}

/// A weekly rollover is due when the two dates fall in different calendar
/// weeks, or when they share a week and the step is Sunday to Monday.
pub fn crossed_week_boundary(last_reset: NaiveDate, today: NaiveDate, week_start: WeekStart) -> bool {
    if week_start.week_of(last_reset) != week_start.week_of(today) {
        return true;
    }
    last_reset.weekday() == Weekday::Sun && today.weekday() == Weekday::Mon
}
