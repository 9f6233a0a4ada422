//! Persisted key space. Shared with the companion-mirroring processes, so
//! these names are a compatibility surface.

pub const DAILY_REMAINING: &str = "dailyRemaining";
pub const WEEKLY_PANIC_REMAINING: &str = "weeklyPanicRemaining";
pub const DAILY_LIMIT: &str = "dailyLimit";
pub const PANIC_LIMIT: &str = "panicLimit";
pub const INTERVAL_SECONDS: &str = "intervalSeconds";
pub const COUNTDOWN_END_TIMESTAMP: &str = "countdownEndTimestamp";
pub const DAILY_STARTED_FLAG: &str = "dailyStartedFlag";
pub const LAST_DAILY_RESET_DATE: &str = "lastDailyResetDate";
pub const LAST_WEEKLY_RESET_DATE: &str = "lastWeeklyResetDate";
pub const SUBSTANCE_ID: &str = "substanceId";
pub const CONFIGURED_FLAG: &str = "configuredFlag";
pub const COMPANION_SEQUENCE: &str = "companionSequence";

/// Everything wiped by "change substance".
pub const PROFILE_KEYS: [&str; 11] = [
    DAILY_REMAINING,
    WEEKLY_PANIC_REMAINING,
    DAILY_LIMIT,
    PANIC_LIMIT,
    INTERVAL_SECONDS,
    COUNTDOWN_END_TIMESTAMP,
    DAILY_STARTED_FLAG,
    LAST_DAILY_RESET_DATE,
    LAST_WEEKLY_RESET_DATE,
    SUBSTANCE_ID,
    CONFIGURED_FLAG,
];
