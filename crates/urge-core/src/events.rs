use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::allowance::AllowanceKind;
use crate::companion::{RemoteAction, ReplyStatus};
use crate::substance::SubstanceProfile;

/// Every state change in the system produces an Event.
/// The UI polls for events; the statistics collector subscribes to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Onboarded {
        substance: SubstanceProfile,
        daily_limit: u32,
        interval_secs: u64,
        weekly_panic_limit: u32,
        at: DateTime<Utc>,
    },
    CountdownStarted {
        end: DateTime<Utc>,
        interval_secs: u64,
        at: DateTime<Utc>,
    },
    CountdownStopped {
        at: DateTime<Utc>,
    },
    CountdownRescaled {
        old_interval_secs: u64,
        new_interval_secs: u64,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// Remaining time reached zero. Emitted once per countdown.
    CountdownExpired {
        ended_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// The clock was observed before the start of the stored countdown.
    StaleClockRecovered {
        stale_end: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    Taken {
        daily_remaining: u32,
        first_of_day: bool,
        at: DateTime<Utc>,
    },
    PanicUsed {
        weekly_panic_remaining: u32,
        at: DateTime<Utc>,
    },
    AllowanceRejected {
        kind: AllowanceKind,
        at: DateTime<Utc>,
    },
    AllowanceOverridden {
        daily_remaining: u32,
        weekly_panic_remaining: u32,
        at: DateTime<Utc>,
    },
    SettingsChanged {
        daily_limit: u32,
        interval_secs: u64,
        weekly_panic_limit: u32,
        at: DateTime<Utc>,
    },
    DailyRollover {
        countdown_preserved: bool,
        daily_remaining: u32,
        at: DateTime<Utc>,
    },
    WeeklyRollover {
        weekly_panic_remaining: u32,
        at: DateTime<Utc>,
    },
    DayReset {
        at: DateTime<Utc>,
    },
    /// "Change substance": every profile key and the usage log were wiped.
    ProfileWiped {
        at: DateTime<Utc>,
    },
    RemoteActionHandled {
        action: RemoteAction,
        status: ReplyStatus,
        at: DateTime<Utc>,
    },
}
