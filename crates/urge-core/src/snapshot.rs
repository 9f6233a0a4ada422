use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::substance::SubstanceProfile;

/// Point-in-time copy of everything a display or the companion needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub substance: SubstanceProfile,
    pub countdown_end: Option<DateTime<Utc>>,
    pub remaining_secs: u64,
    pub ready: bool,
    pub daily_remaining: u32,
    pub daily_limit: u32,
    pub weekly_panic_remaining: u32,
    pub weekly_panic_limit: u32,
    pub interval_secs: u64,
    pub daily_started: bool,
    pub captured_at: DateTime<Utc>,
}
