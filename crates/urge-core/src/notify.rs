//! Side-effecting notification boundary.
//!
//! The core decides *when* to notify; presenting the notification (banner,
//! sound, haptic cue) is the sink's business.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::snapshot::Snapshot;
use crate::substance::SubstanceProfile;

/// Sent once when a countdown runs out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryNotice {
    pub substance: SubstanceProfile,
    pub ended_at: DateTime<Utc>,
}

pub trait NotificationSink {
    /// The wait is over. Called exactly once per countdown.
    fn countdown_expired(&self, notice: &ExpiryNotice);

    /// Allowance counts changed (take, panic, override, rollover, day reset).
    fn allowance_changed(&self, snapshot: &Snapshot);
}

impl<S: NotificationSink + ?Sized> NotificationSink for Arc<S> {
    fn countdown_expired(&self, notice: &ExpiryNotice) {
        (**self).countdown_expired(notice)
    }

    fn allowance_changed(&self, snapshot: &Snapshot) {
        (**self).allowance_changed(snapshot)
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn countdown_expired(&self, _notice: &ExpiryNotice) {}

    fn allowance_changed(&self, _snapshot: &Snapshot) {}
}

/// Keeps every call, for assertions and for embedding UIs that poll.
#[derive(Debug, Default)]
pub struct RecordingSink {
    expiries: Mutex<Vec<ExpiryNotice>>,
    allowance_changes: Mutex<Vec<Snapshot>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expiries(&self) -> Vec<ExpiryNotice> {
        self.expiries.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn allowance_changes(&self) -> Vec<Snapshot> {
        self.allowance_changes
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

impl NotificationSink for RecordingSink {
    fn countdown_expired(&self, notice: &ExpiryNotice) {
        if let Ok(mut expiries) = self.expiries.lock() {
            expiries.push(notice.clone());
        }
    }

    fn allowance_changed(&self, snapshot: &Snapshot) {
        if let Ok(mut changes) = self.allowance_changes.lock() {
            changes.push(snapshot.clone());
        }
    }
}

/// Uniform pick from the substance's celebration table.
pub fn celebration_message<R: Rng + ?Sized>(substance: SubstanceProfile, rng: &mut R) -> &'static str {
    substance
        .celebration_messages()
        .choose(rng)
        .copied()
        .unwrap_or("Done!")
}

/// [`celebration_message`] with the thread-local generator.
pub fn random_celebration(substance: SubstanceProfile) -> &'static str {
    celebration_message(substance, &mut rand::thread_rng())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn celebration_comes_from_the_substance_table() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let msg = celebration_message(SubstanceProfile::Cigarette, &mut rng);
            assert!(SubstanceProfile::Cigarette.celebration_messages().contains(&msg));
        }
    }

    #[test]
    fn recording_sink_keeps_calls() {
        let sink = RecordingSink::new();
        let notice = ExpiryNotice {
            substance: SubstanceProfile::Snus,
            ended_at: Utc::now(),
        };
        sink.countdown_expired(&notice);
        assert_eq!(sink.expiries(), vec![notice]);
        assert!(sink.allowance_changes().is_empty());
    }
}
