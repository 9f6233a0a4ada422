//! Companion-side read model.
//!
//! The mirror never owns truth. It shows the newest context it has accepted
//! and can shade the counts optimistically after sending an action, until
//! the primary's confirming context arrives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::message::{ContextPayload, RemoteAction, RemoteRequest};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerMirror {
    context: Option<ContextPayload>,
    /// Highest sequence accepted from `context.device_id`.
    watermark: Option<u64>,
    /// Counts adjusted locally after a sent action.
    #[serde(default)]
    optimistic: Option<(u32, u32)>,
}

impl PeerMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a payload if it is newer than what is shown. A payload from a
    /// different device starts a fresh sequence.
    pub fn accept(&mut self, payload: ContextPayload) -> bool {
        let same_device = self
            .context
            .as_ref()
            .is_some_and(|c| c.device_id == payload.device_id);

        if same_device && self.watermark.is_some_and(|w| payload.sequence <= w) {
            debug!(
                sequence = payload.sequence,
                watermark = ?self.watermark,
                "stale companion payload dropped"
            );
            return false;
        }

        self.watermark = Some(payload.sequence);
        self.context = Some(payload);
        self.optimistic = None;
        true
    }

    pub fn context(&self) -> Option<&ContextPayload> {
        self.context.as_ref()
    }

    pub fn watermark(&self) -> Option<u64> {
        self.watermark
    }

    pub fn countdown_end(&self) -> Option<DateTime<Utc>> {
        self.context.as_ref().and_then(ContextPayload::countdown_end)
    }

    /// Whole seconds left, rounded up; recomputed from the end timestamp.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        match self.countdown_end() {
            Some(end) if end > now => ((end - now).num_milliseconds() as u64).div_ceil(1000),
            _ => 0,
        }
    }

    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.remaining_secs(now) == 0
    }

    pub fn daily_remaining(&self) -> u32 {
        match self.optimistic {
            Some((daily, _)) => daily,
            None => self.context.as_ref().map_or(0, |c| c.daily_remaining),
        }
    }

    pub fn panic_remaining(&self) -> u32 {
        match self.optimistic {
            Some((_, panic)) => panic,
            None => self.context.as_ref().map_or(0, |c| c.panic_remaining),
        }
    }

    pub fn substance_label(&self) -> Option<&str> {
        self.context.as_ref().map(|c| c.substance_label.as_str())
    }

    /// Build the request for `action` and adjust the shown counts.
    pub fn request_for(&mut self, action: RemoteAction) -> RemoteRequest {
        let (daily, panic) = (self.daily_remaining(), self.panic_remaining());
        match action {
            RemoteAction::TakeOne => self.optimistic = Some((daily.saturating_sub(1), panic)),
            RemoteAction::UsePanic => self.optimistic = Some((daily, panic.saturating_sub(1))),
            RemoteAction::RequestSnapshot => {}
        }
        RemoteRequest::new(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn payload(device: &str, sequence: u64, daily: u32) -> ContextPayload {
        ContextPayload {
            countdown_end_timestamp: 0.0,
            daily_remaining: daily,
            panic_remaining: 2,
            substance_label: "snus".into(),
            sequence,
            device_id: device.into(),
            sent_at: 0,
        }
    }

    #[test]
    fn older_sequence_is_dropped() {
        let mut mirror = PeerMirror::new();
        assert!(mirror.accept(payload("urge-a", 5, 4)));
        assert!(!mirror.accept(payload("urge-a", 3, 9)));
        assert!(!mirror.accept(payload("urge-a", 5, 9)));
        assert_eq!(mirror.daily_remaining(), 4);
        assert_eq!(mirror.watermark(), Some(5));
    }

    #[test]
    fn new_device_resets_watermark() {
        let mut mirror = PeerMirror::new();
        mirror.accept(payload("urge-a", 50, 4));
        assert!(mirror.accept(payload("urge-b", 1, 7)));
        assert_eq!(mirror.daily_remaining(), 7);
    }

    #[test]
    fn optimistic_counts_until_confirmation() {
        let mut mirror = PeerMirror::new();
        mirror.accept(payload("urge-a", 1, 4));

        let request = mirror.request_for(RemoteAction::TakeOne);
        assert_eq!(request.action, RemoteAction::TakeOne);
        assert_eq!(mirror.daily_remaining(), 3);

        mirror.request_for(RemoteAction::UsePanic);
        assert_eq!(mirror.panic_remaining(), 1);

        mirror.accept(payload("urge-a", 2, 3));
        assert_eq!(mirror.daily_remaining(), 3);
        assert_eq!(mirror.panic_remaining(), 2);
    }

    #[test]
    fn remaining_is_computed_from_end() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let mut context = payload("urge-a", 1, 4);
        context.countdown_end_timestamp = (now.timestamp() + 90) as f64;
        let mut mirror = PeerMirror::new();
        mirror.accept(context);

        assert_eq!(mirror.remaining_secs(now), 90);
        assert!(!mirror.is_ready(now));
        assert!(mirror.is_ready(now + chrono::Duration::seconds(90)));
    }
}
