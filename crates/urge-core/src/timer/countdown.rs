//! Countdown engine.
//!
//! The engine stores the absolute instant the current wait ends, never a
//! decrementing counter. Remaining time is recomputed from the wall clock on
//! every read, so a process that was suspended for hours reports the right
//! value on its first read after resume.
//!
//! ## State Transitions
//!
//! ```text
//! Ready -> Running -> (expired on read) -> Ready
//!            |  ^
//!            +--+ rescale
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut countdown = CountdownEngine::new(7200);
//! countdown.start(clock.now(), 7200);
//! // On every display refresh:
//! match countdown.observe(clock.now()) { .. }
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::events::Event;

/// What a read of the countdown found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// No countdown stored.
    Ready,
    Running { remaining_secs: u64 },
    /// The stored end has passed and the countdown was cleared.
    /// `first` is true only for the read that detected the transition.
    Expired { ended_at: DateTime<Utc>, first: bool },
    /// The clock is earlier than the countdown's start; cleared to ready.
    Stale { stale_end: DateTime<Utc> },
}

/// Countdown state machine.
///
/// `end == None` is the only representation of "ready"; an end in the past
/// is read as ready too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownEngine {
    end: Option<DateTime<Utc>>,
    interval_secs: u64,
    /// Set when expiry side effects have fired; reset only by `start()`.
    #[serde(skip)]
    expiry_fired: bool,
}

impl CountdownEngine {
    /// A ready countdown for the given interval.
    pub fn new(interval_secs: u64) -> Self {
        Self {
            end: None,
            interval_secs,
            expiry_fired: false,
        }
    }

    /// Rebuild from persisted values.
    pub fn restore(end: Option<DateTime<Utc>>, interval_secs: u64) -> Self {
        Self {
            end,
            interval_secs,
            expiry_fired: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    /// An end timestamp is stored. It may already be in the past.
    pub fn is_active(&self) -> bool {
        self.end.is_some()
    }

    /// Remaining milliseconds at `now`; 0 when ready or expired.
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> u64 {
        match self.end {
            Some(end) if end > now => (end - now).num_milliseconds().max(0) as u64,
            _ => 0,
        }
    }

    /// Remaining whole seconds at `now`, rounded up so the display never
    /// shows 0 before the end is actually reached.
    pub fn remaining(&self, now: DateTime<Utc>) -> u64 {
        self.remaining_ms(now).div_ceil(1000)
    }

    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.remaining_ms(now) == 0
    }

    /// 0.0 .. 1.0 progress through the current wait; 1.0 when ready.
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        if self.interval_secs == 0 || self.end.is_none() {
            return 1.0;
        }
        let total_ms = self.interval_secs as f64 * 1000.0;
        (1.0 - self.remaining_ms(now) as f64 / total_ms).clamp(0.0, 1.0)
    }

    /// The clock reads earlier than the stored countdown could have begun.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.end {
            Some(end) => secs(self.interval_secs)
                .and_then(|interval| end.checked_sub_signed(interval))
                .is_some_and(|began| now < began),
            None => false,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self, now: DateTime<Utc>, interval_secs: u64) -> Event {
        let end = after(now, secs(interval_secs));
        self.end = Some(end);
        self.interval_secs = interval_secs;
        self.expiry_fired = false;
        Event::CountdownStarted {
            end,
            interval_secs,
            at: now,
        }
    }

    /// Clear to ready. Returns `None` when already stopped.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<Event> {
        self.end.take()?;
        Some(Event::CountdownStopped { at: now })
    }

    /// Change the interval while keeping the fraction of the wait already
    /// elapsed. An idle or finished countdown only adopts the new interval.
    pub fn rescale(
        &mut self,
        now: DateTime<Utc>,
        old_interval_secs: u64,
        new_interval_secs: u64,
    ) -> Option<Event> {
        self.interval_secs = new_interval_secs;
        if self.is_ready(now) || old_interval_secs == 0 {
            return None;
        }

        let remaining_fraction =
            (self.remaining_ms(now) as f64 / (old_interval_secs as f64 * 1000.0)).clamp(0.0, 1.0);
        let new_remaining_ms = (new_interval_secs as f64 * 1000.0 * remaining_fraction).round() as i64;
        let end = after(now, Duration::try_milliseconds(new_remaining_ms.max(0)));
        self.end = Some(end);

        Some(Event::CountdownRescaled {
            old_interval_secs,
            new_interval_secs,
            remaining_secs: self.remaining(now),
            at: now,
        })
    }

    /// Read the countdown at `now`, clearing it when it has expired or the
    /// clock is found to have moved backwards.
    pub fn observe(&mut self, now: DateTime<Utc>) -> Observation {
        let Some(end) = self.end else {
            return Observation::Ready;
        };

        if self.is_stale(now) {
            self.end = None;
            return Observation::Stale { stale_end: end };
        }

        if now >= end {
            self.end = None;
            let first = !self.expiry_fired;
            self.expiry_fired = true;
            return Observation::Expired { ended_at: end, first };
        }

        Observation::Running {
            remaining_secs: self.remaining(now),
        }
    }

    /// Keep the fired flag of `previous` when it describes the same wait, so
    /// re-reading the countdown from the store does not notify twice.
    pub fn carry_expiry_from(&mut self, previous: &CountdownEngine) {
        if self.end == previous.end {
            self.expiry_fired = previous.expiry_fired;
        }
    }

    /// Put back an expired end whose clearing could not be persisted, so the
    /// next read retries the write. The fired flag is kept.
    pub fn defer_clear(&mut self, ended_at: DateTime<Utc>) {
        if self.end.is_none() {
            self.end = Some(ended_at);
        }
    }
}

fn secs(s: u64) -> Option<Duration> {
    i64::try_from(s).ok().and_then(Duration::try_seconds)
}

/// `now + delta`, saturating at the latest representable instant.
fn after(now: DateTime<Utc>, delta: Option<Duration>) -> DateTime<Utc> {
    delta
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn start_sets_end_from_interval() {
        let mut countdown = CountdownEngine::new(3600);
        assert!(countdown.is_ready(t0()));
        countdown.start(t0(), 3600);
        assert_eq!(countdown.end(), Some(t0() + Duration::seconds(3600)));
        assert_eq!(countdown.remaining(t0()), 3600);
        assert!(!countdown.is_ready(t0()));
    }

    #[test]
    fn oversized_interval_saturates_instead_of_overflowing() {
        let mut countdown = CountdownEngine::new(3600);
        countdown.start(t0(), u64::MAX);
        assert_eq!(countdown.end(), Some(DateTime::<Utc>::MAX_UTC));
        assert!(!countdown.is_ready(t0()));
        assert!(!countdown.is_stale(t0()));
        assert!(matches!(countdown.observe(t0()), Observation::Running { .. }));

        assert!(countdown.rescale(t0(), u64::MAX, 3600).is_some());
        assert!(countdown.remaining(t0()) <= 3600);
        assert!(countdown.rescale(t0(), 3600, u64::MAX).is_some());
        assert!(!countdown.is_ready(t0()));
    }

    #[test]
    fn remaining_is_recomputed_not_decremented() {
        let mut countdown = CountdownEngine::new(3600);
        countdown.start(t0(), 3600);
        // No reads in between: a long suspension.
        let later = t0() + Duration::seconds(3700);
        assert_eq!(countdown.remaining(later), 0);
        assert!(countdown.is_ready(later));
    }

    #[test]
    fn remaining_rounds_up_partial_seconds() {
        let mut countdown = CountdownEngine::new(3600);
        countdown.start(t0(), 3600);
        let almost = t0() + Duration::milliseconds(3_599_500);
        assert_eq!(countdown.remaining(almost), 1);
    }

    #[test]
    fn expiry_is_reported_once() {
        let mut countdown = CountdownEngine::new(3600);
        countdown.start(t0(), 3600);
        let later = t0() + Duration::seconds(4000);

        let first = countdown.observe(later);
        assert!(matches!(first, Observation::Expired { first: true, .. }));
        for _ in 0..5 {
            assert_eq!(countdown.observe(later), Observation::Ready);
        }
    }

    #[test]
    fn deferred_clear_does_not_refire() {
        let mut countdown = CountdownEngine::new(3600);
        countdown.start(t0(), 3600);
        let later = t0() + Duration::seconds(4000);

        let Observation::Expired { ended_at, first: true } = countdown.observe(later) else {
            panic!("expected first expiry");
        };
        countdown.defer_clear(ended_at);
        assert!(matches!(
            countdown.observe(later),
            Observation::Expired { first: false, .. }
        ));

        // A new start re-arms the notification.
        countdown.start(later, 3600);
        assert!(matches!(
            countdown.observe(later + Duration::seconds(3600)),
            Observation::Expired { first: true, .. }
        ));
    }

    #[test]
    fn backwards_clock_clears_to_ready() {
        let mut countdown = CountdownEngine::new(3600);
        countdown.start(t0(), 3600);
        let before_start = t0() - Duration::seconds(10);
        assert!(countdown.is_stale(before_start));
        assert!(matches!(countdown.observe(before_start), Observation::Stale { .. }));
        assert!(countdown.end().is_none());
    }

    #[test]
    fn stop_is_idempotent() {
        let mut countdown = CountdownEngine::new(3600);
        countdown.start(t0(), 3600);
        assert!(countdown.stop(t0()).is_some());
        assert!(countdown.stop(t0()).is_none());
        assert!(countdown.is_ready(t0()));
    }

    #[test]
    fn rescale_keeps_elapsed_fraction() {
        let mut countdown = CountdownEngine::new(7200);
        countdown.start(t0(), 7200);
        let half = t0() + Duration::seconds(3600);
        let event = countdown.rescale(half, 7200, 3600);
        assert!(matches!(event, Some(Event::CountdownRescaled { remaining_secs: 1800, .. })));
        assert_eq!(countdown.remaining(half), 1800);
        assert_eq!(countdown.interval_secs(), 3600);
        assert!(!countdown.is_stale(half));
    }

    #[test]
    fn rescale_on_idle_only_adopts_interval() {
        let mut countdown = CountdownEngine::new(7200);
        assert!(countdown.rescale(t0(), 7200, 3600).is_none());
        assert!(countdown.end().is_none());
        assert_eq!(countdown.interval_secs(), 3600);
    }

    #[test]
    fn progress_tracks_elapsed_share() {
        let mut countdown = CountdownEngine::new(4000);
        assert_eq!(countdown.progress(t0()), 1.0);
        countdown.start(t0(), 4000);
        assert_eq!(countdown.progress(t0()), 0.0);
        assert!((countdown.progress(t0() + Duration::seconds(1000)) - 0.25).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn rescale_is_proportional(
            old in 3600u64..86_400,
            new in 3600u64..86_400,
            elapsed_pct in 1u64..99,
        ) {
            let mut countdown = CountdownEngine::new(old);
            countdown.start(t0(), old);
            let now = t0() + Duration::seconds((old * elapsed_pct / 100) as i64);
            let before = countdown.remaining_ms(now) as f64 / (old as f64 * 1000.0);

            countdown.rescale(now, old, new);
            let after = countdown.remaining_ms(now) as f64 / (new as f64 * 1000.0);

            prop_assert!((before - after).abs() < 1e-3);
            prop_assert!(countdown.remaining(now) <= new);
        }
    }
}
