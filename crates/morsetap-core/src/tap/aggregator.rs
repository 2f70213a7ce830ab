//! Burst aggregation state machine
//!
//! Collects discrete tap events into bursts using a rolling deadline: each
//! tap extends the deadline by the configured window, and a pause of at
//! least one window finalizes the burst into a value of 1-5.
//!
//! The aggregator is deliberately clock-free: callers inject the current
//! [`Instant`] on every operation, which keeps the state machine fully
//! deterministic under test. [`super::session::TapSession`] drives it with
//! real timers.

use std::time::{Duration, Instant};

use crate::config::clamp_window_ms;
use crate::tap::trigger::TapSource;
use crate::MAX_SIGNAL_VALUE;

/// Result of a finalized burst
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurstOutcome {
    /// Emitted value, `min(raw_count, 5)`
    pub value: u8,
    /// Tap count at finalization, before clamping
    pub raw_count: u32,
    /// True when `raw_count` exceeded the maximum value
    pub clamped: bool,
}

/// Telemetry snapshot for countdown rendering while a burst is open
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Elapsed fraction of the window since the burst started, in [0, 1]
    pub fraction: f64,
    /// Time left until the current deadline fires
    pub remaining: Duration,
}

/// Burst aggregation state machine
///
/// Two states: idle (`count == 0`, no deadline) and accumulating
/// (`count >= 1`, exactly one deadline armed). Taps move idle to
/// accumulating and push the deadline forward; the deadline elapsing
/// finalizes the burst and returns to idle.
///
/// # Example
/// ```
/// use std::time::{Duration, Instant};
/// use morsetap_core::tap::aggregator::BurstAggregator;
/// use morsetap_core::tap::trigger::TapSource;
///
/// let mut agg = BurstAggregator::new(700);
/// let t0 = Instant::now();
/// agg.tick_at(TapSource::Key, t0);
/// agg.tick_at(TapSource::Key, t0 + Duration::from_millis(100));
///
/// let outcome = agg
///     .finalize_due(t0 + Duration::from_millis(900))
///     .expect("window elapsed");
/// assert_eq!(outcome.value, 2);
/// ```
#[derive(Debug)]
pub struct BurstAggregator {
    /// Taps observed in the current burst; 0 means idle
    count: u32,
    /// Time of the first tap in the current burst
    started_at: Option<Instant>,
    /// Rolling deadline, `last tap + window`
    deadline_at: Option<Instant>,
    /// Configured burst window
    window: Duration,
}

impl BurstAggregator {
    /// Create an idle aggregator with the given window in milliseconds.
    ///
    /// The window is clamped to [150, 2000] ms.
    pub fn new(window_ms: u32) -> Self {
        Self {
            count: 0,
            started_at: None,
            deadline_at: None,
            window: Duration::from_millis(u64::from(clamp_window_ms(window_ms))),
        }
    }

    /// Register one qualifying tap observed at `now`.
    ///
    /// The first tap opens a burst; every tap re-arms the deadline to
    /// `now + window`, reading the currently configured window. A window
    /// changed mid-burst therefore takes effect on the next tap, never on
    /// the deadline already armed.
    pub fn tick_at(&mut self, source: TapSource, now: Instant) {
        if self.count == 0 {
            self.count = 1;
            self.started_at = Some(now);
            tracing::debug!(source = source.as_str(), "burst started");
        } else {
            self.count += 1;
            tracing::trace!(source = source.as_str(), count = self.count, "tap registered");
        }
        self.deadline_at = Some(now + self.window);
    }

    /// Finalize the current burst if its deadline has passed.
    ///
    /// Returns the outcome when a burst was open and `now` is at or past
    /// the deadline, `None` otherwise. State is reset to idle *before* the
    /// outcome is handed back, so an observer that panics while handling it
    /// cannot leave the aggregator stuck accumulating.
    pub fn finalize_due(&mut self, now: Instant) -> Option<BurstOutcome> {
        let deadline = self.deadline_at?;
        if now < deadline {
            return None;
        }
        self.finalize()
    }

    /// Compute the outcome of the open burst and reset to idle.
    ///
    /// No-ops when idle, which also covers a deadline firing after a racing
    /// [`cancel`](Self::cancel).
    fn finalize(&mut self) -> Option<BurstOutcome> {
        if self.count == 0 {
            return None;
        }
        let raw_count = self.count;

        self.count = 0;
        self.started_at = None;
        self.deadline_at = None;

        let max = u32::from(MAX_SIGNAL_VALUE);
        let outcome = BurstOutcome {
            value: raw_count.min(max) as u8,
            raw_count,
            clamped: raw_count > max,
        };
        tracing::debug!(
            value = outcome.value,
            raw_count = outcome.raw_count,
            clamped = outcome.clamped,
            "burst finalized"
        );
        Some(outcome)
    }

    /// Abort the current burst without emitting.
    ///
    /// Safe to call at any time; calling while idle is a no-op.
    pub fn cancel(&mut self) {
        if self.count > 0 {
            tracing::debug!(count = self.count, "burst cancelled");
        }
        self.count = 0;
        self.started_at = None;
        self.deadline_at = None;
    }

    /// Update the window used by the *next* deadline computation.
    ///
    /// Clamped to [150, 2000] ms. A deadline already armed for the current
    /// burst is left untouched.
    pub fn set_window_ms(&mut self, window_ms: u32) {
        self.window = Duration::from_millis(u64::from(clamp_window_ms(window_ms)));
    }

    /// Configured window in milliseconds
    pub fn window_ms(&self) -> u32 {
        self.window.as_millis() as u32
    }

    /// Taps observed in the current burst (0 while idle)
    pub fn count(&self) -> u32 {
        self.count
    }

    /// True while a burst is open
    pub fn is_accumulating(&self) -> bool {
        self.count > 0
    }

    /// The armed deadline, if a burst is open
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline_at
    }

    /// Countdown telemetry for the open burst, `None` while idle.
    ///
    /// `fraction` is elapsed-since-start over the window, clamped to [0, 1]
    /// (it saturates at 1 for multi-tap bursts that outlive one window);
    /// `remaining` is the time left until the armed deadline, floored at
    /// zero.
    pub fn progress_at(&self, now: Instant) -> Option<Progress> {
        let started = self.started_at?;
        let deadline = self.deadline_at?;
        let elapsed = now.saturating_duration_since(started);
        let fraction = (elapsed.as_secs_f64() / self.window.as_secs_f64()).clamp(0.0, 1.0);
        Some(Progress {
            fraction,
            remaining: deadline.saturating_duration_since(now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_starts_idle() {
        let agg = BurstAggregator::new(700);
        assert_eq!(agg.count(), 0);
        assert!(!agg.is_accumulating());
        assert!(agg.deadline().is_none());
    }

    #[test]
    fn test_window_clamped_on_new() {
        assert_eq!(BurstAggregator::new(50).window_ms(), 150);
        assert_eq!(BurstAggregator::new(5000).window_ms(), 2000);
        assert_eq!(BurstAggregator::new(700).window_ms(), 700);
    }

    #[test]
    fn test_first_tick_opens_burst() {
        let mut agg = BurstAggregator::new(700);
        let t0 = Instant::now();

        agg.tick_at(TapSource::Key, t0);

        assert_eq!(agg.count(), 1);
        assert!(agg.is_accumulating());
        assert_eq!(agg.deadline(), Some(t0 + ms(700)));
    }

    #[test]
    fn test_each_tick_rearms_deadline() {
        let mut agg = BurstAggregator::new(700);
        let t0 = Instant::now();

        agg.tick_at(TapSource::Key, t0);
        agg.tick_at(TapSource::Tap, t0 + ms(300));

        assert_eq!(agg.count(), 2);
        // Deadline is relative to the most recent tap, not burst start
        assert_eq!(agg.deadline(), Some(t0 + ms(300) + ms(700)));
    }

    #[test]
    fn test_no_finalize_before_deadline() {
        let mut agg = BurstAggregator::new(700);
        let t0 = Instant::now();

        agg.tick_at(TapSource::Key, t0);
        assert!(agg.finalize_due(t0 + ms(699)).is_none());
        assert_eq!(agg.count(), 1, "early finalize must not consume the burst");
    }

    #[test]
    fn test_finalize_at_deadline_resets() {
        let mut agg = BurstAggregator::new(700);
        let t0 = Instant::now();

        agg.tick_at(TapSource::Key, t0);
        let outcome = agg.finalize_due(t0 + ms(700)).expect("deadline reached");

        assert_eq!(outcome.value, 1);
        assert_eq!(outcome.raw_count, 1);
        assert!(!outcome.clamped);
        assert_eq!(agg.count(), 0);
        assert!(agg.deadline().is_none());
    }

    #[test]
    fn test_value_clamps_at_five() {
        let mut agg = BurstAggregator::new(700);
        let t0 = Instant::now();

        for i in 0..7 {
            agg.tick_at(TapSource::Key, t0 + ms(i * 10));
        }
        let outcome = agg.finalize_due(t0 + ms(60) + ms(700)).unwrap();

        assert_eq!(outcome.value, 5);
        assert_eq!(outcome.raw_count, 7);
        assert!(outcome.clamped);
    }

    #[test]
    fn test_cancel_suppresses_outcome() {
        let mut agg = BurstAggregator::new(700);
        let t0 = Instant::now();

        agg.tick_at(TapSource::Click, t0);
        agg.cancel();

        assert_eq!(agg.count(), 0);
        assert!(
            agg.finalize_due(t0 + ms(1000)).is_none(),
            "deadline firing after cancel must observe idle state and no-op"
        );
    }

    #[test]
    fn test_cancel_idempotent_while_idle() {
        let mut agg = BurstAggregator::new(700);
        agg.cancel();
        agg.cancel();
        assert_eq!(agg.count(), 0);

        // Next burst starts cleanly
        let t0 = Instant::now();
        agg.tick_at(TapSource::Key, t0);
        assert_eq!(agg.count(), 1);
    }

    #[test]
    fn test_window_change_applies_on_next_tick() {
        let mut agg = BurstAggregator::new(700);
        let t0 = Instant::now();

        agg.tick_at(TapSource::Key, t0);
        agg.set_window_ms(300);

        // Armed deadline untouched
        assert_eq!(agg.deadline(), Some(t0 + ms(700)));

        // Next tick extends with the new window
        agg.tick_at(TapSource::Key, t0 + ms(100));
        assert_eq!(agg.deadline(), Some(t0 + ms(100) + ms(300)));
    }

    #[test]
    fn test_set_window_clamps() {
        let mut agg = BurstAggregator::new(700);
        agg.set_window_ms(50);
        assert_eq!(agg.window_ms(), 150);
        agg.set_window_ms(5000);
        assert_eq!(agg.window_ms(), 2000);
    }

    #[test]
    fn test_progress_none_while_idle() {
        let agg = BurstAggregator::new(700);
        assert!(agg.progress_at(Instant::now()).is_none());
    }

    #[test]
    fn test_progress_fraction_and_remaining() {
        let mut agg = BurstAggregator::new(1000);
        let t0 = Instant::now();
        agg.tick_at(TapSource::Key, t0);

        let p = agg.progress_at(t0 + ms(250)).unwrap();
        assert!((p.fraction - 0.25).abs() < 1e-9);
        assert_eq!(p.remaining, ms(750));

        // Past the deadline the values saturate rather than going negative
        let p = agg.progress_at(t0 + ms(1500)).unwrap();
        assert!((p.fraction - 1.0).abs() < 1e-9);
        assert_eq!(p.remaining, Duration::ZERO);
    }

    #[test]
    fn test_progress_fraction_saturates_in_long_burst() {
        let mut agg = BurstAggregator::new(300);
        let t0 = Instant::now();

        // Sustained taps keep the burst open well past one window
        for i in 0..10 {
            agg.tick_at(TapSource::Key, t0 + ms(i * 200));
        }
        let p = agg.progress_at(t0 + ms(1900)).unwrap();
        assert!((p.fraction - 1.0).abs() < 1e-9);
        assert!(p.remaining > Duration::ZERO);
    }

    #[test]
    fn test_sustained_taps_delay_finalization_indefinitely() {
        let mut agg = BurstAggregator::new(300);
        let t0 = Instant::now();

        for i in 0..50 {
            let now = t0 + ms(i * 200);
            assert!(agg.finalize_due(now).is_none(), "tap stream must keep the burst open");
            agg.tick_at(TapSource::Key, now);
        }
        assert_eq!(agg.count(), 50);

        let outcome = agg.finalize_due(t0 + ms(49 * 200) + ms(300)).unwrap();
        assert_eq!(outcome.raw_count, 50);
        assert_eq!(outcome.value, 5);
    }

    #[test]
    fn test_reset_before_observer_runs() {
        // A panicking observer must not leave the aggregator accumulating.
        let mut agg = BurstAggregator::new(700);
        let t0 = Instant::now();
        agg.tick_at(TapSource::Key, t0);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let outcome = agg.finalize_due(t0 + ms(700)).unwrap();
            panic!("observer failed with {:?}", outcome);
        }));
        assert!(result.is_err());

        assert_eq!(agg.count(), 0, "state was reset before the observer ran");
        assert!(agg.deadline().is_none());
    }

    #[test]
    fn test_back_to_back_bursts_independent() {
        let mut agg = BurstAggregator::new(700);
        let t0 = Instant::now();

        agg.tick_at(TapSource::Key, t0);
        agg.tick_at(TapSource::Key, t0 + ms(100));
        let first = agg.finalize_due(t0 + ms(800)).unwrap();
        assert_eq!(first.raw_count, 2);

        let t1 = t0 + ms(2000);
        agg.tick_at(TapSource::Key, t1);
        assert_eq!(agg.count(), 1, "next burst starts from a clean slate");
        let second = agg.finalize_due(t1 + ms(700)).unwrap();
        assert_eq!(second.raw_count, 1);
    }
}
