//! Owned timer state
//!
//! Debounce and throttle are modeled as plain state machines polled with an
//! explicit `Instant` instead of opaque callback utilities. The driver owns
//! the clock; the core stays deterministic and testable.

use std::time::{Duration, Instant};

/// Trailing debounce: reset on each event, fire after a window of silence.
///
/// Only the final event in a burst triggers a fire.
#[derive(Debug)]
pub struct Debounce {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    /// Create a debounce with the given silence window
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Record an event, restarting the window
    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    /// Check whether the window has elapsed; firing disarms the timer
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Whether an event is pending
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Disarm without firing
    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

/// Leading throttle: the first event passes, later ones are dropped until
/// the interval has elapsed.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    /// Create a throttle with the given minimum interval
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Check whether an event at `now` is allowed through
    pub fn allow(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Forget the last pass, letting the next event through immediately
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce_fires_after_silence() {
        let start = Instant::now();
        let mut debounce = Debounce::new(Duration::from_millis(500));

        debounce.trigger(start);
        assert!(!debounce.poll(start + Duration::from_millis(499)));
        assert!(debounce.poll(start + Duration::from_millis(500)));

        // Disarmed after firing
        assert!(!debounce.poll(start + Duration::from_millis(1000)));
    }

    #[test]
    fn test_debounce_restarts_on_each_event() {
        let start = Instant::now();
        let mut debounce = Debounce::new(Duration::from_millis(500));

        debounce.trigger(start);
        debounce.trigger(start + Duration::from_millis(400));

        // Original deadline has passed but the window was restarted
        assert!(!debounce.poll(start + Duration::from_millis(500)));
        assert!(debounce.poll(start + Duration::from_millis(900)));
    }

    #[test]
    fn test_debounce_cancel() {
        let start = Instant::now();
        let mut debounce = Debounce::new(Duration::from_millis(500));

        debounce.trigger(start);
        assert!(debounce.is_armed());
        debounce.cancel();
        assert!(!debounce.is_armed());
        assert!(!debounce.poll(start + Duration::from_secs(10)));
    }

    #[test]
    fn test_throttle_first_event_passes() {
        let start = Instant::now();
        let mut throttle = Throttle::new(Duration::from_millis(50));

        assert!(throttle.allow(start));
        assert!(!throttle.allow(start + Duration::from_millis(10)));
        assert!(!throttle.allow(start + Duration::from_millis(49)));
        assert!(throttle.allow(start + Duration::from_millis(50)));
    }

    #[test]
    fn test_throttle_reset() {
        let start = Instant::now();
        let mut throttle = Throttle::new(Duration::from_millis(50));

        assert!(throttle.allow(start));
        throttle.reset();
        assert!(throttle.allow(start + Duration::from_millis(1)));
    }
}
