//! Time sources and the recurring idle-check tick

use crate::lock;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Source of "now" for the connection clock
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *lock(&self.offset) += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *lock(&self.offset)
    }
}

/// Schedules the periodic idle check on the event loop
///
/// The loop asks how long it may block, then calls [`IdleTimer::due`] after
/// waking; a due tick re-arms itself one interval later.
#[derive(Debug, Clone)]
pub struct IdleTimer {
    interval: Duration,
    next_tick: Instant,
}

impl IdleTimer {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_tick: now + interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true (and re-arms) when the tick has come
    pub fn due(&mut self, now: Instant) -> bool {
        if now >= self.next_tick {
            self.next_tick = now + self.interval;
            true
        } else {
            false
        }
    }

    /// How long the loop may sleep before the next tick
    pub fn time_until_next(&self, now: Instant) -> Duration {
        self.next_tick.saturating_duration_since(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now() - start, Duration::from_secs(5));
    }

    #[test]
    fn test_idle_timer_ticks() {
        let start = Instant::now();
        let mut timer = IdleTimer::new(Duration::from_secs(3), start);

        assert!(!timer.due(start));
        assert_eq!(timer.time_until_next(start), Duration::from_secs(3));

        let later = start + Duration::from_secs(3);
        assert!(timer.due(later));
        assert!(!timer.due(later));
        assert_eq!(timer.time_until_next(later), Duration::from_secs(3));

        // past the deadline the wait is zero, never negative
        assert_eq!(
            timer.time_until_next(later + Duration::from_secs(10)),
            Duration::ZERO
        );
    }
}
