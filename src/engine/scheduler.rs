//! Tick timing.
//!
//! The engine never reads a clock itself. A [`TickSource`] decides when a
//! tick boundary is reached: [`VirtualClock`] jumps there at once
//! (simulations, tests), [`WallClock`] sleeps until it is due (live runs).
//! Both keep a fixed cadence from the start of the sequence, so a slow tick
//! does not shift the ones after it.

use std::thread;
use std::time::{Duration, Instant};

/// Source of tick boundaries.
pub trait TickSource {
    /// Time elapsed since the sequence started.
    fn elapsed(&self) -> Duration;

    /// Wait for the next tick boundary and return its time since the start.
    fn next_tick(&mut self) -> Duration;

    /// Let `duration` pass and return the new elapsed time.
    fn advance(&mut self, duration: Duration) -> Duration;

    /// Start counting again from zero (new sequence).
    fn restart(&mut self);
}

impl<T: TickSource + ?Sized> TickSource for &mut T {
    fn elapsed(&self) -> Duration {
        (**self).elapsed()
    }

    fn next_tick(&mut self) -> Duration {
        (**self).next_tick()
    }

    fn advance(&mut self, duration: Duration) -> Duration {
        (**self).advance(duration)
    }

    fn restart(&mut self) {
        (**self).restart();
    }
}

/// Deterministic clock that jumps straight to each boundary.
#[derive(Debug, Clone, Copy)]
pub struct VirtualClock {
    interval: Duration,
    now: Duration,
    next_tick: Duration,
}

impl VirtualClock {
    /// Clock ticking every `interval`, starting at zero.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        Self {
            interval,
            now: Duration::ZERO,
            next_tick: interval,
        }
    }
}

impl TickSource for VirtualClock {
    fn elapsed(&self) -> Duration {
        self.now
    }

    fn next_tick(&mut self) -> Duration {
        while self.next_tick < self.now {
            self.next_tick += self.interval;
        }
        self.now = self.next_tick;
        self.next_tick += self.interval;
        self.now
    }

    fn advance(&mut self, duration: Duration) -> Duration {
        self.now += duration;
        self.now
    }

    fn restart(&mut self) {
        self.now = Duration::ZERO;
        self.next_tick = self.interval;
    }
}

/// Real-time clock for live sessions.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    start: Instant,
    interval: Duration,
    next_tick: Duration,
}

impl WallClock {
    /// Clock ticking every `interval`, starting now.
    #[must_use]
    pub fn start(interval: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        Self {
            start: Instant::now(),
            interval,
            next_tick: interval,
        }
    }
}

impl TickSource for WallClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn next_tick(&mut self) -> Duration {
        let due = self.next_tick;
        thread::sleep(due.saturating_sub(self.elapsed()));
        self.next_tick += self.interval;
        due
    }

    fn advance(&mut self, duration: Duration) -> Duration {
        thread::sleep(duration);
        self.elapsed()
    }

    fn restart(&mut self) {
        self.start = Instant::now();
        self.next_tick = self.interval;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_clock_fixed_cadence() {
        let mut clock = VirtualClock::new(Duration::from_millis(1000));
        assert_eq!(clock.elapsed(), Duration::ZERO);
        assert_eq!(clock.next_tick(), Duration::from_millis(1000));
        assert_eq!(clock.next_tick(), Duration::from_millis(2000));
    }

    #[test]
    fn test_virtual_clock_skips_missed_boundaries() {
        let mut clock = VirtualClock::new(Duration::from_millis(1000));
        clock.advance(Duration::from_millis(2500));
        assert_eq!(clock.next_tick(), Duration::from_millis(3000));
    }

    #[test]
    fn test_virtual_clock_restart() {
        let mut clock = VirtualClock::new(Duration::from_millis(1000));
        clock.advance(Duration::from_millis(4200));
        clock.next_tick();
        clock.restart();
        assert_eq!(clock.elapsed(), Duration::ZERO);
        assert_eq!(clock.next_tick(), Duration::from_millis(1000));
    }

    #[test]
    fn test_wall_clock_restart() {
        let mut clock = WallClock::start(Duration::from_millis(5));
        clock.next_tick();
        clock.next_tick();
        clock.restart();
        assert_eq!(clock.next_tick(), Duration::from_millis(5));
    }

    #[test]
    fn test_wall_clock_waits() {
        let mut clock = WallClock::start(Duration::from_millis(5));
        let due = clock.next_tick();
        assert_eq!(due, Duration::from_millis(5));
        assert!(clock.elapsed() >= due);
    }
}
