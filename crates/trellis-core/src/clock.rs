//! Time abstraction for testability
//!
//! Route freshness is judged against a monotonic clock, exposed as
//! nanoseconds since the clock's origin so it matches the wire shape of
//! `last_update`. Tests swap in [`ManualClock`] to drive staleness
//! deterministically instead of sleeping.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Clock abstraction
pub trait Clock: Send + Sync {
    /// Monotonic nanoseconds since the clock's origin
    fn monotonic_nanos(&self) -> i64;

    /// Current UTC wall-clock time (for wire timestamps and logs)
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Real clock backed by [`Instant`] and system time
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn monotonic_nanos(&self) -> i64 {
        self.origin.elapsed().as_nanos() as i64
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanceable clock for tests
///
/// Starts at zero and only moves when [`ManualClock::advance`] is called.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicI64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by a duration
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn monotonic_nanos(&self) -> i64 {
        self.nanos.load(Ordering::SeqCst)
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let a = clock.monotonic_nanos();
        let b = clock.monotonic_nanos();
        assert!(b >= a);
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new();
        assert_eq!(clock.monotonic_nanos(), 0);

        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.monotonic_nanos(), 5_000_000_000);

        clock.advance(Duration::from_nanos(7));
        assert_eq!(clock.monotonic_nanos(), 5_000_000_007);
    }
}
