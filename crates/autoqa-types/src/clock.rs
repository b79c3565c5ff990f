//! Clock abstraction so components never call `Utc::now()` directly.
//!
//! A `RealClock`/test-clock split like `riptide-reliability`'s own
//! circuit breaker port uses: production code takes `Arc<dyn Clock>` and
//! tests substitute a clock they can advance by hand.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of wall-clock and monotonic time for a component.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    fn monotonic(&self) -> Instant;
}

/// Production clock backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic(&self) -> Instant {
        Instant::now()
    }
}

/// Test clock that advances only when told to.
///
/// Both `now()` and `monotonic()` are pinned to values the test controls:
/// `advance()` moves both by the same amount, so code comparing `Instant`s
/// (rate limiters, circuit breaker timeouts) sees the same elapsed time a
/// test asserts against, with no dependency on real wall-clock resolution.
pub struct ManualClock {
    epoch_millis: AtomicI64,
    started: Instant,
    offset_millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            epoch_millis: AtomicI64::new(start.timestamp_millis()),
            started: Instant::now(),
            offset_millis: AtomicI64::new(0),
        })
    }

    pub fn advance(&self, by: Duration) {
        self.epoch_millis
            .fetch_add(by.as_millis() as i64, Ordering::SeqCst);
        self.offset_millis
            .fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.epoch_millis.load(Ordering::SeqCst);
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn monotonic(&self) -> Instant {
        self.started + Duration::from_millis(self.offset_millis.load(Ordering::SeqCst) as u64)
    }
}

pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_on_demand() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now().timestamp_millis(), start.timestamp_millis());
        clock.advance(Duration::from_secs(5));
        assert_eq!(
            clock.now().timestamp_millis(),
            start.timestamp_millis() + 5000
        );
    }
}
