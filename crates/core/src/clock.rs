//! Time sources for expiration decisions.
//!
//! Expiration logic never reads ambient system time directly. Every cache
//! carries an injected [`Clock`], which defaults to [`SystemClock`] and can be
//! replaced by a [`ManualClock`] or any closure to make expiry deterministic.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};

/// Source of "now" for the cache.
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;

    /// Current instant as whole epoch seconds, the resolution stored on disk.
    fn unix_now(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<F> Clock for F
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant, so a test can hand one clone to the cache and
/// advance the other.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    /// Starts at the given epoch second.
    pub fn at_unix(seconds: i64) -> Self {
        Self::new(DateTime::from_timestamp(seconds, 0).unwrap_or_default())
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::at_unix(1_000_000);
        assert_eq!(clock.unix_now(), 1_000_000);

        clock.advance(Duration::seconds(6));
        assert_eq!(clock.unix_now(), 1_000_006);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::at_unix(10);
        let handle = clock.clone();
        handle.advance(Duration::minutes(1));
        assert_eq!(clock.unix_now(), 70);
    }

    #[test]
    fn test_unix_now_truncates_subseconds() {
        let clock = ManualClock::at_unix(100);
        clock.advance(Duration::milliseconds(999));
        assert_eq!(clock.unix_now(), 100);
    }

    #[test]
    fn test_closure_is_a_clock() {
        let fixed = DateTime::from_timestamp(42, 0).unwrap();
        let clock = move || fixed;
        assert_eq!(clock.unix_now(), 42);
    }

    #[test]
    fn test_system_clock_is_close_to_utc_now() {
        let delta = (SystemClock.now() - Utc::now()).num_seconds().abs();
        assert!(delta < 5);
    }
}
