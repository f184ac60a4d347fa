//! Per-entry expiration policy supplied on write.

use chrono::{DateTime, Duration, Utc};

use crate::Error;

/// Expiration policy for a single `set`.
///
/// Leaving every field empty stores a record that never expires.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryOptions {
    /// Fixed instant after which the record is dead.
    pub absolute_expiration: Option<DateTime<Utc>>,

    /// Deadline expressed relative to the time of the write.
    pub absolute_expiration_relative_to_now: Option<Duration>,

    /// Inactivity window; every successful read or refresh restarts it.
    pub sliding_expiration: Option<Duration>,
}

/// Expiration columns as they are written to disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedExpiration {
    pub absolute: Option<i64>,
    pub sliding: Option<i64>,
}

impl EntryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_absolute_expiration(mut self, at: DateTime<Utc>) -> Self {
        self.absolute_expiration = Some(at);
        self
    }

    pub fn with_absolute_expiration_relative_to_now(mut self, after: Duration) -> Self {
        self.absolute_expiration_relative_to_now = Some(after);
        self
    }

    pub fn with_sliding_expiration(mut self, window: Duration) -> Self {
        self.sliding_expiration = Some(window);
        self
    }

    /// Reject durations that are zero or negative.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` naming the offending field.
    pub fn validate(&self) -> Result<(), Error> {
        if self.sliding_expiration.is_some_and(|d| d <= Duration::zero()) {
            return Err(Error::InvalidInput("sliding_expiration must be positive".into()));
        }
        if self.absolute_expiration_relative_to_now.is_some_and(|d| d <= Duration::zero()) {
            return Err(Error::InvalidInput("absolute_expiration_relative_to_now must be positive".into()));
        }
        Ok(())
    }

    /// Turn the policy into stored columns for a write happening at `now`.
    ///
    /// With both an explicit deadline and a relative one, the earlier wins.
    /// Durations round up to whole seconds.
    pub fn resolve(&self, now: i64) -> ResolvedExpiration {
        let explicit = self.absolute_expiration.map(|at| at.timestamp());
        let relative = self
            .absolute_expiration_relative_to_now
            .map(|after| now.saturating_add(ceil_seconds(after)));

        let absolute = match (explicit, relative) {
            (Some(e), Some(r)) => Some(e.min(r)),
            (e, r) => e.or(r),
        };

        ResolvedExpiration { absolute, sliding: self.sliding_expiration.map(ceil_seconds) }
    }
}

fn ceil_seconds(duration: Duration) -> i64 {
    let whole = duration.num_seconds();
    if duration.subsec_nanos() > 0 { whole.saturating_add(1) } else { whole }
}
