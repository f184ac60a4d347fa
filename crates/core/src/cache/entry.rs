//! Stored cache records and the expiration evaluator.

/// One row of the `cache` table, minus its key.
///
/// All instants are whole epoch seconds; `sliding_expiration` is a window
/// length in seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    pub value: Vec<u8>,
    pub absolute_expiration: Option<i64>,
    pub sliding_expiration: Option<i64>,
    pub last_access: i64,
}

impl CacheRecord {
    /// Checks whether the record is dead at `now`.
    ///
    /// The absolute deadline and the sliding window are evaluated
    /// independently; either one lapsing is enough. Being exactly at a
    /// deadline is still live.
    pub fn is_expired(&self, now: i64) -> bool {
        if self.absolute_expiration.is_some_and(|deadline| now > deadline) {
            return true;
        }

        self.sliding_expiration
            .is_some_and(|window| now > self.last_access.saturating_add(window))
    }

    /// The instant after which the record is dead, if it can die at all.
    pub fn expires_at(&self) -> Option<i64> {
        let sliding = self.sliding_expiration.map(|window| self.last_access.saturating_add(window));
        match (self.absolute_expiration, sliding) {
            (Some(a), Some(s)) => Some(a.min(s)),
            (a, s) => a.or(s),
        }
    }
}
