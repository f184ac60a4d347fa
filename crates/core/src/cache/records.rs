//! Record CRUD against the `cache` table.
//!
//! Every function takes a plain rusqlite connection so the blocking and async
//! entry points share one implementation. Read paths that may also write run
//! under `BEGIN IMMEDIATE`: the write lock is taken up front, so a reader never
//! has to upgrade mid-transaction and contention surfaces at `BEGIN`.
//!
//! Each mutation commits through [`commit_unless_cancelled`]. A token that
//! fired while the call waited on a lock rolls the work back instead.

use tokio_rusqlite::rusqlite::{self, Connection, Transaction, TransactionBehavior, params};
use tokio_util::sync::CancellationToken;

use super::entry::CacheRecord;
use super::options::ResolvedExpiration;
use crate::Error;
use crate::clock::Clock;

const SELECT_RECORD: &str =
    "SELECT value, absolute_expiration, sliding_expiration, last_access FROM cache WHERE key = ?1";

const UPSERT_RECORD: &str = "INSERT INTO cache (key, value, absolute_expiration, sliding_expiration, last_access)
     VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT(key) DO UPDATE SET
         value = excluded.value,
         absolute_expiration = excluded.absolute_expiration,
         sliding_expiration = excluded.sliding_expiration,
         last_access = excluded.last_access";

const DELETE_RECORD: &str = "DELETE FROM cache WHERE key = ?1";

// max() keeps last_access monotonic if the clock steps backwards.
const TOUCH_RECORD: &str = "UPDATE cache SET last_access = max(last_access, ?2) WHERE key = ?1";

const PURGE_EXPIRED: &str = "DELETE FROM cache
     WHERE (absolute_expiration IS NOT NULL AND ?1 > absolute_expiration)
        OR (sliding_expiration IS NOT NULL AND ?1 > last_access + sliding_expiration)";

fn begin(conn: &Connection) -> Result<Transaction<'_>, Error> {
    Ok(Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?)
}

/// Commit `tx`, or roll it back with `Error::Cancelled` if `cancel` has fired.
///
/// `None` means the caller cannot be cancelled (the blocking entry points).
fn commit_unless_cancelled(tx: Transaction<'_>, cancel: Option<&CancellationToken>) -> Result<(), Error> {
    if cancel.is_some_and(CancellationToken::is_cancelled) {
        tx.rollback()?;
        tracing::debug!("cache operation cancelled before commit");
        return Err(Error::Cancelled);
    }
    tx.commit()?;
    Ok(())
}

/// Fetch a record without judging it.
pub fn read(conn: &Connection, key: &str) -> Result<Option<CacheRecord>, Error> {
    let result = conn.query_row(SELECT_RECORD, params![key], |row| {
        Ok(CacheRecord {
            value: row.get(0)?,
            absolute_expiration: row.get(1)?,
            sliding_expiration: row.get(2)?,
            last_access: row.get(3)?,
        })
    });

    match result {
        Ok(record) => Ok(Some(record)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Return the payload of a live record, evicting it if it has expired and
/// extending its sliding window otherwise.
///
/// "Now" is read after the lock is held, so the decision and the mutation it
/// triggers commit together.
pub fn load_live(
    conn: &Connection, key: &str, clock: &dyn Clock, cancel: Option<&CancellationToken>,
) -> Result<Option<Vec<u8>>, Error> {
    let tx = begin(conn)?;

    let Some(record) = read(&tx, key)? else {
        commit_unless_cancelled(tx, cancel)?;
        tracing::debug!(key, "cache miss");
        return Ok(None);
    };

    let now = clock.unix_now();
    if record.is_expired(now) {
        tx.execute(DELETE_RECORD, params![key])?;
        commit_unless_cancelled(tx, cancel)?;
        tracing::debug!(key, now, expired_at = record.expires_at(), "evicted expired cache entry");
        return Ok(None);
    }

    if record.sliding_expiration.is_some() {
        tx.execute(TOUCH_RECORD, params![key, now])?;
    }

    commit_unless_cancelled(tx, cancel)?;
    tracing::debug!(key, "cache hit");
    Ok(Some(record.value))
}

/// Insert or fully replace a record.
pub fn upsert(
    conn: &Connection, key: &str, value: &[u8], expiration: ResolvedExpiration, now: i64,
    cancel: Option<&CancellationToken>,
) -> Result<(), Error> {
    let tx = begin(conn)?;
    tx.execute(UPSERT_RECORD, params![key, value, expiration.absolute, expiration.sliding, now])?;
    commit_unless_cancelled(tx, cancel)?;

    tracing::debug!(
        key,
        bytes = value.len(),
        absolute = expiration.absolute,
        sliding = expiration.sliding,
        "stored cache entry"
    );
    Ok(())
}

/// Restart the sliding window of a record that has one.
///
/// Only the presence of a sliding window is checked, not liveness. Returns
/// whether a record was touched.
pub fn refresh(
    conn: &Connection, key: &str, clock: &dyn Clock, cancel: Option<&CancellationToken>,
) -> Result<bool, Error> {
    let tx = begin(conn)?;

    let sliding = tx.query_row("SELECT sliding_expiration FROM cache WHERE key = ?1", params![key], |row| {
        row.get::<_, Option<i64>>(0)
    });

    let touched = match sliding {
        Ok(Some(_)) => {
            tx.execute(TOUCH_RECORD, params![key, clock.unix_now()])?;
            true
        }
        Ok(None) | Err(rusqlite::Error::QueryReturnedNoRows) => false,
        Err(e) => return Err(e.into()),
    };

    commit_unless_cancelled(tx, cancel)?;
    tracing::debug!(key, touched, "refreshed cache entry");
    Ok(touched)
}

/// Delete a record. Returns whether one existed.
pub fn delete(conn: &Connection, key: &str, cancel: Option<&CancellationToken>) -> Result<bool, Error> {
    let tx = begin(conn)?;
    let deleted = tx.execute(DELETE_RECORD, params![key])?;
    commit_unless_cancelled(tx, cancel)?;

    tracing::debug!(key, deleted, "removed cache entry");
    Ok(deleted > 0)
}

/// Delete every record that is dead at `now`.
///
/// Returns the number of deleted entries.
pub fn purge_expired(conn: &Connection, now: i64, cancel: Option<&CancellationToken>) -> Result<u64, Error> {
    let tx = begin(conn)?;
    let count = tx.execute(PURGE_EXPIRED, params![now])?;
    commit_unless_cancelled(tx, cancel)?;

    tracing::debug!(count, now, "purged expired cache entries");
    Ok(count as u64)
}
