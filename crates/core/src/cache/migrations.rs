//! Database schema migrations.
//!
//! The applied version lives in SQLite's `user_version` header field rather
//! than a bookkeeping table, so the file keeps exactly one table. Migrations
//! use `CREATE ... IF NOT EXISTS` and adopt files written before versioning.

use tokio_rusqlite::rusqlite::Connection;

use super::Error;

/// Migration list: (version, SQL), applied in order.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../migrations/001_cache.sql"))];

/// Newest schema version this build understands.
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map_or(0, |(version, _)| *version)
}

/// Run any pending migrations.
///
/// Each migration and its version bump commit together.
///
/// # Errors
///
/// Returns `Error::MigrationFailed` if the file was written by a newer schema,
/// or a database error if a migration fails to execute.
pub fn run(conn: &mut Connection) -> Result<(), Error> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if current > latest_version() {
        return Err(Error::MigrationFailed(format!(
            "schema version {current} is newer than supported version {}",
            latest_version()
        )));
    }

    for (version, sql) in MIGRATIONS {
        if *version > current {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)?;
            tx.pragma_update(None, "user_version", *version)?;
            tx.commit()?;
            tracing::debug!(version, "applied cache schema migration");
        }
    }

    Ok(())
}
