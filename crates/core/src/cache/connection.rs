//! Database connection management with pragma configuration.
//!
//! Bootstrap prepares the file once: parent directory, WAL journal mode and
//! schema migrations. After that every connection, blocking or async, only
//! applies the per-connection pragmas and the busy timeout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_rusqlite::rusqlite;

use super::migrations;
use crate::Error;

const CONNECTION_PRAGMAS: &str = "PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;";

/// Create the cache file and bring its schema up to date.
///
/// # Errors
///
/// Returns `Error::Bootstrap` if the parent directory cannot be created, or a
/// database error if the file cannot be opened or migrated.
pub fn bootstrap(path: &Path, busy_timeout: Duration) -> Result<(), Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|source| Error::Bootstrap { path: parent.to_path_buf(), source })?;
    }

    let mut conn = open_blocking(path, busy_timeout)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    migrations::run(&mut conn)?;

    tracing::info!(path = %path.display(), "cache database ready");
    Ok(())
}

/// Open a short-lived connection for one blocking operation.
pub fn open_blocking(path: &Path, busy_timeout: Duration) -> Result<rusqlite::Connection, Error> {
    let conn = rusqlite::Connection::open(path)?;
    configure(&conn, busy_timeout)?;
    Ok(conn)
}

/// Open the background connection used by the async entry points.
///
/// tokio-rusqlite runs every call on a dedicated thread, so calls issued
/// through one handle execute one after another.
pub async fn open_async(path: PathBuf, busy_timeout: Duration) -> Result<tokio_rusqlite::Connection, Error> {
    let conn = tokio_rusqlite::Connection::open(path)
        .await
        .map_err(Error::from)?;

    conn.call(move |conn| configure(conn, busy_timeout))
        .await
        .map_err(Error::from)?;

    Ok(conn)
}

fn configure(conn: &rusqlite::Connection, busy_timeout: Duration) -> Result<(), Error> {
    // rusqlite defaults to a 5s busy handler; zero makes contention fail fast.
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch(CONNECTION_PRAGMAS)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn journal_mode(conn: &rusqlite::Connection) -> String {
        conn.query_row("PRAGMA journal_mode", [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_bootstrap_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/cache.db");

        bootstrap(&path, Duration::ZERO).unwrap();

        assert!(path.exists());
        let conn = open_blocking(&path, Duration::ZERO).unwrap();
        assert_eq!(journal_mode(&conn), "wal");
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        bootstrap(&path, Duration::ZERO).unwrap();
        bootstrap(&path, Duration::ZERO).unwrap();
    }

    #[test]
    fn test_bootstrap_fails_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let result = bootstrap(&blocker.join("cache.db"), Duration::ZERO);
        assert!(matches!(result, Err(Error::Bootstrap { .. })));
    }

    #[test]
    fn test_bare_file_name_needs_no_directory() {
        let path = Path::new("cache.db");
        assert_eq!(path.parent().filter(|p| !p.as_os_str().is_empty()), None);
    }

    #[tokio::test]
    async fn test_open_async() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        bootstrap(&path, Duration::ZERO).unwrap();

        let conn = open_async(path, Duration::ZERO).await.unwrap();
        let version = conn
            .call(|conn| conn.query_row("SELECT sqlite_version()", [], |row| row.get::<_, String>(0)))
            .await
            .unwrap();
        assert!(!version.is_empty());
    }
}
