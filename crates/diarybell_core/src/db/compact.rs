//! Offline compaction for a database file.
//!
//! # Invariants
//! - Must only run while no other connection to the file is open in-process.
//! - The private connection is closed before returning, on success and error.

use super::{DbError, DbResult};
use log::{debug, error, info};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::Instant;

/// Rebuilds the database file in place and verifies its integrity.
///
/// Opens a private connection in exclusive locking mode, runs `VACUUM`,
/// `REINDEX` and `PRAGMA optimize`, then checks `PRAGMA integrity_check`.
///
/// # Errors
/// - Returns `DbError::Sqlite` when the file cannot be opened or rebuilt.
/// - Returns `DbError::IntegrityCheckFailed` when SQLite reports damage.
pub fn compact_db(path: impl AsRef<Path>) -> DbResult<()> {
    let started_at = Instant::now();
    info!("event=db_compact module=db status=start");

    let result = Connection::open_with_flags(path.as_ref(), OpenFlags::SQLITE_OPEN_READ_WRITE)
        .map_err(DbError::from)
        .and_then(|conn| {
            let outcome = rebuild(&conn);
            let closed = conn.close().map_err(|(_, err)| DbError::from(err));
            outcome.and(closed)
        });

    match &result {
        Ok(()) => info!(
            "event=db_compact module=db status=ok duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_compact module=db status=error duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

fn rebuild(conn: &Connection) -> DbResult<()> {
    let locking_mode: String =
        conn.query_row("PRAGMA locking_mode = EXCLUSIVE;", [], |row| row.get(0))?;
    debug!("event=db_compact module=db status=progress locking_mode={locking_mode}");
    conn.execute_batch(
        "VACUUM;
         REINDEX;
         PRAGMA optimize;",
    )?;

    let mut stmt = conn.prepare("PRAGMA integrity_check;")?;
    let report = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    if report.len() == 1 && report[0] == "ok" {
        Ok(())
    } else {
        Err(DbError::IntegrityCheckFailed(report.join("; ")))
    }
}
