//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections for a given [`DbRole`].
//! - Configure connection pragmas required by core behavior.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have migrations for their role fully applied.
//! - File-backed connections run in WAL mode so log readers never block the
//!   appender.

use super::migrations::apply_migrations;
use super::{DbResult, DbRole};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a SQLite database file for `role` and applies pending migrations.
///
/// # Side effects
/// - Creates the file when missing.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>, role: DbRole) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!(
        "event=db_open module=db status=start mode=file role={}",
        role.as_str()
    );

    let result = Connection::open(path)
        .map_err(Into::into)
        .and_then(|mut conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            bootstrap_connection(&mut conn, role).map(|()| conn)
        });
    log_open_result("file", role, started_at, result)
}

/// Opens an in-memory SQLite database for `role` and applies migrations.
pub fn open_db_in_memory(role: DbRole) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!(
        "event=db_open module=db status=start mode=memory role={}",
        role.as_str()
    );

    let result = Connection::open_in_memory()
        .map_err(Into::into)
        .and_then(|mut conn| bootstrap_connection(&mut conn, role).map(|()| conn));
    log_open_result("memory", role, started_at, result)
}

fn bootstrap_connection(conn: &mut Connection, role: DbRole) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn, role)?;
    Ok(())
}

fn log_open_result(
    mode: &str,
    role: DbRole,
    started_at: Instant,
    result: DbResult<Connection>,
) -> DbResult<Connection> {
    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode={mode} role={} duration_ms={}",
            role.as_str(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode={mode} role={} duration_ms={} error={}",
            role.as_str(),
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}
