//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations per [`DbRole`] in strictly increasing order.
//! - Apply pending migrations atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic within one role.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - Re-running on an up-to-date database is a no-op.

use crate::db::{DbError, DbResult, DbRole};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const SERVER_MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("server/0001_event_log.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("server/0002_intent_ids.sql"),
    },
];

const CLIENT_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("client/0001_client_state.sql"),
}];

fn migrations_for(role: DbRole) -> &'static [Migration] {
    match role {
        DbRole::Server => SERVER_MIGRATIONS,
        DbRole::Client => CLIENT_MIGRATIONS,
    }
}

/// Returns the latest migration version this binary knows for `role`.
pub fn latest_version(role: DbRole) -> u32 {
    migrations_for(role)
        .last()
        .map_or(0, |migration| migration.version)
}

/// Applies all pending migrations for `role` on the provided connection.
pub fn apply_migrations(conn: &mut Connection, role: DbRole) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version(role);

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            role,
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in migrations_for(role) {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok role={} from={} to={}",
        role.as_str(),
        current_version,
        latest
    );
    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
