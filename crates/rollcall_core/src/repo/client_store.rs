//! Client-resident key-value store for sync cursor and cached projections.
//!
//! # Invariants
//! - Cursor and projections for a tenant are written in one transaction, so
//!   a reopened client never sees a cursor that disagrees with its cache.
//! - A missing record means "nothing applied yet" (cursor 0, empty state).

use crate::model::event::EventId;
use crate::model::intent::now_epoch_ms;
use crate::model::projection::Projections;
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};

const CURSOR_KEY_PREFIX: &str = "sync_cursor:";
const PROJECTIONS_KEY_PREFIX: &str = "projections:";

/// Durable per-tenant client sync state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientState {
    /// Highest event id folded into `projections`.
    pub cursor: EventId,
    pub projections: Projections,
}

/// SQLite-backed client key-value store.
pub struct SqliteClientStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteClientStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn get(&self, key: &str) -> RepoResult<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM client_kv WHERE key = ?1;", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn load_state(&self, tenant_id: &str) -> RepoResult<ClientState> {
        let cursor_text = self.get(&cursor_key(tenant_id))?;
        let projections_text = self.get(&projections_key(tenant_id))?;

        match (cursor_text, projections_text) {
            (None, None) => Ok(ClientState::default()),
            (Some(cursor_text), Some(projections_text)) => {
                let cursor = cursor_text.parse::<EventId>().map_err(|_| {
                    RepoError::InvalidData(format!(
                        "invalid sync cursor `{cursor_text}` in client_kv"
                    ))
                })?;
                let projections = serde_json::from_str(&projections_text).map_err(|err| {
                    RepoError::InvalidData(format!("invalid cached projections: {err}"))
                })?;
                Ok(ClientState {
                    cursor,
                    projections,
                })
            }
            _ => Err(RepoError::InvalidData(format!(
                "client state for tenant `{tenant_id}` has a cursor without projections or vice versa"
            ))),
        }
    }

    pub fn save_state(&self, tenant_id: &str, state: &ClientState) -> RepoResult<()> {
        let projections_text =
            serde_json::to_string(&state.projections).map_err(RepoError::Encode)?;

        let tx = self.conn.unchecked_transaction()?;
        put_value(&tx, &cursor_key(tenant_id), &state.cursor.to_string())?;
        put_value(&tx, &projections_key(tenant_id), &projections_text)?;
        tx.commit()?;
        Ok(())
    }
}

fn put_value(conn: &Connection, key: &str, value: &str) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO client_kv (key, value, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at;",
        params![key, value, now_epoch_ms()],
    )?;
    Ok(())
}

fn cursor_key(tenant_id: &str) -> String {
    format!("{CURSOR_KEY_PREFIX}{tenant_id}")
}

fn projections_key(tenant_id: &str) -> String {
    format!("{PROJECTIONS_KEY_PREFIX}{tenant_id}")
}
