//! Durable storage for the client's offline write queue.
//!
//! # Invariants
//! - Entries are ordered by an `AUTOINCREMENT` sequence; FIFO is `seq ASC`.
//! - Only validated payloads of known kinds are stored.
//! - Removal is always "everything up to a sequence number" so a drain can
//!   never delete entries it did not snapshot.

use crate::model::event::{ChangePayload, EventKind};
use crate::model::intent::QueuedIntent;
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

/// Queue position assigned on enqueue.
pub type QueueSeq = i64;

/// One stored intent with its queue position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedEntry {
    pub seq: QueueSeq,
    pub intent: QueuedIntent,
}

/// SQLite-backed queue storage scoped to one tenant.
pub struct SqliteQueueRepository<'conn> {
    conn: &'conn Connection,
    tenant_id: String,
}

impl<'conn> SqliteQueueRepository<'conn> {
    pub fn new(conn: &'conn Connection, tenant_id: impl Into<String>) -> Self {
        Self {
            conn,
            tenant_id: tenant_id.into(),
        }
    }

    pub fn insert(&self, intent: &QueuedIntent) -> RepoResult<QueueSeq> {
        intent.payload.validate()?;
        let payload_json = intent.payload.to_json_string().map_err(RepoError::Encode)?;

        self.conn.execute(
            "INSERT INTO offline_queue (
                tenant_id,
                intent_id,
                event_type,
                payload,
                submitted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                self.tenant_id,
                intent.intent_id.to_string(),
                intent.payload.kind().as_str(),
                payload_json,
                intent.submitted_at_ms,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// All entries in FIFO order.
    pub fn list(&self) -> RepoResult<Vec<QueuedEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, intent_id, event_type, payload, submitted_at
             FROM offline_queue
             WHERE tenant_id = ?1
             ORDER BY seq ASC;",
        )?;
        let mut rows = stmt.query([self.tenant_id.as_str()])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(row)?);
        }
        Ok(entries)
    }

    pub fn count(&self) -> RepoResult<usize> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM offline_queue WHERE tenant_id = ?1;",
            [self.tenant_id.as_str()],
            |row| row.get::<_, i64>(0),
        )?;
        usize::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative queue count {count}")))
    }

    /// Removes every entry with `seq <= last_seq`; returns the removed count.
    pub fn delete_through(&self, last_seq: QueueSeq) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM offline_queue WHERE tenant_id = ?1 AND seq <= ?2;",
            params![self.tenant_id, last_seq],
        )?;
        Ok(removed)
    }
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<QueuedEntry> {
    let seq: QueueSeq = row.get("seq")?;

    let intent_text: String = row.get("intent_id")?;
    let intent_id = Uuid::parse_str(&intent_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid uuid value `{intent_text}` in offline_queue.intent_id"
        ))
    })?;

    let type_text: String = row.get("event_type")?;
    let kind = EventKind::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid event type `{type_text}` in offline_queue.event_type"
        ))
    })?;

    let payload_text: String = row.get("payload")?;
    let payload = ChangePayload::from_json_str(kind, &payload_text).map_err(|err| {
        RepoError::InvalidData(format!(
            "invalid {kind} payload in offline_queue.payload for seq {seq}: {err}"
        ))
    })?;

    Ok(QueuedEntry {
        seq,
        intent: QueuedIntent {
            intent_id,
            payload,
            submitted_at_ms: row.get("submitted_at")?,
        },
    })
}
