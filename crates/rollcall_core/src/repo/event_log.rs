//! Append-only change log contracts and SQLite implementation.
//!
//! # Responsibility
//! - Assign sequence ids and persist events durably before acknowledging.
//! - Serve ordered, tenant-scoped reads after a given id.
//!
//! # Invariants
//! - `append` returns an id only after the insert transaction committed.
//! - Ids come from an `AUTOINCREMENT` key: strictly increasing, never reused.
//! - The table rejects `UPDATE`/`DELETE` at the storage layer.
//! - An intent id is appended at most once per tenant, also across
//!   connections writing concurrently.

use crate::model::event::{ChangePayload, Event, EventBody, EventId, EventKind};
use crate::model::intent::{now_epoch_ms, IntentId};
use crate::repo::filter::{FilterColumn, Predicate, SqlFilter};
use crate::repo::{RepoError, RepoResult};
use log::{debug, error};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};

const EVENT_SELECT_SQL: &str = "SELECT
    id,
    tenant_id,
    actor_id,
    event_type,
    payload,
    created_at
FROM sync_events";

/// Columns of `sync_events` usable in generated filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventColumn {
    Id,
    TenantId,
    ActorId,
    EventType,
}

impl FilterColumn for EventColumn {
    fn sql_name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::TenantId => "tenant_id",
            Self::ActorId => "actor_id",
            Self::EventType => "event_type",
        }
    }
}

/// Write request for one event.
#[derive(Debug, Clone, Copy)]
pub struct NewEvent<'a> {
    pub tenant_id: &'a str,
    pub actor_id: &'a str,
    pub payload: &'a ChangePayload,
    /// Client intent id; repeats resolve to the first appended event.
    pub intent_id: Option<IntentId>,
}

/// Read request over one tenant's stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub tenant_id: String,
    /// Exclusive lower bound on `id`; `None` reads from the beginning.
    pub after_id: Option<EventId>,
    pub kinds: Option<Vec<EventKind>>,
    pub actor_id: Option<String>,
    pub limit: Option<u32>,
}

impl EventQuery {
    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            after_id: None,
            kinds: None,
            actor_id: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn after(mut self, after_id: EventId) -> Self {
        self.after_id = Some(after_id);
        self
    }

    #[must_use]
    pub fn of_kinds(mut self, kinds: impl IntoIterator<Item = EventKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    #[must_use]
    pub fn by_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    fn to_filter(&self) -> SqlFilter<EventColumn> {
        let mut filter = SqlFilter::new().and(Predicate::Eq(
            EventColumn::TenantId,
            Value::Text(self.tenant_id.clone()),
        ));
        if let Some(after_id) = self.after_id {
            filter = filter.and(Predicate::Gt(EventColumn::Id, Value::Integer(after_id)));
        }
        if let Some(kinds) = &self.kinds {
            filter = filter.and(Predicate::In(
                EventColumn::EventType,
                kinds
                    .iter()
                    .map(|kind| Value::Text(kind.as_str().to_string()))
                    .collect(),
            ));
        }
        if let Some(actor_id) = &self.actor_id {
            filter = filter.and(Predicate::Eq(
                EventColumn::ActorId,
                Value::Text(actor_id.clone()),
            ));
        }
        filter
    }
}

/// Durable, append-only event store.
pub trait EventLog {
    fn append(&self, event: &NewEvent<'_>) -> RepoResult<EventId>;
    fn query(&self, query: &EventQuery) -> RepoResult<Vec<Event>>;
    /// Highest id in the tenant's stream, or 0 when it is empty.
    fn latest_id(&self, tenant_id: &str) -> RepoResult<EventId>;
}

/// SQLite-backed event log.
pub struct SqliteEventLog<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEventLog<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl EventLog for SqliteEventLog<'_> {
    fn append(&self, event: &NewEvent<'_>) -> RepoResult<EventId> {
        event.payload.validate()?;
        let payload_json = event.payload.to_json_string().map_err(RepoError::Encode)?;
        let intent_text = event.intent_id.map(|id| id.to_string());

        // Take the write lock up front so the dedupe read and the insert see
        // the same log state as concurrent writers on other connections.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if let Some(intent) = intent_text.as_deref() {
            let existing: Option<EventId> = tx
                .query_row(
                    "SELECT id FROM sync_events WHERE tenant_id = ?1 AND intent_id = ?2;",
                    params![event.tenant_id, intent],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(id) = existing {
                debug!(
                    "event=log_append module=repo status=duplicate_intent kind={} id={}",
                    event.payload.kind(),
                    id
                );
                return Ok(id);
            }
        }

        let inserted = tx.execute(
            "INSERT INTO sync_events (
                tenant_id,
                actor_id,
                event_type,
                payload,
                intent_id,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                event.tenant_id,
                event.actor_id,
                event.payload.kind().as_str(),
                payload_json,
                intent_text,
                now_epoch_ms(),
            ],
        );
        if let Err(err) = inserted {
            error!(
                "event=log_append module=repo status=error kind={} error={}",
                event.payload.kind(),
                err
            );
            return Err(err.into());
        }

        let id = tx.last_insert_rowid();
        tx.commit()?;
        debug!(
            "event=log_append module=repo status=ok kind={} id={}",
            event.payload.kind(),
            id
        );
        Ok(id)
    }

    fn query(&self, query: &EventQuery) -> RepoResult<Vec<Event>> {
        let (where_sql, mut binds) = query.to_filter().render();
        let mut sql = format!("{EVENT_SELECT_SQL}{where_sql} ORDER BY id ASC");
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            binds.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(row)?);
        }

        Ok(events)
    }

    fn latest_id(&self, tenant_id: &str) -> RepoResult<EventId> {
        let latest = self.conn.query_row(
            "SELECT COALESCE(MAX(id), 0) FROM sync_events WHERE tenant_id = ?1;",
            [tenant_id],
            |row| row.get::<_, EventId>(0),
        )?;
        Ok(latest)
    }
}

fn parse_event_row(row: &Row<'_>) -> RepoResult<Event> {
    let id: EventId = row.get("id")?;
    let event_type: String = row.get("event_type")?;
    let payload: String = row.get("payload")?;

    let body = match EventKind::parse(&event_type) {
        Some(kind) => {
            let change = ChangePayload::from_json_str(kind, &payload).map_err(|err| {
                RepoError::InvalidData(format!(
                    "invalid {kind} payload in sync_events.payload for id {id}: {err}"
                ))
            })?;
            EventBody::Change(change)
        }
        None => EventBody::Unrecognized {
            event_type,
            payload,
        },
    };

    Ok(Event {
        id,
        tenant_id: row.get("tenant_id")?,
        actor_id: row.get("actor_id")?,
        body,
        created_at_ms: row.get("created_at")?,
    })
}
