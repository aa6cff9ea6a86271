//! Client-facing seams to the delta-sync server.
//!
//! The client only ever talks to a [`ChangeSource`] (reads) and a
//! [`ChangeSink`] (writes); whether a network hop sits behind them is the
//! caller's concern. [`InProcessRemote`] wires both straight to a server
//! connection for embedded deployments, tooling and tests.

use crate::model::event::{Event, EventId};
use crate::model::intent::QueuedIntent;
use crate::model::scope::TenantScope;
use crate::repo::event_log::SqliteEventLog;
use crate::service::delta_sync::DeltaSyncService;
use crate::sync::error::{SyncError, SyncResult};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// Read side of the protocol, already bound to one tenant.
pub trait ChangeSource {
    fn latest_version(&self) -> SyncResult<EventId>;
    fn changes_since(&self, since_version: EventId) -> SyncResult<Vec<Event>>;
}

/// Write path, already bound to one tenant and actor.
///
/// `Sync` so replay can issue several submissions at once.
pub trait ChangeSink: Send + Sync {
    /// Returns the committed version. Any error means "not committed".
    fn submit(&self, intent: &QueuedIntent) -> SyncResult<EventId>;
}

/// Source and sink backed by a shared server connection.
#[derive(Clone)]
pub struct InProcessRemote {
    conn: Arc<Mutex<Connection>>,
    scope: TenantScope,
}

impl InProcessRemote {
    pub fn new(conn: Arc<Mutex<Connection>>, scope: TenantScope) -> Self {
        Self { conn, scope }
    }

    fn with_service<T>(
        &self,
        op: impl FnOnce(&DeltaSyncService<SqliteEventLog<'_>>) -> SyncResult<T>,
    ) -> SyncResult<T> {
        let conn = self.conn.lock().map_err(|_| {
            SyncError::TransientIo("server connection lock is poisoned".to_string())
        })?;
        let service = DeltaSyncService::new(SqliteEventLog::new(&conn));
        op(&service)
    }
}

impl ChangeSource for InProcessRemote {
    fn latest_version(&self) -> SyncResult<EventId> {
        self.with_service(|service| service.latest_version(&self.scope.tenant_id))
    }

    fn changes_since(&self, since_version: EventId) -> SyncResult<Vec<Event>> {
        self.with_service(|service| service.changes_since(&self.scope.tenant_id, since_version))
    }
}

impl ChangeSink for InProcessRemote {
    fn submit(&self, intent: &QueuedIntent) -> SyncResult<EventId> {
        self.with_service(|service| service.append_intent(&self.scope, intent))
    }
}
