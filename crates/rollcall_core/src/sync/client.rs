//! Client half of delta sync: cursor tracking, catch-up and offline writes.
//!
//! # Responsibility
//! - Keep local projections equal to the fold of the tenant's stream up to
//!   the persisted cursor.
//! - Route writes to the write path, or to the offline queue when the write
//!   path is unreachable.
//!
//! # Invariants
//! - Next state is computed, then persisted, and only then exposed in
//!   memory; a persistence failure never leaves the view ahead of storage.
//! - Failed polls or fetches never move the cursor.
//! - Validation failures are surfaced to the caller and never queued.

use crate::model::event::{ChangePayload, Event, EventId};
use crate::model::intent::{IntentId, QueuedIntent};
use crate::model::projection::Projections;
use crate::repo::client_store::{ClientState, SqliteClientStore};
use crate::service::reconstruct::fold;
use crate::sync::error::{SyncError, SyncResult};
use crate::sync::offline_queue::OfflineQueue;
use crate::sync::transport::{ChangeSink, ChangeSource};
use log::{info, warn};
use rusqlite::Connection;

/// Result of a catch-up attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    UpToDate { version: EventId },
    Advanced {
        from: EventId,
        to: EventId,
        applied: usize,
    },
}

/// Local acknowledgement of a user write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAck {
    /// The log committed the write at `version`.
    Committed { version: EventId },
    /// Saved locally; will be sent by the next replay.
    SavedPendingSync { intent_id: IntentId },
}

/// Per-tenant sync client over a client-role connection.
pub struct SyncClient<'conn> {
    tenant_id: String,
    store: SqliteClientStore<'conn>,
    queue: OfflineQueue<'conn>,
    view: ClientState,
}

impl<'conn> SyncClient<'conn> {
    /// Loads the persisted cursor and cached projections for `tenant_id`.
    pub fn open(conn: &'conn Connection, tenant_id: impl Into<String>) -> SyncResult<Self> {
        let tenant_id = tenant_id.into();
        if tenant_id.trim().is_empty() {
            return Err(SyncError::InvalidRequest(
                "tenant_id must not be blank".to_string(),
            ));
        }

        let store = SqliteClientStore::new(conn);
        let view = store.load_state(&tenant_id)?;
        info!(
            "event=client_open module=sync_client status=ok cursor={}",
            view.cursor
        );

        Ok(Self {
            queue: OfflineQueue::new(conn, tenant_id.clone()),
            tenant_id,
            store,
            view,
        })
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Highest event id applied locally.
    pub fn cursor(&self) -> EventId {
        self.view.cursor
    }

    pub fn projections(&self) -> &Projections {
        &self.view.projections
    }

    pub fn queue(&self) -> &OfflineQueue<'conn> {
        &self.queue
    }

    /// Rebuilds local state from the whole stream, discarding the cache.
    pub fn bootstrap(&mut self, source: &dyn ChangeSource) -> SyncResult<PollOutcome> {
        let events = source.changes_since(0)?;
        let projections = fold(&events, None)?;
        let next = ClientState {
            cursor: events.last().map_or(0, |event| event.id),
            projections,
        };

        let from = self.view.cursor;
        self.commit(next)?;
        info!(
            "event=client_bootstrap module=sync_client status=ok applied={} cursor={}",
            events.len(),
            self.view.cursor
        );
        Ok(PollOutcome::Advanced {
            from,
            to: self.view.cursor,
            applied: events.len(),
        })
    }

    /// Cheap version check, then a delta fetch only when behind.
    pub fn poll(&mut self, source: &dyn ChangeSource) -> SyncResult<PollOutcome> {
        let latest = source.latest_version()?;
        if latest <= self.view.cursor {
            if latest < self.view.cursor {
                warn!(
                    "event=client_poll module=sync_client status=server_behind latest={} cursor={}",
                    latest, self.view.cursor
                );
            }
            return Ok(PollOutcome::UpToDate {
                version: self.view.cursor,
            });
        }

        let events = source.changes_since(self.view.cursor)?;
        self.apply_changes(&events)
    }

    /// Folds a fetched delta onto local state and advances the cursor.
    ///
    /// `events` must all be newer than the cursor and strictly ascending.
    pub fn apply_changes(&mut self, events: &[Event]) -> SyncResult<PollOutcome> {
        let from = self.view.cursor;
        let (Some(first), Some(last)) = (events.first(), events.last()) else {
            return Ok(PollOutcome::UpToDate { version: from });
        };
        if first.id <= from {
            return Err(SyncError::OrderingViolation {
                previous: from,
                next: first.id,
            });
        }

        let projections = fold(events, Some(self.view.projections.clone()))?;
        let next = ClientState {
            cursor: last.id,
            projections,
        };
        self.commit(next)?;

        info!(
            "event=client_poll module=sync_client status=advanced from={} to={} applied={}",
            from,
            last.id,
            events.len()
        );
        Ok(PollOutcome::Advanced {
            from,
            to: last.id,
            applied: events.len(),
        })
    }

    /// Sends a write, queueing it when the write path is unreachable.
    pub fn record(&self, payload: ChangePayload, sink: &dyn ChangeSink) -> SyncResult<WriteAck> {
        let intent = QueuedIntent::new(payload)?;
        match sink.submit(&intent) {
            Ok(version) => Ok(WriteAck::Committed { version }),
            Err(err) if err.is_retryable() => {
                info!(
                    "event=client_record module=sync_client status=write_path_unavailable kind={} error_code={}",
                    intent.payload.kind(),
                    err.code()
                );
                self.hold(&intent)
            }
            Err(err) => Err(err),
        }
    }

    /// Queues a write without trying the write path, for callers that
    /// already know it is unreachable.
    pub fn record_offline(&self, payload: ChangePayload) -> SyncResult<WriteAck> {
        let intent = QueuedIntent::new(payload)?;
        self.hold(&intent)
    }

    fn hold(&self, intent: &QueuedIntent) -> SyncResult<WriteAck> {
        self.queue.enqueue(intent)?;
        info!(
            "event=client_record module=sync_client status=saved_pending_sync kind={}",
            intent.payload.kind()
        );
        Ok(WriteAck::SavedPendingSync {
            intent_id: intent.intent_id,
        })
    }

    fn commit(&mut self, next: ClientState) -> SyncResult<()> {
        self.store.save_state(&self.tenant_id, &next)?;
        self.view = next;
        Ok(())
    }
}
