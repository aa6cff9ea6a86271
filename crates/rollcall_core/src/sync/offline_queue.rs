//! Client-resident offline write queue.
//!
//! # Responsibility
//! - Persist writes made while the write path is unreachable.
//! - Drain them in submission order with all-or-nothing acknowledgement.
//!
//! # Invariants
//! - The queue is cleared only after every intent of the drained snapshot
//!   was confirmed; any failure leaves it exactly as it was.
//! - Intents enqueued while a drain is in flight survive that drain.
//! - `Idle -> Draining -> Idle`; there is no terminal failure state.

use crate::model::event::EventId;
use crate::model::intent::QueuedIntent;
use crate::repo::queue_repo::{QueueSeq, SqliteQueueRepository};
use crate::sync::error::{SyncError, SyncResult};
use crate::sync::transport::ChangeSink;
use log::{info, warn};
use rusqlite::Connection;
use std::cell::Cell;

/// Drain state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Draining,
}

/// First failing submission of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// Position of the failed intent within the snapshot.
    pub index: usize,
    pub error: SyncError,
}

/// Result of one drain attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Nothing was queued.
    Empty,
    /// A drain was already running; nothing was attempted.
    AlreadyDraining,
    /// The whole snapshot was confirmed and removed.
    Drained { versions: Vec<EventId> },
    /// The snapshot was left in place for a later identical retry.
    Failed {
        failure: BatchFailure,
        pending: usize,
    },
}

/// Durable FIFO of unsent intents for one tenant.
pub struct OfflineQueue<'conn> {
    repo: SqliteQueueRepository<'conn>,
    state: Cell<QueueState>,
}

impl<'conn> OfflineQueue<'conn> {
    pub fn new(conn: &'conn Connection, tenant_id: impl Into<String>) -> Self {
        Self {
            repo: SqliteQueueRepository::new(conn, tenant_id),
            state: Cell::new(QueueState::Idle),
        }
    }

    pub fn state(&self) -> QueueState {
        self.state.get()
    }

    /// Persists one intent at the tail of the queue.
    ///
    /// Allowed while a drain is running; the new intent waits for the next one.
    pub fn enqueue(&self, intent: &QueuedIntent) -> SyncResult<QueueSeq> {
        let seq = self.repo.insert(intent)?;
        info!(
            "event=queue_enqueue module=offline_queue status=ok kind={} seq={} state={:?}",
            intent.payload.kind(),
            seq,
            self.state.get()
        );
        Ok(seq)
    }

    /// Queued intents in FIFO order.
    pub fn pending(&self) -> SyncResult<Vec<QueuedIntent>> {
        Ok(self
            .repo
            .list()?
            .into_iter()
            .map(|entry| entry.intent)
            .collect())
    }

    pub fn len(&self) -> SyncResult<usize> {
        Ok(self.repo.count()?)
    }

    pub fn is_empty(&self) -> SyncResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Submits every queued intent to `sink`, one at a time, in order.
    pub fn drain_to(&self, sink: &dyn ChangeSink) -> SyncResult<DrainOutcome> {
        self.drain_with(|batch| submit_in_order(sink, batch))
    }

    /// Runs `submit_batch` over a snapshot and clears it only on success.
    ///
    /// `submit_batch` must return one version per intent, in snapshot order.
    /// Storage errors while reading or clearing the snapshot are returned
    /// as `Err` and also leave the queue intact.
    pub fn drain_with<F>(&self, submit_batch: F) -> SyncResult<DrainOutcome>
    where
        F: FnOnce(&[QueuedIntent]) -> Result<Vec<EventId>, BatchFailure>,
    {
        if self.state.get() == QueueState::Draining {
            return Ok(DrainOutcome::AlreadyDraining);
        }
        let _draining = DrainGuard::enter(&self.state);

        let snapshot = self.repo.list()?;
        let Some(last_seq) = snapshot.last().map(|entry| entry.seq) else {
            return Ok(DrainOutcome::Empty);
        };
        let intents: Vec<QueuedIntent> = snapshot.into_iter().map(|entry| entry.intent).collect();

        match submit_batch(&intents) {
            Ok(versions) if versions.len() == intents.len() => {
                let removed = self.repo.delete_through(last_seq)?;
                info!(
                    "event=queue_drain module=offline_queue status=ok submitted={} removed={}",
                    versions.len(),
                    removed
                );
                Ok(DrainOutcome::Drained { versions })
            }
            Ok(versions) => Err(SyncError::InvalidData(format!(
                "batch submitter confirmed {} of {} intents",
                versions.len(),
                intents.len()
            ))),
            Err(failure) => {
                warn!(
                    "event=queue_drain module=offline_queue status=error failed_index={} pending={} error_code={} error={}",
                    failure.index,
                    intents.len(),
                    failure.error.code(),
                    failure.error
                );
                Ok(DrainOutcome::Failed {
                    failure,
                    pending: intents.len(),
                })
            }
        }
    }
}

fn submit_in_order(
    sink: &dyn ChangeSink,
    batch: &[QueuedIntent],
) -> Result<Vec<EventId>, BatchFailure> {
    batch
        .iter()
        .enumerate()
        .map(|(index, intent)| {
            sink.submit(intent)
                .map_err(|error| BatchFailure { index, error })
        })
        .collect()
}

struct DrainGuard<'a> {
    state: &'a Cell<QueueState>,
}

impl<'a> DrainGuard<'a> {
    fn enter(state: &'a Cell<QueueState>) -> Self {
        state.set(QueueState::Draining);
        Self { state }
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.state.set(QueueState::Idle);
    }
}
