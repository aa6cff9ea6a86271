//! Deferred replay of the offline queue.
//!
//! Fired by a connectivity-restored signal or a platform-scheduled callback.
//! Submissions may overlap in flight (up to `max_in_flight`); the log
//! linearizes them on arrival. A batch is acknowledged in full or not at all.

use crate::config::ReplayConfig;
use crate::model::event::EventId;
use crate::model::intent::QueuedIntent;
use crate::sync::error::{SyncError, SyncResult};
use crate::sync::offline_queue::{BatchFailure, DrainOutcome, OfflineQueue};
use crate::sync::transport::ChangeSink;
use log::{error, info, warn};
use std::cell::Cell;
use std::thread;

/// What woke the replayer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayTrigger {
    ConnectivityRestored,
    Scheduled,
}

impl ReplayTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectivityRestored => "connectivity_restored",
            Self::Scheduled => "scheduled",
        }
    }
}

/// User-visible replay result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayNotice {
    Saved { count: usize },
    /// `pending` is `None` when the queue could not be read back.
    Failed {
        pending: Option<usize>,
        message: String,
    },
}

/// Receives replay notices for display.
pub trait ReplayNotifier {
    fn notify(&self, notice: &ReplayNotice);
}

/// Notifier that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl ReplayNotifier for LogNotifier {
    fn notify(&self, notice: &ReplayNotice) {
        match notice {
            ReplayNotice::Saved { count } => {
                info!("event=replay_notice module=replayer status=saved count={count}");
            }
            ReplayNotice::Failed { pending, message } => {
                let pending = pending.map_or_else(|| "unknown".to_string(), |n| n.to_string());
                warn!(
                    "event=replay_notice module=replayer status=failed pending={pending} message={message}"
                );
            }
        }
    }
}

/// Replay attempt summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    pub trigger: ReplayTrigger,
    pub outcome: DrainOutcome,
}

/// Drains an [`OfflineQueue`] into a [`ChangeSink`] when triggered.
pub struct BackgroundReplayer<N: ReplayNotifier> {
    config: ReplayConfig,
    notifier: N,
}

impl<N: ReplayNotifier> BackgroundReplayer<N> {
    pub fn new(config: ReplayConfig, notifier: N) -> Self {
        Self { config, notifier }
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Replays the current queue snapshot and reports the outcome.
    pub fn on_trigger(
        &self,
        trigger: ReplayTrigger,
        queue: &OfflineQueue<'_>,
        sink: &dyn ChangeSink,
    ) -> SyncResult<ReplayReport> {
        info!(
            "event=replay_start module=replayer status=start trigger={} max_in_flight={}",
            trigger.as_str(),
            self.config.max_in_flight
        );

        let max_in_flight = self.config.max_in_flight.max(1);
        let snapshot_len = Cell::new(None);
        let drained = queue.drain_with(|batch| {
            snapshot_len.set(Some(batch.len()));
            dispatch(sink, batch, max_in_flight)
        });
        let outcome = match drained {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(
                    "event=replay_done module=replayer status=error trigger={} error_code={} error={}",
                    trigger.as_str(),
                    err.code(),
                    err
                );
                self.notifier.notify(&ReplayNotice::Failed {
                    pending: snapshot_len.get().or_else(|| pending_after_error(queue)),
                    message: failure_message(&err),
                });
                return Err(err);
            }
        };

        match &outcome {
            DrainOutcome::Drained { versions } => {
                self.notifier.notify(&ReplayNotice::Saved {
                    count: versions.len(),
                });
            }
            DrainOutcome::Failed { failure, pending } => {
                self.notifier.notify(&ReplayNotice::Failed {
                    pending: Some(*pending),
                    message: failure_message(&failure.error),
                });
            }
            DrainOutcome::Empty | DrainOutcome::AlreadyDraining => {}
        }

        Ok(ReplayReport { trigger, outcome })
    }
}

/// Queue length for a failure notice when no snapshot was taken.
fn pending_after_error(queue: &OfflineQueue<'_>) -> Option<usize> {
    match queue.len() {
        Ok(pending) => Some(pending),
        Err(err) => {
            error!(
                "event=replay_done module=replayer status=pending_unknown error_code={} error={}",
                err.code(),
                err
            );
            None
        }
    }
}

fn failure_message(err: &SyncError) -> String {
    format!("Some offline changes were not saved and will be retried: {err}")
}

/// Submits `batch` in windows of `max_in_flight` concurrent requests.
///
/// Results are collected in snapshot order; no window starts after one
/// containing a failure.
fn dispatch(
    sink: &dyn ChangeSink,
    batch: &[QueuedIntent],
    max_in_flight: usize,
) -> Result<Vec<EventId>, BatchFailure> {
    let mut versions = Vec::with_capacity(batch.len());

    for (window_index, window) in batch.chunks(max_in_flight).enumerate() {
        let offset = window_index * max_in_flight;
        let results: Vec<SyncResult<EventId>> = thread::scope(|scope| {
            let handles: Vec<_> = window
                .iter()
                .map(|intent| scope.spawn(move || sink.submit(intent)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(SyncError::TransientIo(
                            "replay worker panicked before confirming".to_string(),
                        ))
                    })
                })
                .collect()
        });

        for (position, result) in results.into_iter().enumerate() {
            match result {
                Ok(version) => versions.push(version),
                Err(error) => {
                    return Err(BatchFailure {
                        index: offset + position,
                        error,
                    });
                }
            }
        }
    }

    Ok(versions)
}
