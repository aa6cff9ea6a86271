//! Event-sourced sync core for Rollcall attendance tracking.
//! This crate is the single source of truth for change-log invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use config::{ConfigError, CoreConfig, ReplayConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbRole};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::event::{
    AttendanceRecorded, AttendanceStatus, ChangePayload, Event, EventBody, EventId, EventKind,
    PayloadValidationError, RosterReplaced, Student,
};
pub use model::intent::{IntentId, QueuedIntent};
pub use model::projection::{attendance_key, Projections, StatusMap};
pub use model::scope::TenantScope;
pub use repo::client_store::{ClientState, SqliteClientStore};
pub use repo::event_log::{EventLog, EventQuery, NewEvent, SqliteEventLog};
pub use repo::{RepoError, RepoResult};
pub use service::delta_sync::{ChangePage, DeltaSyncService};
pub use service::reconstruct::{fold, FoldError};
pub use sync::client::{PollOutcome, SyncClient, WriteAck};
pub use sync::error::{SyncError, SyncResult};
pub use sync::offline_queue::{BatchFailure, DrainOutcome, OfflineQueue, QueueState};
pub use sync::replayer::{
    BackgroundReplayer, LogNotifier, ReplayNotice, ReplayNotifier, ReplayReport, ReplayTrigger,
};
pub use sync::transport::{ChangeSink, ChangeSource, InProcessRemote};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
