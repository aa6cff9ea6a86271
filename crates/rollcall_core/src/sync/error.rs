//! Error taxonomy of the sync subsystem.
//!
//! Last-write-wins overwrites are the expected outcome of concurrent edits
//! to one key and are not represented here.

use crate::db::DbError;
use crate::model::event::{EventId, PayloadValidationError};
use crate::repo::RepoError;
use crate::service::reconstruct::FoldError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Network or storage unavailable. Always retryable; nothing is dropped.
    TransientIo(String),
    /// Malformed payload. Rejected before the log, never queued.
    Validation(PayloadValidationError),
    /// Events offered out of order. A programming error, not a runtime state.
    OrderingViolation { previous: EventId, next: EventId },
    /// Stored data could not be decoded or encoded.
    InvalidData(String),
    /// Blank scope identifiers or out-of-range arguments.
    InvalidRequest(String),
}

impl SyncError {
    /// Whether the same request may succeed later unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientIo(_))
    }

    /// Stable short code for logs and user-facing envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TransientIo(_) => "transient_io",
            Self::Validation(_) => "validation",
            Self::OrderingViolation { .. } => "ordering_violation",
            Self::InvalidData(_) => "invalid_data",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TransientIo(message) => write!(f, "sync transport unavailable: {message}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::OrderingViolation { previous, next } => write!(
                f,
                "ordering violation: event {next} offered after {previous}"
            ),
            Self::InvalidData(message) => write!(f, "invalid sync data: {message}"),
            Self::InvalidRequest(message) => write!(f, "invalid sync request: {message}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PayloadValidationError> for SyncError {
    fn from(value: PayloadValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for SyncError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::Db(err) => err.into(),
            RepoError::Encode(err) => Self::InvalidData(err.to_string()),
            RepoError::InvalidData(message) => Self::InvalidData(message),
        }
    }
}

/// Open and query failures are retryable; constraint and schema
/// failures are not.
impl From<DbError> for SyncError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(_) if is_constraint_violation(&value) => {
                Self::InvalidData(value.to_string())
            }
            DbError::Sqlite(_) => Self::TransientIo(value.to_string()),
            DbError::UnsupportedSchemaVersion { .. } => Self::InvalidData(value.to_string()),
        }
    }
}

fn is_constraint_violation(err: &DbError) -> bool {
    matches!(
        err,
        DbError::Sqlite(rusqlite::Error::SqliteFailure(failure, _))
            if failure.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl From<FoldError> for SyncError {
    fn from(value: FoldError) -> Self {
        match value {
            FoldError::OrderingViolation { previous, next } => {
                Self::OrderingViolation { previous, next }
            }
        }
    }
}
