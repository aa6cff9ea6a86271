//! Repository layer: SQL persistence for the log and client state.
//!
//! # Responsibility
//! - Keep every SQL statement inside the core persistence boundary.
//! - Translate rows into typed model values.
//!
//! # Invariants
//! - Write paths validate payloads before any SQL mutation.
//! - Read paths reject malformed persisted state instead of masking it.

use crate::db::DbError;
use crate::model::event::PayloadValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod client_store;
pub mod event_log;
pub mod filter;
pub mod queue_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by the log, queue and client store.
#[derive(Debug)]
pub enum RepoError {
    Validation(PayloadValidationError),
    Db(DbError),
    Encode(serde_json::Error),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Encode(err) => write!(f, "failed to encode record: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<PayloadValidationError> for RepoError {
    fn from(value: PayloadValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
