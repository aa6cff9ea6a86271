//! Domain model for the attendance change log and its projections.
//!
//! # Responsibility
//! - Define the event, payload, projection and queued-intent shapes shared
//!   by server and client code.
//!
//! # Invariants
//! - Events are identified and ordered by their log-assigned `EventId`.
//! - Projections are derived data and are never authoritative.

pub mod event;
pub mod intent;
pub mod projection;
pub mod scope;
