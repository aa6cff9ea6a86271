//! Core use-case services.
//!
//! # Responsibility
//! - Rebuild state from the log (`reconstruct`).
//! - Serve the tenant-scoped delta-sync protocol (`delta_sync`).
//! - Keep callers decoupled from storage details.

pub mod delta_sync;
pub mod reconstruct;
