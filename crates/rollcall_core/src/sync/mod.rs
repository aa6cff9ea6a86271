//! Client-side sync machinery and the transport seams it depends on.
//!
//! # Responsibility
//! - Track the client's cursor and catch up through delta fetches.
//! - Hold writes made offline and replay them when connectivity returns.
//!
//! # Invariants
//! - Client queue and cursor mutations go through one connection; only
//!   replay submissions may overlap in flight.
//! - No queued write is discarded until the log confirmed its whole batch.

pub mod client;
pub mod error;
pub mod offline_queue;
pub mod replayer;
pub mod transport;
