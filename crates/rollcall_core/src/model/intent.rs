//! Client-side write intents awaiting submission.

use crate::model::event::{ChangePayload, PayloadValidationError};
use chrono::Utc;
use uuid::Uuid;

/// Stable identifier for one queued write.
///
/// Sent with every submission so the log can recognize a replayed intent.
pub type IntentId = Uuid;

/// A write the client has made but the log has not yet confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedIntent {
    pub intent_id: IntentId,
    pub payload: ChangePayload,
    /// Unix epoch milliseconds at the moment the user made the change.
    pub submitted_at_ms: i64,
}

impl QueuedIntent {
    /// Wraps a validated payload in a new intent stamped with the current time.
    pub fn new(payload: ChangePayload) -> Result<Self, PayloadValidationError> {
        payload.validate()?;
        Ok(Self {
            intent_id: Uuid::new_v4(),
            payload,
            submitted_at_ms: now_epoch_ms(),
        })
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}
