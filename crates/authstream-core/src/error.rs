//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An aggregate was not found in either the checkpoint store or the event store.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// Optimistic concurrency conflict that survived the fast-forward retry.
    #[error("concurrency conflict on stream {stream_id}: expected version {expected}")]
    ConcurrencyConflict {
        /// The stream that had the conflict.
        stream_id: String,
        /// The expected version of the last append attempt.
        expected: i64,
    },

    /// A validation error in command or query input.
    #[error("validation error: {0}")]
    Validation(String),

    /// A payload or event that the aggregate's current state cannot accept.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// A stored event whose payload type this build does not understand.
    #[error("unrecognised event for '{stream_type}', got '{payload_type}'")]
    UnrecognizedEvent {
        /// The aggregate kind being replayed.
        stream_type: String,
        /// The payload type found in the stored event.
        payload_type: String,
    },

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Infrastructure(format!("serialization failed: {err}"))
    }
}
