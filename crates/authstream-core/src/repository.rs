//! Event repository abstraction.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::EventStream;

/// Stored representation of a domain event.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Stream this event belongs to.
    pub stream_id: String,
    /// Aggregate kind discriminator.
    pub stream_type: String,
    /// Sequence number within the stream.
    pub sequence_number: i64,
    /// Payload type name for deserialization routing.
    pub payload_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Actor that caused the event.
    pub created_by: String,
    /// Timestamp of event creation.
    pub created_utc: DateTime<Utc>,
}

/// Repository trait for loading and appending domain events.
///
/// `append_events` is the only concurrency gate in the system: it must check
/// the stream version and insert in one atomic step.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Liveness probe for the backing store.
    async fn is_connected(&self) -> bool;

    /// Append events to a stream only if its current version equals
    /// `expected_version` (the last known sequence number, or
    /// [`EMPTY_STREAM_VERSION`](crate::event::EMPTY_STREAM_VERSION) for a new
    /// stream).
    ///
    /// Returns `Ok(false)` on a version mismatch or a write classified as a
    /// conflict; `Ok(true)` once the events are durable.
    async fn append_events(
        &self,
        stream_id: &str,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<bool, DomainError>;

    /// Load all events for a stream, ordered by sequence number. An unknown
    /// stream yields an empty stream.
    async fn load_stream(&self, stream_id: &str) -> Result<EventStream, DomainError> {
        self.load_stream_from(stream_id, 0).await
    }

    /// Load only the events with a sequence number `>= from_sequence_number`.
    async fn load_stream_from(
        &self,
        stream_id: &str,
        from_sequence_number: i64,
    ) -> Result<EventStream, DomainError>;

    /// Load every stream of one aggregate kind, keyed by stream id.
    async fn load_streams_by_type(
        &self,
        stream_type: &str,
    ) -> Result<HashMap<String, EventStream>, DomainError>;

    /// Load every stream of one aggregate kind that has at least one event
    /// created at or after `from`, keyed by stream id. Only those events are
    /// returned.
    async fn load_streams_by_type_since(
        &self,
        stream_type: &str,
        from: DateTime<Utc>,
    ) -> Result<HashMap<String, EventStream>, DomainError>;
}
