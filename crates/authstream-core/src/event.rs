//! Domain event abstractions.
//!
//! An [`Event`] is the typed, in-memory form of one state change. A
//! [`StoredEvent`](crate::repository::StoredEvent) is the same record with its
//! payload serialized, as kept by the event store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::DomainError;
use crate::repository::StoredEvent;

/// Closed set of payload variants owned by one aggregate kind.
///
/// Implementations are expected to be enums; `decode` must reject any
/// payload type it does not know with [`DomainError::UnrecognizedEvent`].
pub trait EventPayload:
    Serialize + DeserializeOwned + Clone + Send + Sync + std::fmt::Debug + 'static
{
    /// Returns the payload type name stored alongside the serialized payload.
    fn payload_type(&self) -> &'static str;

    /// Serializes the variant's data (without the type tag).
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if serialization fails.
    fn encode(&self) -> Result<serde_json::Value, DomainError>;

    /// Rebuilds a payload from its stored type name and data.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnrecognizedEvent` for an unknown payload type and
    /// `DomainError::Infrastructure` if the data does not match the variant.
    fn decode(payload_type: &str, payload: serde_json::Value) -> Result<Self, DomainError>;
}

/// Metadata attached to every domain event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Stream this event belongs to, `"{stream_type}-{id}"`.
    pub stream_id: String,
    /// Aggregate kind discriminator.
    pub stream_type: String,
    /// Contiguous position within the stream, 0 for the creation event.
    pub sequence_number: i64,
    /// Actor that caused the event; empty for system actions.
    pub created_by: String,
    /// Timestamp of event construction.
    pub created_utc: DateTime<Utc>,
}

/// Typed domain event envelope.
#[derive(Debug, Clone)]
pub struct Event<P> {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub payload: P,
}

impl<P: EventPayload> Event<P> {
    /// Returns the sequence number of this event.
    #[must_use]
    pub fn sequence_number(&self) -> i64 {
        self.metadata.sequence_number
    }

    /// Converts the event into its stored representation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the payload cannot be serialized.
    pub fn to_stored(&self) -> Result<StoredEvent, DomainError> {
        let meta = &self.metadata;
        Ok(StoredEvent {
            event_id: meta.event_id,
            stream_id: meta.stream_id.clone(),
            stream_type: meta.stream_type.clone(),
            sequence_number: meta.sequence_number,
            payload_type: self.payload.payload_type().to_owned(),
            payload: self.payload.encode()?,
            created_by: meta.created_by.clone(),
            created_utc: meta.created_utc,
        })
    }

    /// Rebuilds a typed event from its stored representation.
    ///
    /// # Errors
    ///
    /// Propagates the payload's decode error; an unknown payload type is fatal
    /// for the aggregate being replayed.
    pub fn from_stored(stored: &StoredEvent) -> Result<Self, DomainError> {
        let payload = P::decode(&stored.payload_type, stored.payload.clone())?;
        Ok(Self {
            metadata: EventMetadata {
                event_id: stored.event_id,
                stream_id: stored.stream_id.clone(),
                stream_type: stored.stream_type.clone(),
                sequence_number: stored.sequence_number,
                created_by: stored.created_by.clone(),
                created_utc: stored.created_utc,
            },
            payload,
        })
    }
}

/// Ordered event history of one aggregate instance.
#[derive(Debug, Clone, Default)]
pub struct EventStream {
    /// The stream identifier.
    pub stream_id: String,
    /// Events ordered by sequence number.
    pub events: Vec<StoredEvent>,
}

/// Version of a stream with no events.
pub const EMPTY_STREAM_VERSION: i64 = -1;

impl EventStream {
    /// Creates a stream from an ordered list of events.
    #[must_use]
    pub fn new(stream_id: impl Into<String>, events: Vec<StoredEvent>) -> Self {
        Self {
            stream_id: stream_id.into(),
            events,
        }
    }

    /// Creates an empty stream.
    #[must_use]
    pub fn empty(stream_id: impl Into<String>) -> Self {
        Self::new(stream_id, Vec::new())
    }

    /// Sequence number of the last event, or [`EMPTY_STREAM_VERSION`].
    #[must_use]
    pub fn version(&self) -> i64 {
        self.events
            .last()
            .map_or(EMPTY_STREAM_VERSION, |e| e.sequence_number)
    }

    /// Returns `true` when the stream holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Builds the deterministic stream id for an aggregate instance.
#[must_use]
pub fn stream_id_for(stream_type: &str, id: Uuid) -> String {
    format!("{stream_type}-{id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stored(seq: i64) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::new_v4(),
            stream_id: "Thing-1".to_owned(),
            stream_type: "Thing".to_owned(),
            sequence_number: seq,
            payload_type: "thing.touched".to_owned(),
            payload: serde_json::json!({}),
            created_by: String::new(),
            created_utc: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_empty_stream_reports_sentinel_version() {
        let stream = EventStream::empty("Thing-1");

        assert!(stream.is_empty());
        assert_eq!(stream.version(), EMPTY_STREAM_VERSION);
    }

    #[test]
    fn test_stream_version_is_last_sequence_number() {
        let stream = EventStream::new("Thing-1", vec![stored(0), stored(1), stored(2)]);

        assert_eq!(stream.version(), 2);
    }

    #[test]
    fn test_stream_id_for_joins_type_and_id() {
        let id = Uuid::nil();

        assert_eq!(
            stream_id_for("User", id),
            "User-00000000-0000-0000-0000-000000000000"
        );
    }
}
