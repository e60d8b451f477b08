//! Aggregate root abstraction.
//!
//! An [`Aggregate`] wraps the pure domain state `S` with the bookkeeping that
//! every event-sourced entity shares: identity, stream id, the sequence number
//! it reflects, audit fields and the events applied since construction.
//! State is only ever changed through [`Aggregate::apply`] (new events) and
//! [`Aggregate::apply_event`] (replay).

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::container::Document;
use crate::error::DomainError;
use crate::event::{EMPTY_STREAM_VERSION, Event, EventMetadata, EventPayload, EventStream, stream_id_for};
use crate::repository::StoredEvent;

/// Domain state of one aggregate kind, folded from its payloads.
pub trait AggregateState:
    Default + Clone + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The closed payload type this aggregate consumes.
    type Payload: EventPayload;

    /// Aggregate kind discriminator, also the stream id prefix.
    const STREAM_TYPE: &'static str;

    /// Returns the new identity if `payload` is the creation payload.
    fn creation_id(payload: &Self::Payload) -> Option<Uuid>;

    /// Mutates only the fields owned by the event's payload variant.
    fn when(&mut self, event: &Event<Self::Payload>);
}

/// An event-sourced entity: domain state plus stream bookkeeping.
///
/// Serializes to the checkpoint document layout. The applied-events list is
/// not part of the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    rename_all = "camelCase",
    bound(serialize = "S: Serialize", deserialize = "S: DeserializeOwned")
)]
pub struct Aggregate<S: AggregateState> {
    id: Uuid,
    stream_id: String,
    at_sequence: i64,
    created_by: String,
    updated_by: String,
    created_utc: Option<DateTime<Utc>>,
    updated_utc: Option<DateTime<Utc>>,
    #[serde(flatten)]
    state: S,
    #[serde(skip)]
    events: Vec<Event<S::Payload>>,
}

impl<S: AggregateState> Default for Aggregate<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: AggregateState> Aggregate<S> {
    /// Creates an empty, unidentified aggregate.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::nil(),
            stream_id: String::new(),
            at_sequence: EMPTY_STREAM_VERSION,
            created_by: String::new(),
            updated_by: String::new(),
            created_utc: None,
            updated_utc: None,
            state: S::default(),
            events: Vec::new(),
        }
    }

    /// Replays a full, ordered event list from an empty aggregate.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if the events are not a
    /// contiguous history starting with the creation event.
    pub fn from_events<I>(events: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = Event<S::Payload>>,
    {
        let mut aggregate = Self::new();
        for event in events {
            aggregate.apply_event(event)?;
        }
        Ok(aggregate)
    }

    /// Decodes and replays a stored stream.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnrecognizedEvent` if a stored payload type is
    /// unknown, which stops the replay of this aggregate.
    pub fn from_stream(stream: &EventStream) -> Result<Self, DomainError> {
        let mut aggregate = Self::new();
        aggregate.fold_stored(&stream.events)?;
        Ok(aggregate)
    }

    /// Folds already-persisted events into this aggregate, in order.
    ///
    /// # Errors
    ///
    /// See [`Aggregate::from_stream`] and [`Aggregate::apply_event`].
    pub fn fold_stored(&mut self, stored: &[StoredEvent]) -> Result<(), DomainError> {
        for stored_event in stored {
            if stored_event.stream_type != S::STREAM_TYPE {
                return Err(DomainError::UnrecognizedEvent {
                    stream_type: S::STREAM_TYPE.to_owned(),
                    payload_type: format!(
                        "{} (from stream type '{}')",
                        stored_event.payload_type, stored_event.stream_type
                    ),
                });
            }
            let event = Event::<S::Payload>::from_stored(stored_event)?;
            self.apply_event(event)?;
        }
        Ok(())
    }

    /// Synthesizes a new event for `payload` at the next sequence number and
    /// folds it in.
    ///
    /// A creation payload produces sequence 0 and a freshly derived stream id;
    /// any other payload produces `at_sequence + 1` on the current stream.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` for a creation payload on an
    /// identified aggregate, or any other payload on an unidentified one.
    pub fn apply(
        &mut self,
        payload: S::Payload,
        created_by: &str,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let (stream_id, sequence_number) = match S::creation_id(&payload) {
            Some(id) => (stream_id_for(S::STREAM_TYPE, id), 0),
            None => (self.stream_id.clone(), self.at_sequence + 1),
        };

        let event = Event {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                stream_id,
                stream_type: S::STREAM_TYPE.to_owned(),
                sequence_number,
                created_by: created_by.to_owned(),
                created_utc: clock.now(),
            },
            payload,
        };

        self.apply_event(event)
    }

    /// Folds one event into the aggregate.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if the event would reset an
    /// existing identity, precede creation, or break sequence contiguity.
    pub fn apply_event(&mut self, event: Event<S::Payload>) -> Result<(), DomainError> {
        let sequence_number = event.sequence_number();

        match S::creation_id(&event.payload) {
            Some(id) => {
                if self.is_created() {
                    return Err(DomainError::InvalidTransition(format!(
                        "{} '{}' already exists, cannot apply '{}'",
                        S::STREAM_TYPE,
                        self.id,
                        event.payload.payload_type()
                    )));
                }
                if sequence_number != 0 {
                    return Err(DomainError::InvalidTransition(format!(
                        "creation event for {} must be at sequence 0, got {sequence_number}",
                        S::STREAM_TYPE
                    )));
                }
                self.id = id;
                self.stream_id.clone_from(&event.metadata.stream_id);
                self.created_by.clone_from(&event.metadata.created_by);
                self.created_utc = Some(event.metadata.created_utc);
            }
            None => {
                if !self.is_created() {
                    return Err(DomainError::InvalidTransition(format!(
                        "cannot apply '{}' to a {} that has not been created",
                        event.payload.payload_type(),
                        S::STREAM_TYPE
                    )));
                }
                if sequence_number != self.at_sequence + 1 {
                    return Err(DomainError::InvalidTransition(format!(
                        "expected sequence {} on stream '{}', got {sequence_number}",
                        self.at_sequence + 1,
                        self.stream_id
                    )));
                }
            }
        }

        self.state.when(&event);
        self.updated_by.clone_from(&event.metadata.created_by);
        self.updated_utc = Some(event.metadata.created_utc);
        self.at_sequence = sequence_number;
        self.events.push(event);
        Ok(())
    }

    /// Returns the aggregate identifier (nil when unidentified).
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the stream id (empty when unidentified).
    #[must_use]
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Returns the sequence number this aggregate reflects.
    #[must_use]
    pub fn at_sequence(&self) -> i64 {
        self.at_sequence
    }

    /// Returns `true` once the creation event has been applied.
    #[must_use]
    pub fn is_created(&self) -> bool {
        !self.id.is_nil()
    }

    /// Returns the folded domain state.
    #[must_use]
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Actor of the creation event.
    #[must_use]
    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    /// Actor of the most recent event.
    #[must_use]
    pub fn updated_by(&self) -> &str {
        &self.updated_by
    }

    /// Timestamp of the creation event.
    #[must_use]
    pub fn created_utc(&self) -> Option<DateTime<Utc>> {
        self.created_utc
    }

    /// Timestamp of the most recent event.
    #[must_use]
    pub fn updated_utc(&self) -> Option<DateTime<Utc>> {
        self.updated_utc
    }

    /// All events applied since this value was constructed.
    #[must_use]
    pub fn events(&self) -> &[Event<S::Payload>] {
        &self.events
    }

    /// Applied events with a sequence number `>= from_sequence`.
    #[must_use]
    pub fn events_from(&self, from_sequence: i64) -> Vec<&Event<S::Payload>> {
        self.events
            .iter()
            .filter(|e| e.sequence_number() >= from_sequence)
            .collect()
    }

    /// Number of events applied since construction.
    #[must_use]
    pub fn events_count(&self) -> usize {
        self.events.len()
    }

    /// Stored form of the applied events with a sequence number `>= from_sequence`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if a payload cannot be serialized.
    pub fn stored_events_from(&self, from_sequence: i64) -> Result<Vec<StoredEvent>, DomainError> {
        self.events_from(from_sequence)
            .into_iter()
            .map(Event::to_stored)
            .collect()
    }
}

impl<S: AggregateState> Document for Aggregate<S> {
    fn document_id(&self) -> Uuid {
        self.id
    }

    fn document_version(&self) -> i64 {
        self.at_sequence
    }
}
