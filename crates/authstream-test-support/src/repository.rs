//! Test repositories: in-memory `EventRepository` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use authstream_core::error::DomainError;
use authstream_core::event::{EMPTY_STREAM_VERSION, EventStream};
use authstream_core::repository::{EventRepository, StoredEvent};
use chrono::{DateTime, Utc};

/// An event repository backed by a map of streams.
///
/// The expected-version check and the append happen under one lock, so it
/// behaves like the real store for concurrent writers. Conflicts can also be
/// forced with [`InMemoryEventRepository::force_conflicts`].
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    streams: Mutex<HashMap<String, Vec<StoredEvent>>>,
    forced_conflicts: Mutex<u32>,
    append_attempts: Mutex<Vec<(String, i64, usize)>>,
}

impl InMemoryEventRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` appends return `Ok(false)` regardless of version.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn force_conflicts(&self, count: u32) {
        *self.forced_conflicts.lock().unwrap() = count;
    }

    /// Returns every stored event of one stream.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn stream(&self, stream_id: &str) -> Vec<StoredEvent> {
        self.streams
            .lock()
            .unwrap()
            .get(stream_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns `(stream_id, expected_version, event_count)` for every append
    /// attempt, successful or not.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn append_attempts(&self) -> Vec<(String, i64, usize)> {
        self.append_attempts.lock().unwrap().clone()
    }

    /// Total number of stored events across all streams.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn event_count(&self) -> usize {
        self.streams.lock().unwrap().values().map(Vec::len).sum()
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn is_connected(&self) -> bool {
        true
    }

    async fn append_events(
        &self,
        stream_id: &str,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<bool, DomainError> {
        self.append_attempts.lock().unwrap().push((
            stream_id.to_owned(),
            expected_version,
            events.len(),
        ));

        {
            let mut forced = self.forced_conflicts.lock().unwrap();
            if *forced > 0 {
                *forced -= 1;
                return Ok(false);
            }
        }

        let mut streams = self.streams.lock().unwrap();
        let stream = streams.entry(stream_id.to_owned()).or_default();
        let version = stream
            .last()
            .map_or(EMPTY_STREAM_VERSION, |e| e.sequence_number);
        if version != expected_version {
            return Ok(false);
        }
        stream.extend_from_slice(events);
        Ok(true)
    }

    async fn load_stream_from(
        &self,
        stream_id: &str,
        from_sequence_number: i64,
    ) -> Result<EventStream, DomainError> {
        let events = self
            .stream(stream_id)
            .into_iter()
            .filter(|e| e.sequence_number >= from_sequence_number)
            .collect();
        Ok(EventStream::new(stream_id, events))
    }

    async fn load_streams_by_type(
        &self,
        stream_type: &str,
    ) -> Result<HashMap<String, EventStream>, DomainError> {
        Ok(self
            .streams
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, events)| {
                events
                    .first()
                    .is_some_and(|e| e.stream_type == stream_type)
            })
            .map(|(id, events)| (id.clone(), EventStream::new(id.clone(), events.clone())))
            .collect())
    }

    async fn load_streams_by_type_since(
        &self,
        stream_type: &str,
        from: DateTime<Utc>,
    ) -> Result<HashMap<String, EventStream>, DomainError> {
        let mut found = HashMap::new();
        for (id, stream) in self.load_streams_by_type(stream_type).await? {
            let recent: Vec<StoredEvent> = stream
                .events
                .into_iter()
                .filter(|e| e.created_utc >= from)
                .collect();
            if !recent.is_empty() {
                found.insert(id.clone(), EventStream::new(id, recent));
            }
        }
        Ok(found)
    }
}

/// An event repository that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventRepository;

#[async_trait]
impl EventRepository for FailingEventRepository {
    async fn is_connected(&self) -> bool {
        false
    }

    async fn append_events(
        &self,
        _stream_id: &str,
        _expected_version: i64,
        _events: &[StoredEvent],
    ) -> Result<bool, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn load_stream_from(
        &self,
        _stream_id: &str,
        _from_sequence_number: i64,
    ) -> Result<EventStream, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn load_streams_by_type(
        &self,
        _stream_type: &str,
    ) -> Result<HashMap<String, EventStream>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn load_streams_by_type_since(
        &self,
        _stream_type: &str,
        _from: DateTime<Utc>,
    ) -> Result<HashMap<String, EventStream>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
