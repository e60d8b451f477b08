//! Minimal in-memory stores for this crate's own tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::aggregate::{Aggregate, AggregateState};
use crate::checkpoint::CheckpointRepository;
use crate::container::{ContainerRepository, FieldFilter, matches_all};
use crate::error::DomainError;
use crate::event::{EMPTY_STREAM_VERSION, EventStream};
use crate::notify::{CheckpointRequest, UpdateNotifier};
use crate::repository::{EventRepository, StoredEvent};

#[derive(Default)]
pub(crate) struct MemoryEvents {
    streams: Mutex<HashMap<String, Vec<StoredEvent>>>,
    /// Appends to reject before accepting again.
    pub(crate) forced_conflicts: Mutex<u32>,
    pub(crate) append_calls: Mutex<Vec<(String, i64)>>,
}

impl MemoryEvents {
    pub(crate) fn stream(&self, stream_id: &str) -> Vec<StoredEvent> {
        self.streams
            .lock()
            .unwrap()
            .get(stream_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventRepository for MemoryEvents {
    async fn is_connected(&self) -> bool {
        true
    }

    async fn append_events(
        &self,
        stream_id: &str,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<bool, DomainError> {
        self.append_calls
            .lock()
            .unwrap()
            .push((stream_id.to_owned(), expected_version));
        {
            let mut forced = self.forced_conflicts.lock().unwrap();
            if *forced > 0 {
                *forced -= 1;
                return Ok(false);
            }
        }
        let mut streams = self.streams.lock().unwrap();
        let stream = streams.entry(stream_id.to_owned()).or_default();
        let version = stream.last().map_or(EMPTY_STREAM_VERSION, |e| e.sequence_number);
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
            .filter(|(_, events)| events.first().is_some_and(|e| e.stream_type == stream_type))
            .map(|(id, events)| (id.clone(), EventStream::new(id.clone(), events.clone())))
            .collect())
    }

    async fn load_streams_by_type_since(
        &self,
        stream_type: &str,
        from: DateTime<Utc>,
    ) -> Result<HashMap<String, EventStream>, DomainError> {
        let all = self.load_streams_by_type(stream_type).await?;
        Ok(all
            .into_iter()
            .filter_map(|(id, stream)| {
                let recent: Vec<_> = stream
                    .events
                    .into_iter()
                    .filter(|e| e.created_utc >= from)
                    .collect();
                (!recent.is_empty()).then(|| (id.clone(), EventStream::new(id, recent)))
            })
            .collect())
    }
}

pub(crate) struct MemoryCheckpoints<S: AggregateState> {
    events: MemoryEvents,
    documents: Mutex<HashMap<Uuid, Aggregate<S>>>,
}

impl<S: AggregateState> MemoryCheckpoints<S> {
    pub(crate) fn new(events: MemoryEvents) -> Self {
        Self {
            events,
            documents: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn events(&self) -> &MemoryEvents {
        &self.events
    }

    pub(crate) fn put(&self, item: Aggregate<S>) {
        self.documents.lock().unwrap().insert(item.id(), item);
    }
}

#[async_trait]
impl<S: AggregateState> ContainerRepository<Aggregate<S>> for MemoryCheckpoints<S> {
    fn container(&self) -> &str {
        "checkpoint"
    }

    async fn is_connected(&self) -> bool {
        true
    }

    async fn upsert(&self, item: &Aggregate<S>) -> Result<Aggregate<S>, DomainError> {
        self.put(item.clone());
        Ok(item.clone())
    }

    async fn get_all(&self) -> Result<Vec<Aggregate<S>>, DomainError> {
        Ok(self.documents.lock().unwrap().values().cloned().collect())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Aggregate<S>>, DomainError> {
        Ok(self.documents.lock().unwrap().get(&id).cloned())
    }

    async fn query(&self, filters: &[FieldFilter]) -> Result<Vec<Aggregate<S>>, DomainError> {
        let mut found = Vec::new();
        for item in self.get_all().await? {
            if matches_all(&serde_json::to_value(&item)?, filters) {
                found.push(item);
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl<S: AggregateState> CheckpointRepository<S> for MemoryCheckpoints<S> {
    fn event_repository(&self) -> &dyn EventRepository {
        &self.events
    }

    async fn upsert_versioned(
        &self,
        expected_version: i64,
        item: &Aggregate<S>,
    ) -> Result<Option<Aggregate<S>>, DomainError> {
        let mut documents = self.documents.lock().unwrap();
        let current = documents
            .get(&item.id())
            .map_or(EMPTY_STREAM_VERSION, Aggregate::at_sequence);
        if current != expected_version {
            return Ok(None);
        }
        documents.insert(item.id(), item.clone());
        Ok(Some(item.clone()))
    }
}

#[derive(Default)]
pub(crate) struct MemoryNotifier {
    pub(crate) sent: Mutex<Vec<CheckpointRequest>>,
    pub(crate) fail: bool,
}

impl UpdateNotifier for MemoryNotifier {
    fn send(&self, request: CheckpointRequest) -> Result<(), DomainError> {
        if self.fail {
            return Err(DomainError::Infrastructure("queue closed".into()));
        }
        self.sent.lock().unwrap().push(request);
        Ok(())
    }
}
