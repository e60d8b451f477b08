//! Test document stores: in-memory `ContainerRepository` and
//! `CheckpointRepository` implementations for tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use authstream_core::aggregate::{Aggregate, AggregateState};
use authstream_core::checkpoint::CheckpointRepository;
use authstream_core::container::{
    ContainerRepository, Document, FieldFilter, checkpoint_container, matches_all,
};
use authstream_core::error::DomainError;
use authstream_core::event::EMPTY_STREAM_VERSION;
use authstream_core::repository::EventRepository;
use uuid::Uuid;

/// A container repository backed by a map of documents.
///
/// Upserts of ids registered with [`InMemoryContainerRepository::fail_on`]
/// return an infrastructure error.
#[derive(Debug)]
pub struct InMemoryContainerRepository<T> {
    name: String,
    documents: Mutex<HashMap<Uuid, T>>,
    failing_ids: Mutex<HashSet<Uuid>>,
    upserts: Mutex<usize>,
}

impl<T: Document> InMemoryContainerRepository<T> {
    /// Creates an empty container called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: Mutex::new(HashMap::new()),
            failing_ids: Mutex::new(HashSet::new()),
            upserts: Mutex::new(0),
        }
    }

    /// Makes every upsert of `id` fail.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_on(&self, id: Uuid) {
        self.failing_ids.lock().unwrap().insert(id);
    }

    /// Number of successful upserts so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn upsert_count(&self) -> usize {
        *self.upserts.lock().unwrap()
    }

    /// Number of documents held.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn len(&self) -> usize {
        self.documents.lock().unwrap().len()
    }

    /// Returns `true` when the container holds no documents.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_failure(&self, id: Uuid) -> Result<(), DomainError> {
        if self.failing_ids.lock().unwrap().contains(&id) {
            return Err(DomainError::Infrastructure(format!(
                "write to {} rejected for {id}",
                self.name
            )));
        }
        Ok(())
    }

    fn store(&self, item: &T) {
        self.documents
            .lock()
            .unwrap()
            .insert(item.document_id(), item.clone());
        *self.upserts.lock().unwrap() += 1;
    }
}

#[async_trait]
impl<T: Document> ContainerRepository<T> for InMemoryContainerRepository<T> {
    fn container(&self) -> &str {
        &self.name
    }

    async fn is_connected(&self) -> bool {
        true
    }

    async fn upsert(&self, item: &T) -> Result<T, DomainError> {
        self.check_failure(item.document_id())?;
        self.store(item);
        Ok(item.clone())
    }

    async fn get_all(&self) -> Result<Vec<T>, DomainError> {
        Ok(self.documents.lock().unwrap().values().cloned().collect())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<T>, DomainError> {
        Ok(self.documents.lock().unwrap().get(&id).cloned())
    }

    async fn query(&self, filters: &[FieldFilter]) -> Result<Vec<T>, DomainError> {
        let mut found = Vec::new();
        for item in self.get_all().await? {
            if matches_all(&serde_json::to_value(&item)?, filters) {
                found.push(item);
            }
        }
        Ok(found)
    }
}

/// A checkpoint repository over an in-memory container and any event store.
pub struct InMemoryCheckpointRepository<S: AggregateState> {
    events: Arc<dyn EventRepository>,
    documents: InMemoryContainerRepository<Aggregate<S>>,
}

impl<S: AggregateState> InMemoryCheckpointRepository<S> {
    /// Creates an empty checkpoint container derived from `events`.
    #[must_use]
    pub fn new(events: Arc<dyn EventRepository>) -> Self {
        Self {
            events,
            documents: InMemoryContainerRepository::new(checkpoint_container(S::STREAM_TYPE)),
        }
    }

    /// Access to the underlying container, for failure injection and counts.
    #[must_use]
    pub fn documents(&self) -> &InMemoryContainerRepository<Aggregate<S>> {
        &self.documents
    }
}

#[async_trait]
impl<S: AggregateState> ContainerRepository<Aggregate<S>> for InMemoryCheckpointRepository<S> {
    fn container(&self) -> &str {
        self.documents.container()
    }

    async fn is_connected(&self) -> bool {
        self.events.is_connected().await
    }

    async fn upsert(&self, item: &Aggregate<S>) -> Result<Aggregate<S>, DomainError> {
        self.documents.upsert(item).await
    }

    async fn get_all(&self) -> Result<Vec<Aggregate<S>>, DomainError> {
        self.documents.get_all().await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Aggregate<S>>, DomainError> {
        self.documents.get_by_id(id).await
    }

    async fn query(&self, filters: &[FieldFilter]) -> Result<Vec<Aggregate<S>>, DomainError> {
        self.documents.query(filters).await
    }
}

#[async_trait]
impl<S: AggregateState> CheckpointRepository<S> for InMemoryCheckpointRepository<S> {
    fn event_repository(&self) -> &dyn EventRepository {
        self.events.as_ref()
    }

    async fn upsert_versioned(
        &self,
        expected_version: i64,
        item: &Aggregate<S>,
    ) -> Result<Option<Aggregate<S>>, DomainError> {
        self.documents.check_failure(item.id())?;
        let mut documents = self.documents.documents.lock().unwrap();
        let current = documents
            .get(&item.id())
            .map_or(EMPTY_STREAM_VERSION, Aggregate::at_sequence);
        if current != expected_version {
            return Ok(None);
        }
        documents.insert(item.id(), item.clone());
        drop(documents);
        *self.documents.upserts.lock().unwrap() += 1;
        Ok(Some(item.clone()))
    }
}
