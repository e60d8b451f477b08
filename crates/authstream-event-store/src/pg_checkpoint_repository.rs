//! `PostgreSQL` implementation of the `CheckpointRepository` trait.

use std::sync::Arc;

use async_trait::async_trait;
use authstream_core::aggregate::{Aggregate, AggregateState};
use authstream_core::checkpoint::CheckpointRepository;
use authstream_core::container::{ContainerRepository, FieldFilter, checkpoint_container};
use authstream_core::error::DomainError;
use authstream_core::repository::EventRepository;
use sqlx::PgPool;
use uuid::Uuid;

use crate::pg_container_repository::PgContainerRepository;

/// Checkpoints of aggregate kind `S`, stored in the `"{S}-checkpoint"`
/// container and derived from `events`.
pub struct PgCheckpointRepository<S: AggregateState> {
    documents: PgContainerRepository<Aggregate<S>>,
    events: Arc<dyn EventRepository>,
}

impl<S: AggregateState> PgCheckpointRepository<S> {
    /// Creates the checkpoint repository for `S`.
    #[must_use]
    pub fn new(pool: PgPool, events: Arc<dyn EventRepository>) -> Self {
        Self {
            documents: PgContainerRepository::new(pool, checkpoint_container(S::STREAM_TYPE)),
            events,
        }
    }
}

#[async_trait]
impl<S: AggregateState> ContainerRepository<Aggregate<S>> for PgCheckpointRepository<S> {
    fn container(&self) -> &str {
        self.documents.container()
    }

    async fn is_connected(&self) -> bool {
        self.documents.is_connected().await
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
impl<S: AggregateState> CheckpointRepository<S> for PgCheckpointRepository<S> {
    fn event_repository(&self) -> &dyn EventRepository {
        self.events.as_ref()
    }

    async fn upsert_versioned(
        &self,
        expected_version: i64,
        item: &Aggregate<S>,
    ) -> Result<Option<Aggregate<S>>, DomainError> {
        self.documents.upsert_versioned(expected_version, item).await
    }
}
