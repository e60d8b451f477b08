//! Rebuild routines for the `User` aggregate kind.

use std::sync::Arc;

use async_trait::async_trait;
use authstream_core::checkpoint::CheckpointRepository;
use authstream_core::container::ContainerRepository;
use authstream_core::error::DomainError;
use authstream_rebuild::worker::RebuildHandler;
use authstream_user::application::{checkpoint_handlers, view_handlers};
use authstream_user::domain::aggregates::User;
use authstream_user::domain::commands::{
    RebuildUserCheckpoints, RebuildUserView, UpdateUserCheckpoint, UpdateUserView,
};
use authstream_user::domain::events::USER_STREAM_TYPE;
use authstream_user::domain::records::UserViewRecord;
use uuid::Uuid;

/// Drives the user checkpoint and view handlers from the rebuild worker.
#[derive(Clone)]
pub struct UserRebuildHandler {
    checkpoints: Arc<dyn CheckpointRepository<User>>,
    views: Arc<dyn ContainerRepository<UserViewRecord>>,
}

impl UserRebuildHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(
        checkpoints: Arc<dyn CheckpointRepository<User>>,
        views: Arc<dyn ContainerRepository<UserViewRecord>>,
    ) -> Self {
        Self { checkpoints, views }
    }
}

#[async_trait]
impl RebuildHandler for UserRebuildHandler {
    fn stream_type(&self) -> &str {
        USER_STREAM_TYPE
    }

    async fn rebuild_checkpoints(&self) -> Result<usize, DomainError> {
        let command = RebuildUserCheckpoints {
            correlation_id: Uuid::new_v4(),
        };
        checkpoint_handlers::handle_rebuild_user_checkpoints(&command, self.checkpoints.as_ref())
            .await
    }

    async fn update_checkpoint(&self, id: Uuid) -> Result<(), DomainError> {
        let command = UpdateUserCheckpoint {
            correlation_id: Uuid::new_v4(),
            user_id: id,
        };
        checkpoint_handlers::handle_update_user_checkpoint(&command, self.checkpoints.as_ref())
            .await
            .map(|_| ())
    }

    async fn rebuild_views(&self) -> Result<usize, DomainError> {
        let command = RebuildUserView {
            correlation_id: Uuid::new_v4(),
        };
        view_handlers::handle_rebuild_user_view(
            &command,
            self.checkpoints.as_ref(),
            self.views.as_ref(),
        )
        .await
    }

    async fn update_views(&self, id: Uuid) -> Result<usize, DomainError> {
        let command = UpdateUserView {
            correlation_id: Uuid::new_v4(),
            user_id: Some(id),
        };
        view_handlers::handle_update_user_view(&command, self.checkpoints.as_ref(), self.views.as_ref())
            .await
    }
}
