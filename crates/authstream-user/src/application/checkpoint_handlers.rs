//! Checkpoint handlers for the User identity context.

use authstream_core::checkpoint::{CheckpointRepository, update_checkpoint};
use authstream_core::command::Command;
use authstream_core::error::DomainError;
use tracing::{info, instrument};

use crate::domain::aggregates::User;
use crate::domain::commands::{RebuildUserCheckpoints, UpdateUserCheckpoint};
use crate::domain::records::UserRecord;

/// Handles the `UpdateUserCheckpoint` command: loads the checkpoint (or
/// replays the stream), fast-forwards it and writes it back under the version
/// it was read at.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a nil id,
/// `DomainError::AggregateNotFound` for a user with no events, and
/// `DomainError::ConcurrencyConflict` if the checkpoint moved meanwhile.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, user_id = %command.user_id))]
pub async fn handle_update_user_checkpoint(
    command: &UpdateUserCheckpoint,
    checkpoints: &dyn CheckpointRepository<User>,
) -> Result<UserRecord, DomainError> {
    command.validate()?;

    let user = update_checkpoint::<User>(checkpoints, command.user_id).await?;
    Ok(UserRecord::from(&user))
}

/// Handles the `RebuildUserCheckpoints` command, returning the number of
/// checkpoints written.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the event store cannot be read.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_rebuild_user_checkpoints(
    command: &RebuildUserCheckpoints,
    checkpoints: &dyn CheckpointRepository<User>,
) -> Result<usize, DomainError> {
    command.validate()?;

    let written = checkpoints.rebuild().await?;
    info!(written, "user checkpoints rebuilt");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use authstream_core::container::ContainerRepository;
    use authstream_core::event::EMPTY_STREAM_VERSION;
    use authstream_core::repository::EventRepository;
    use authstream_test_support::{
        FailingEventRepository, FixedClock, InMemoryCheckpointRepository, InMemoryEventRepository,
    };
    use uuid::Uuid;

    use super::*;
    use crate::domain::aggregates::{UserEntity, login, new_user};

    async fn seed(events: &InMemoryEventRepository, logins: usize) -> UserEntity {
        let clock = FixedClock::default();
        let mut user = new_user(Uuid::new_v4(), "a@b.com", "", &clock).unwrap();
        for _ in 0..logins {
            user.apply(login(&clock), "", &clock).unwrap();
        }
        events
            .append_events(
                user.stream_id(),
                EMPTY_STREAM_VERSION,
                &user.stored_events_from(0).unwrap(),
            )
            .await
            .unwrap();
        user
    }

    fn update(user_id: Uuid) -> UpdateUserCheckpoint {
        UpdateUserCheckpoint {
            correlation_id: Uuid::new_v4(),
            user_id,
        }
    }

    #[tokio::test]
    async fn test_update_checkpoint_writes_latest_sequence() {
        // Arrange
        let events = Arc::new(InMemoryEventRepository::new());
        let user = seed(&events, 2).await;
        let checkpoints = InMemoryCheckpointRepository::<User>::new(events.clone());

        // Act
        let record = handle_update_user_checkpoint(&update(user.id()), &checkpoints)
            .await
            .unwrap();

        // Assert
        assert_eq!(record.at_sequence, 2);
        let stored = checkpoints.get_by_id(user.id()).await.unwrap().unwrap();
        assert_eq!(stored.at_sequence(), 2);
    }

    #[tokio::test]
    async fn test_update_checkpoint_already_current_is_unchanged() {
        let events = Arc::new(InMemoryEventRepository::new());
        let user = seed(&events, 1).await;
        let checkpoints = InMemoryCheckpointRepository::<User>::new(events.clone());
        handle_update_user_checkpoint(&update(user.id()), &checkpoints)
            .await
            .unwrap();

        let record = handle_update_user_checkpoint(&update(user.id()), &checkpoints)
            .await
            .unwrap();

        assert_eq!(record.at_sequence, 1);
        assert_eq!(record.last_login, user.state().last_login());
    }

    #[tokio::test]
    async fn test_update_checkpoint_unknown_user_is_not_found() {
        let events: Arc<InMemoryEventRepository> = Arc::new(InMemoryEventRepository::new());
        let checkpoints = InMemoryCheckpointRepository::<User>::new(events);

        let result = handle_update_user_checkpoint(&update(Uuid::new_v4()), &checkpoints).await;

        assert!(matches!(result, Err(DomainError::AggregateNotFound(_))));
    }

    #[tokio::test]
    async fn test_rebuild_counts_every_user_stream() {
        let events = Arc::new(InMemoryEventRepository::new());
        for logins in 0..4 {
            seed(&events, logins).await;
        }
        let checkpoints = InMemoryCheckpointRepository::<User>::new(events.clone());
        let command = RebuildUserCheckpoints {
            correlation_id: Uuid::new_v4(),
        };

        let written = handle_rebuild_user_checkpoints(&command, &checkpoints)
            .await
            .unwrap();

        assert_eq!(written, 4);
        assert_eq!(checkpoints.documents().len(), 4);
    }

    #[tokio::test]
    async fn test_rebuild_surfaces_event_store_failure() {
        let checkpoints = InMemoryCheckpointRepository::<User>::new(Arc::new(FailingEventRepository));
        let command = RebuildUserCheckpoints {
            correlation_id: Uuid::new_v4(),
        };

        let result = handle_rebuild_user_checkpoints(&command, &checkpoints).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }
}
