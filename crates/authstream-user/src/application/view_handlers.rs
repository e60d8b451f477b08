//! View handlers for the User identity context.
//!
//! The view store holds one [`UserViewRecord`] per user, projected from the
//! checkpoint. Failures are per item: a record that cannot be written is
//! logged and left stale until the next refresh.

use authstream_core::checkpoint::CheckpointRepository;
use authstream_core::command::Command;
use authstream_core::container::{ContainerRepository, FieldFilter};
use authstream_core::error::DomainError;
use tracing::{error, info, instrument};

use crate::domain::aggregates::{User, UserEntity};
use crate::domain::commands::{RebuildUserView, UpdateUserView};
use crate::domain::records::UserViewRecord;

async fn project(
    checkpoints: impl IntoIterator<Item = UserEntity>,
    views: &dyn ContainerRepository<UserViewRecord>,
) -> usize {
    let mut written = 0;
    for checkpoint in checkpoints {
        let record = UserViewRecord::from(&checkpoint);
        match views.upsert(&record).await {
            Ok(_) => written += 1,
            Err(e) => error!(user_id = %record.id, error = %e, "failed to write user view"),
        }
    }
    written
}

/// Handles the `UpdateUserView` command, returning the number of view
/// records written. A command without a user id writes nothing.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the checkpoint store cannot be
/// read.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_update_user_view(
    command: &UpdateUserView,
    checkpoints: &dyn CheckpointRepository<User>,
    views: &dyn ContainerRepository<UserViewRecord>,
) -> Result<usize, DomainError> {
    command.validate()?;
    let Some(user_id) = command.user_id else {
        return Ok(0);
    };

    let matching = checkpoints
        .query(&[FieldFilter::equals("id", user_id.to_string())])
        .await?;
    Ok(project(matching, views).await)
}

/// Handles the `RebuildUserView` command: projects every checkpoint into the
/// view store, returning the number of records written.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the checkpoint store cannot be
/// read.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_rebuild_user_view(
    command: &RebuildUserView,
    checkpoints: &dyn CheckpointRepository<User>,
    views: &dyn ContainerRepository<UserViewRecord>,
) -> Result<usize, DomainError> {
    command.validate()?;

    let all = checkpoints.get_all().await?;
    let total = all.len();
    let written = project(all, views).await;
    info!(total, written, "user views rebuilt");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use authstream_test_support::{
        FixedClock, InMemoryCheckpointRepository, InMemoryContainerRepository,
        InMemoryEventRepository,
    };
    use uuid::Uuid;

    use super::*;
    use crate::domain::aggregates::new_user;

    async fn checkpoints_with(
        emails: &[&str],
    ) -> (InMemoryCheckpointRepository<User>, Vec<UserEntity>) {
        let checkpoints =
            InMemoryCheckpointRepository::<User>::new(Arc::new(InMemoryEventRepository::new()));
        let mut users = Vec::new();
        for email in emails {
            let user = new_user(Uuid::new_v4(), email, "", &FixedClock::default()).unwrap();
            checkpoints.upsert(&user).await.unwrap();
            users.push(user);
        }
        (checkpoints, users)
    }

    #[tokio::test]
    async fn test_update_view_without_id_writes_nothing() {
        let (checkpoints, _) = checkpoints_with(&["a@b.com"]).await;
        let views = InMemoryContainerRepository::<UserViewRecord>::new("User-view");
        let command = UpdateUserView {
            correlation_id: Uuid::new_v4(),
            user_id: None,
        };

        let written = handle_update_user_view(&command, &checkpoints, &views)
            .await
            .unwrap();

        assert_eq!(written, 0);
        assert!(views.is_empty());
    }

    #[tokio::test]
    async fn test_update_view_projects_single_checkpoint() {
        // Arrange
        let (checkpoints, users) = checkpoints_with(&["a@b.com", "c@d.com"]).await;
        let views = InMemoryContainerRepository::<UserViewRecord>::new("User-view");
        let command = UpdateUserView {
            correlation_id: Uuid::new_v4(),
            user_id: Some(users[1].id()),
        };

        // Act
        let written = handle_update_user_view(&command, &checkpoints, &views)
            .await
            .unwrap();

        // Assert
        assert_eq!(written, 1);
        let view = views.get_by_id(users[1].id()).await.unwrap().unwrap();
        assert_eq!(view.normalized_email, "C@D.COM");
        assert!(views.get_by_id(users[0].id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rebuild_view_skips_failed_items() {
        // Arrange
        let (checkpoints, users) =
            checkpoints_with(&["a@b.com", "c@d.com", "e@f.com"]).await;
        let views = InMemoryContainerRepository::<UserViewRecord>::new("User-view");
        views.fail_on(users[1].id());
        let command = RebuildUserView {
            correlation_id: Uuid::new_v4(),
        };

        // Act
        let written = handle_rebuild_user_view(&command, &checkpoints, &views)
            .await
            .unwrap();

        // Assert
        assert_eq!(written, 2);
        assert_eq!(views.len(), 2);
        assert!(views.get_by_id(users[1].id()).await.unwrap().is_none());
    }
}
