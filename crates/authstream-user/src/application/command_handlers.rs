//! Command handlers for the User identity context.
//!
//! Each handler validates its command, then hands the load / apply / append /
//! retry / notify skeleton to a [`CommandPipeline`] with the transition it
//! wants applied.

use authstream_core::command::Command;
use authstream_core::error::DomainError;
use authstream_core::pipeline::CommandPipeline;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{User, login, logout};
use crate::domain::commands::{CreateUser, LoginUser, LogoutUser};
use crate::domain::events::{UserCreated, UserEventKind};
use crate::domain::records::UserRecord;

/// Handles the `CreateUser` command: synthesizes the creation event under a
/// fresh id and appends it to an empty stream.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a missing or malformed email, and
/// store errors as they occur.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_create_user(
    command: &CreateUser,
    pipeline: &CommandPipeline<'_, User>,
) -> Result<UserRecord, DomainError> {
    command.validate()?;

    let payload = UserEventKind::Created(UserCreated {
        id: Uuid::new_v4(),
        email: command.email.trim().to_owned(),
    });
    let user = pipeline.create(payload, &command.actor).await?;

    info!(user_id = %user.id(), "user created");
    Ok(UserRecord::from(&user))
}

/// Handles the `LoginUser` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a nil id,
/// `DomainError::AggregateNotFound` for an unknown user and
/// `DomainError::ConcurrencyConflict` if the append keeps conflicting.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, user_id = %command.user_id))]
pub async fn handle_login_user(
    command: &LoginUser,
    pipeline: &CommandPipeline<'_, User>,
) -> Result<UserRecord, DomainError> {
    command.validate()?;

    let clock = pipeline.clock();
    let user = pipeline
        .execute(command.user_id, &command.actor, |_| Ok(login(clock)))
        .await?;

    info!(at_sequence = user.at_sequence(), "user logged in");
    Ok(UserRecord::from(&user))
}

/// Handles the `LogoutUser` command.
///
/// # Errors
///
/// Same as [`handle_login_user`].
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, user_id = %command.user_id))]
pub async fn handle_logout_user(
    command: &LogoutUser,
    pipeline: &CommandPipeline<'_, User>,
) -> Result<UserRecord, DomainError> {
    command.validate()?;

    let clock = pipeline.clock();
    let user = pipeline
        .execute(command.user_id, &command.actor, |_| Ok(logout(clock)))
        .await?;

    info!(at_sequence = user.at_sequence(), "user logged out");
    Ok(UserRecord::from(&user))
}
