//! Query handlers for the User identity context.
//!
//! Lookups by email read the view store first and fall back to the
//! checkpoint store, so a user created moments ago is found before the
//! rebuild worker has projected its view. Lookups by id read the checkpoint
//! and fall back to replaying the stream.

use authstream_core::checkpoint::{CheckpointRepository, load_aggregate};
use authstream_core::container::{ContainerRepository, FieldFilter};
use authstream_core::error::DomainError;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{User, normalize_email};
use crate::domain::records::{NORMALIZED_EMAIL_FIELD, UserRecord, UserViewRecord};

/// Query for a user by email address.
#[derive(Debug, Clone)]
pub struct GetUserByEmail {
    /// Email as typed; normalized before matching.
    pub email: String,
}

/// Query for a user by id.
#[derive(Debug, Clone, Copy)]
pub struct GetUserById {
    /// The user identifier.
    pub user_id: Uuid,
}

/// Retrieves the view record of the user with the given email, if any.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an empty email and
/// `DomainError::Infrastructure` if a store cannot be read.
#[instrument(skip_all)]
pub async fn get_user_by_email(
    query: &GetUserByEmail,
    views: &dyn ContainerRepository<UserViewRecord>,
    checkpoints: &dyn CheckpointRepository<User>,
) -> Result<Option<UserViewRecord>, DomainError> {
    if query.email.trim().is_empty() {
        return Err(DomainError::Validation("email is required".to_owned()));
    }
    let filter = [FieldFilter::equals(
        NORMALIZED_EMAIL_FIELD,
        normalize_email(&query.email),
    )];

    if let Some(view) = views.query(&filter).await?.into_iter().next() {
        return Ok(Some(view));
    }

    let found = checkpoints
        .query(&filter)
        .await?
        .first()
        .map(UserViewRecord::from);
    if found.is_some() {
        debug!("user found in checkpoint store, view not yet projected");
    }
    Ok(found)
}

/// Retrieves a user by id.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a nil id,
/// `DomainError::AggregateNotFound` if no checkpoint or event exists, and
/// `DomainError::Infrastructure` if a store cannot be read.
#[instrument(skip_all, fields(user_id = %query.user_id))]
pub async fn get_user_by_id(
    query: GetUserById,
    checkpoints: &dyn CheckpointRepository<User>,
) -> Result<UserRecord, DomainError> {
    if query.user_id.is_nil() {
        return Err(DomainError::Validation("user id is required".to_owned()));
    }
    let (user, _) = load_aggregate::<User>(checkpoints, query.user_id)
        .await?
        .ok_or(DomainError::AggregateNotFound(query.user_id))?;
    Ok(UserRecord::from(&user))
}
