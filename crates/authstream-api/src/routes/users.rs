//! User lookup, sign-out and maintenance routes.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Json, Router, routing::get, routing::post};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use authstream_core::notify::CheckpointRequest;
use authstream_user::application::{
    checkpoint_handlers, command_handlers, query_handlers, view_handlers,
};
use authstream_user::domain::commands::{LogoutUser, UpdateUserCheckpoint, UpdateUserView};
use authstream_user::domain::events::USER_STREAM_TYPE;
use authstream_user::domain::records::{UserRecord, UserViewRecord};

use crate::error::ApiError;
use crate::routes::auth::bearer_claims;
use crate::state::AppState;

/// Query string of GET /.
#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    /// Email to look up.
    pub email: String,
}

/// Response body of POST /rebuild.
#[derive(Debug, Serialize)]
pub struct RebuildResponse {
    /// Always `queued`.
    pub status: &'static str,
}

/// GET /{id}
#[instrument(skip(state))]
async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserRecord>, ApiError> {
    let query = query_handlers::GetUserById { user_id };
    let record = query_handlers::get_user_by_id(query, state.user_checkpoints.as_ref()).await?;
    Ok(Json(record))
}

/// GET /?email=
#[instrument(skip_all)]
async fn find_user(
    State(state): State<AppState>,
    Query(params): Query<EmailQuery>,
) -> Result<Json<UserViewRecord>, ApiError> {
    let query = query_handlers::GetUserByEmail {
        email: params.email,
    };
    query_handlers::get_user_by_email(
        &query,
        state.user_views.as_ref(),
        state.user_checkpoints.as_ref(),
    )
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound("no user with that email".to_owned()))
}

/// POST /{id}/logout
///
/// Requires a bearer token for the same user, or a privileged one.
#[instrument(skip(state, headers))]
async fn logout_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<UserRecord>, ApiError> {
    let claims = bearer_claims(&state, &headers)?;
    if claims.sub != user_id.to_string() && !claims.is_privileged() {
        return Err(ApiError::Unauthorized(
            "token does not belong to this user".to_owned(),
        ));
    }

    let command = LogoutUser {
        correlation_id: Uuid::new_v4(),
        user_id,
        actor: claims.email,
    };
    let record = command_handlers::handle_logout_user(&command, &state.user_pipeline()).await?;
    Ok(Json(record))
}

/// POST /{id}/checkpoint
///
/// Refreshes the checkpoint and view of one user synchronously.
#[instrument(skip(state))]
async fn refresh_checkpoint(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserRecord>, ApiError> {
    let correlation_id = Uuid::new_v4();
    let record = checkpoint_handlers::handle_update_user_checkpoint(
        &UpdateUserCheckpoint {
            correlation_id,
            user_id,
        },
        state.user_checkpoints.as_ref(),
    )
    .await?;

    view_handlers::handle_update_user_view(
        &UpdateUserView {
            correlation_id,
            user_id: Some(user_id),
        },
        state.user_checkpoints.as_ref(),
        state.user_views.as_ref(),
    )
    .await?;

    Ok(Json(record))
}

/// POST /rebuild
#[instrument(skip_all)]
async fn rebuild(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<RebuildResponse>), ApiError> {
    state.notifier.send(CheckpointRequest::Rebuild {
        stream_type: USER_STREAM_TYPE.to_owned(),
    })?;
    info!("user rebuild queued");

    Ok((StatusCode::ACCEPTED, Json(RebuildResponse { status: "queued" })))
}

/// Returns the router for the users context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(find_user))
        .route("/rebuild", post(rebuild))
        .route("/{id}", get(get_user))
        .route("/{id}/logout", post(logout_user))
        .route("/{id}/checkpoint", post(refresh_checkpoint))
}
