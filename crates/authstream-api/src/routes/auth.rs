//! Sign-in routes.
//!
//! A sign-in looks the email up, records a login for a known user or creates
//! one for a new email, and answers with a bearer token. Checkpoint refresh
//! is queued by the command pipeline, not awaited here.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::{Json, Router, routing::get, routing::post};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use authstream_user::application::{command_handlers, query_handlers};
use authstream_user::domain::commands::{CreateUser, LoginUser};
use authstream_user::domain::records::UserRecord;

use crate::directory::DirectoryOutcome;
use crate::error::ApiError;
use crate::state::AppState;
use crate::token::Claims;

/// Request body for POST /shopper/signin.
#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    /// Email to sign in with.
    pub email: String,
}

/// Request body for POST /admin/signin.
#[derive(Deserialize)]
pub struct AdminSigninRequest {
    /// Email to sign in with.
    pub email: String,
    /// Directory password.
    pub password: String,
}

/// Response body of a successful sign-in.
#[derive(Debug, Serialize)]
pub struct SigninResponse {
    /// Bearer token.
    pub access_token: String,
}

/// Extracts and validates the bearer token of a request.
///
/// # Errors
///
/// Returns `ApiError::Unauthorized` for a missing, malformed, invalid or
/// expired token.
pub fn bearer_claims(state: &AppState, headers: &HeaderMap) -> Result<Claims, ApiError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_owned()))?;

    state.tokens.validate(token.trim()).map_err(|e| {
        warn!(error = %e, "bearer token rejected");
        ApiError::Unauthorized(e.to_string())
    })
}

async fn sign_in(state: &AppState, email: &str) -> Result<UserRecord, ApiError> {
    let pipeline = state.user_pipeline();
    let query = query_handlers::GetUserByEmail {
        email: email.to_owned(),
    };
    let existing = query_handlers::get_user_by_email(
        &query,
        state.user_views.as_ref(),
        state.user_checkpoints.as_ref(),
    )
    .await?;

    let record = match existing {
        Some(view) => {
            let command = LoginUser {
                correlation_id: Uuid::new_v4(),
                user_id: view.id,
                actor: email.to_owned(),
            };
            command_handlers::handle_login_user(&command, &pipeline).await?
        }
        None => {
            let command = CreateUser {
                correlation_id: Uuid::new_v4(),
                email: email.to_owned(),
                actor: email.to_owned(),
            };
            command_handlers::handle_create_user(&command, &pipeline).await?
        }
    };
    Ok(record)
}

/// POST /shopper/signin
#[instrument(skip_all)]
async fn shopper_signin(
    State(state): State<AppState>,
    Json(request): Json<SigninRequest>,
) -> Result<Json<SigninResponse>, ApiError> {
    let user = sign_in(&state, &request.email).await?;
    info!(user_id = %user.id, "shopper signed in");

    let access_token = state.tokens.issue(user.id, &user.email, false)?;
    Ok(Json(SigninResponse { access_token }))
}

/// POST /admin/signin
#[instrument(skip_all)]
async fn admin_signin(
    State(state): State<AppState>,
    Json(request): Json<AdminSigninRequest>,
) -> Result<Json<SigninResponse>, ApiError> {
    let outcome = state
        .directory
        .check(&request.email, &request.password)
        .await;
    if outcome != DirectoryOutcome::Success {
        warn!(outcome = outcome.as_str(), "directory rejected admin sign-in");
        return Err(ApiError::Unauthorized(format!(
            "directory check failed: {}",
            outcome.as_str()
        )));
    }

    let user = sign_in(&state, &request.email).await?;
    info!(user_id = %user.id, "admin signed in");

    let access_token = state.tokens.issue(user.id, &user.email, true)?;
    Ok(Json(SigninResponse { access_token }))
}

/// GET /me
async fn me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Claims>, ApiError> {
    bearer_claims(&state, &headers).map(Json)
}

/// Returns the router for the auth context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/shopper/signin", post(shopper_signin))
        .route("/admin/signin", post(admin_signin))
        .route("/me", get(me))
}
