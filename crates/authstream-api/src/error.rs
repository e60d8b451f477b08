//! Authstream API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use authstream_core::error::DomainError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::token::TokenError;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failure.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Tracing subscriber or exporter setup failure.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// Request-level error that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A handler or query failed.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Nothing matched a lookup that has no aggregate id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing or rejected credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A token could not be issued.
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Domain(DomainError::AggregateNotFound(_)) => {
                (StatusCode::NOT_FOUND, "aggregate_not_found")
            }
            Self::Domain(DomainError::ConcurrencyConflict { .. }) => {
                (StatusCode::CONFLICT, "concurrency_conflict")
            }
            Self::Domain(DomainError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, "validation_error")
            }
            Self::Domain(DomainError::InvalidTransition(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_transition")
            }
            Self::Domain(DomainError::UnrecognizedEvent { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "unrecognized_event")
            }
            Self::Domain(DomainError::Infrastructure(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error")
            }
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::Token(_) => (StatusCode::INTERNAL_SERVER_ERROR, "token_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let body = ErrorBody {
            error: error_code,
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
