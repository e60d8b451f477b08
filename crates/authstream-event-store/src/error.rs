//! Mapping of `sqlx` errors onto `DomainError`.

use authstream_core::error::DomainError;

/// `PostgreSQL` SQLSTATE for a unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Converts a `sqlx` error raised by `operation` into an infrastructure error.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DomainError {
    match err {
        sqlx::Error::Database(db_err) => DomainError::Infrastructure(format!(
            "database error in {operation}: {} ({})",
            db_err.message(),
            db_err.code().as_deref().unwrap_or("no code")
        )),
        sqlx::Error::PoolClosed => {
            DomainError::Infrastructure(format!("connection pool closed in {operation}"))
        }
        other => DomainError::Infrastructure(format!("sqlx error in {operation}: {other}")),
    }
}

/// Returns `true` if `err` is a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}
