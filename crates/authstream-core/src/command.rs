//! Command abstractions.

use uuid::Uuid;

use crate::error::DomainError;

/// Trait that all commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the system.
    fn correlation_id(&self) -> Uuid;

    /// Checks the command's input before any store is touched.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` describing the first invalid field.
    fn validate(&self) -> Result<(), DomainError> {
        Ok(())
    }
}
