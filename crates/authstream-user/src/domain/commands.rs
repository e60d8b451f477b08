//! Commands for the User identity context.

use authstream_core::command::Command;
use authstream_core::error::DomainError;
use uuid::Uuid;

/// Command to create a user for a first-time email.
#[derive(Debug, Clone)]
pub struct CreateUser {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Email address of the new user.
    pub email: String,
    /// Actor recorded on the creation event.
    pub actor: String,
}

/// Command to record a sign-in.
#[derive(Debug, Clone)]
pub struct LoginUser {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user signing in.
    pub user_id: Uuid,
    /// Actor recorded on the event.
    pub actor: String,
}

/// Command to record a sign-out.
#[derive(Debug, Clone)]
pub struct LogoutUser {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user signing out.
    pub user_id: Uuid,
    /// Actor recorded on the event.
    pub actor: String,
}

/// Command to bring one user's checkpoint up to date with its stream.
#[derive(Debug, Clone)]
pub struct UpdateUserCheckpoint {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user whose checkpoint is refreshed.
    pub user_id: Uuid,
}

/// Command to rebuild every user checkpoint from the event store.
#[derive(Debug, Clone)]
pub struct RebuildUserCheckpoints {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
}

/// Command to refresh the view record of one user.
#[derive(Debug, Clone)]
pub struct UpdateUserView {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user whose view is refreshed; `None` refreshes nothing.
    pub user_id: Option<Uuid>,
}

/// Command to rebuild every user view record from the checkpoints.
#[derive(Debug, Clone)]
pub struct RebuildUserView {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
}

fn require_id(user_id: Uuid) -> Result<(), DomainError> {
    if user_id.is_nil() {
        return Err(DomainError::Validation("user id is required".to_owned()));
    }
    Ok(())
}

/// Returns `true` for a plausible single-address email: one `@`, a non-empty
/// local part, a dotted domain and no whitespace.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

impl Command for CreateUser {
    fn command_type(&self) -> &'static str {
        "user.create"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.email.trim().is_empty() {
            return Err(DomainError::Validation("email is required".to_owned()));
        }
        if !is_valid_email(&self.email) {
            return Err(DomainError::Validation(format!(
                "'{}' is not a valid email address",
                self.email
            )));
        }
        Ok(())
    }
}

impl Command for LoginUser {
    fn command_type(&self) -> &'static str {
        "user.login"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn validate(&self) -> Result<(), DomainError> {
        require_id(self.user_id)
    }
}

impl Command for LogoutUser {
    fn command_type(&self) -> &'static str {
        "user.logout"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn validate(&self) -> Result<(), DomainError> {
        require_id(self.user_id)
    }
}

impl Command for UpdateUserCheckpoint {
    fn command_type(&self) -> &'static str {
        "user.checkpoint.update"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn validate(&self) -> Result<(), DomainError> {
        require_id(self.user_id)
    }
}

impl Command for RebuildUserCheckpoints {
    fn command_type(&self) -> &'static str {
        "user.checkpoint.rebuild"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl Command for UpdateUserView {
    fn command_type(&self) -> &'static str {
        "user.view.update"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl Command for RebuildUserView {
    fn command_type(&self) -> &'static str {
        "user.view.rebuild"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
