//! External directory check gating privileged sign-in.

use async_trait::async_trait;
use tracing::debug;

/// Result of a directory credential check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryOutcome {
    /// Credentials accepted.
    Success,
    /// Credentials rejected.
    Failed,
    /// The account lacks the required permission.
    PermissionError,
    /// The directory rejected the request shape.
    InvalidRequest,
    /// This service is not a registered directory client.
    UnauthorizedClient,
    /// The account type cannot sign in here.
    UnknownUserType,
    /// The directory did not recognise the account.
    NotRecognized,
}

impl DirectoryOutcome {
    /// Returns a stable snake-case label for logs and error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::PermissionError => "permission_error",
            Self::InvalidRequest => "invalid_request",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnknownUserType => "unknown_user_type",
            Self::NotRecognized => "not_recognized",
        }
    }
}

/// Checks an email/secret pair against an external directory.
#[async_trait]
pub trait DirectoryAuthenticator: Send + Sync {
    /// Returns the directory's verdict; never errors.
    async fn check(&self, email: &str, secret: &str) -> DirectoryOutcome;
}

/// Directory used when none is configured: recognises nobody.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledDirectory;

#[async_trait]
impl DirectoryAuthenticator for DisabledDirectory {
    async fn check(&self, _email: &str, _secret: &str) -> DirectoryOutcome {
        debug!("directory disabled, rejecting privileged sign-in");
        DirectoryOutcome::NotRecognized
    }
}
