//! Shared application state.

use std::sync::Arc;

use authstream_core::checkpoint::CheckpointRepository;
use authstream_core::clock::Clock;
use authstream_core::container::ContainerRepository;
use authstream_core::notify::UpdateNotifier;
use authstream_core::pipeline::{CommandPipeline, DEFAULT_RETRY_LIMIT};
use authstream_core::repository::EventRepository;
use authstream_user::domain::aggregates::User;
use authstream_user::domain::records::UserViewRecord;

use crate::directory::DirectoryAuthenticator;
use crate::token::JwtTokenProvider;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Source of event and token timestamps.
    pub clock: Arc<dyn Clock>,
    /// Event store.
    pub event_repository: Arc<dyn EventRepository>,
    /// User checkpoint store.
    pub user_checkpoints: Arc<dyn CheckpointRepository<User>>,
    /// User view store.
    pub user_views: Arc<dyn ContainerRepository<UserViewRecord>>,
    /// Rebuild queue producer.
    pub notifier: Arc<dyn UpdateNotifier>,
    /// Bearer token issuer.
    pub tokens: Arc<JwtTokenProvider>,
    /// Directory consulted before privileged sign-in.
    pub directory: Arc<dyn DirectoryAuthenticator>,
    /// Fast-forward-and-retry rounds for user commands.
    pub retry_limit: u32,
}

impl AppState {
    /// Create new application state with the default retry bound.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        event_repository: Arc<dyn EventRepository>,
        user_checkpoints: Arc<dyn CheckpointRepository<User>>,
        user_views: Arc<dyn ContainerRepository<UserViewRecord>>,
        notifier: Arc<dyn UpdateNotifier>,
        tokens: Arc<JwtTokenProvider>,
        directory: Arc<dyn DirectoryAuthenticator>,
    ) -> Self {
        Self {
            clock,
            event_repository,
            user_checkpoints,
            user_views,
            notifier,
            tokens,
            directory,
            retry_limit: DEFAULT_RETRY_LIMIT,
        }
    }

    /// Overrides the retry bound used by [`AppState::user_pipeline`].
    #[must_use]
    pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit;
        self
    }

    /// Returns a command pipeline for user commands.
    #[must_use]
    pub fn user_pipeline(&self) -> CommandPipeline<'_, User> {
        CommandPipeline::<User>::new(
            self.event_repository.as_ref(),
            self.user_checkpoints.as_ref(),
            self.notifier.as_ref(),
            self.clock.as_ref(),
        )
        .with_retry_limit(self.retry_limit)
    }
}
