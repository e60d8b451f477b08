//! Checkpoint update notifications.
//!
//! Command handlers announce committed changes through an [`UpdateNotifier`];
//! the rebuild worker consumes the resulting [`CheckpointRequest`]s.

use uuid::Uuid;

use crate::error::DomainError;

/// Instruction to refresh checkpoints and views for one aggregate kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointRequest {
    /// Rebuild every checkpoint and view of the kind from the event store.
    Rebuild {
        /// Aggregate kind.
        stream_type: String,
    },
    /// Refresh the checkpoint and view of a single aggregate.
    UpdateById {
        /// Aggregate kind.
        stream_type: String,
        /// Aggregate id.
        id: Uuid,
    },
}

impl CheckpointRequest {
    /// Returns the aggregate kind the request targets.
    #[must_use]
    pub fn stream_type(&self) -> &str {
        match self {
            Self::Rebuild { stream_type } | Self::UpdateById { stream_type, .. } => stream_type,
        }
    }
}

/// Fire-and-forget sender for [`CheckpointRequest`]s.
pub trait UpdateNotifier: Send + Sync {
    /// Hands the request off without waiting for it to be processed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the request could not be
    /// handed off (e.g. the consumer has shut down).
    fn send(&self, request: CheckpointRequest) -> Result<(), DomainError>;
}
