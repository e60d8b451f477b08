//! Test notifier: records every checkpoint request it is handed.

use std::sync::Mutex;

use authstream_core::error::DomainError;
use authstream_core::notify::{CheckpointRequest, UpdateNotifier};

/// An `UpdateNotifier` that records requests, or rejects them when closed.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<CheckpointRequest>>,
    closed: bool,
}

impl RecordingNotifier {
    /// Creates a notifier whose `send` always fails, as if the queue's
    /// consumer had shut down.
    #[must_use]
    pub fn closed() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            closed: true,
        }
    }

    /// Returns a snapshot of every request sent so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn sent(&self) -> Vec<CheckpointRequest> {
        self.sent.lock().unwrap().clone()
    }
}

impl UpdateNotifier for RecordingNotifier {
    fn send(&self, request: CheckpointRequest) -> Result<(), DomainError> {
        if self.closed {
            return Err(DomainError::Infrastructure("rebuild queue closed".into()));
        }
        self.sent.lock().unwrap().push(request);
        Ok(())
    }
}
