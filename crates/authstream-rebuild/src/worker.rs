//! Sequential rebuild worker.
//!
//! One worker serves one aggregate kind. Each request refreshes the
//! checkpoint store first and, only if that succeeded, the view store.
//! Failures are logged and the loop carries on with the next request.

use std::sync::Arc;

use async_trait::async_trait;
use authstream_core::error::DomainError;
use authstream_core::notify::CheckpointRequest;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::queue::RebuildReceiver;

/// Checkpoint and view refresh routines for one aggregate kind.
#[async_trait]
pub trait RebuildHandler: Send + Sync {
    /// The stream type this handler owns.
    fn stream_type(&self) -> &str;

    /// Replays every stream into the checkpoint store, returning the number
    /// of checkpoints written.
    async fn rebuild_checkpoints(&self) -> Result<usize, DomainError>;

    /// Brings the checkpoint of one aggregate up to date.
    async fn update_checkpoint(&self, id: Uuid) -> Result<(), DomainError>;

    /// Projects every checkpoint into the view store, returning the number
    /// of view records written.
    async fn rebuild_views(&self) -> Result<usize, DomainError>;

    /// Projects the checkpoint of one aggregate into the view store,
    /// returning the number of view records written.
    async fn update_views(&self, id: Uuid) -> Result<usize, DomainError>;
}

#[async_trait]
impl<H: RebuildHandler + ?Sized> RebuildHandler for Arc<H> {
    fn stream_type(&self) -> &str {
        self.as_ref().stream_type()
    }

    async fn rebuild_checkpoints(&self) -> Result<usize, DomainError> {
        self.as_ref().rebuild_checkpoints().await
    }

    async fn update_checkpoint(&self, id: Uuid) -> Result<(), DomainError> {
        self.as_ref().update_checkpoint(id).await
    }

    async fn rebuild_views(&self) -> Result<usize, DomainError> {
        self.as_ref().rebuild_views().await
    }

    async fn update_views(&self, id: Uuid) -> Result<usize, DomainError> {
        self.as_ref().update_views(id).await
    }
}

/// Drains a [`RebuildReceiver`] through a [`RebuildHandler`].
pub struct RebuildWorker<H> {
    handler: H,
    receiver: RebuildReceiver,
}

impl<H: RebuildHandler + 'static> RebuildWorker<H> {
    /// Creates a worker; nothing runs until [`run`](Self::run) or
    /// [`spawn`](Self::spawn).
    #[must_use]
    pub fn new(handler: H, receiver: RebuildReceiver) -> Self {
        Self { handler, receiver }
    }

    /// Handles a single request and returns the number of view records
    /// written. Requests for another stream type are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the checkpoint or view routine.
    #[instrument(skip(self), fields(stream_type = self.handler.stream_type()))]
    pub async fn process(&self, request: &CheckpointRequest) -> Result<usize, DomainError> {
        if request.stream_type() != self.handler.stream_type() {
            warn!(requested = request.stream_type(), "skipping request for foreign stream type");
            return Ok(0);
        }

        match request {
            CheckpointRequest::Rebuild { .. } => {
                let checkpoints = self.handler.rebuild_checkpoints().await?;
                let views = self.handler.rebuild_views().await?;
                info!(checkpoints, views, "rebuild complete");
                Ok(views)
            }
            CheckpointRequest::UpdateById { id, .. } => {
                self.handler.update_checkpoint(*id).await?;
                let views = self.handler.update_views(*id).await?;
                debug!(%id, views, "checkpoint refreshed");
                Ok(views)
            }
        }
    }

    /// Processes requests until `shutdown` carries `true`, its sender is
    /// dropped, or every queue producer is gone.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(stream_type = self.handler.stream_type(), "rebuild worker started");
        while let Some(request) = self.receiver.dequeue(&mut shutdown).await {
            if let Err(e) = self.process(&request).await {
                error!(?request, error = %e, "checkpoint request failed");
            }
        }
        info!(stream_type = self.handler.stream_type(), "rebuild worker stopped");
    }

    /// Runs the worker on the tokio runtime.
    pub fn spawn(self) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        WorkerHandle { shutdown_tx, task }
    }
}

/// Controls a spawned [`RebuildWorker`].
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signals the worker to stop and waits for it. A request already being
    /// processed is finished first.
    ///
    /// # Errors
    ///
    /// Returns the `JoinError` if the worker task panicked.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        // The worker may already have exited; a closed channel is fine.
        let _ = self.shutdown_tx.send(true);
        self.task.await
    }
}
