//! Unbounded FIFO queue of checkpoint requests.
//!
//! Producers never wait on the consumer. The consumer's [`dequeue`](RebuildReceiver::dequeue)
//! gives up as soon as the shutdown signal fires.

use authstream_core::error::DomainError;
use authstream_core::notify::{CheckpointRequest, UpdateNotifier};
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Creates a connected queue/receiver pair.
#[must_use]
pub fn rebuild_queue() -> (RebuildQueue, RebuildReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (RebuildQueue { sender }, RebuildReceiver { receiver })
}

/// Producer side of the rebuild queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RebuildQueue {
    sender: mpsc::UnboundedSender<CheckpointRequest>,
}

impl RebuildQueue {
    /// Adds a request to the back of the queue.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the receiver has been dropped.
    pub fn enqueue(&self, request: CheckpointRequest) -> Result<(), DomainError> {
        debug!(?request, "enqueueing checkpoint request");
        self.sender
            .send(request)
            .map_err(|_| DomainError::Infrastructure("rebuild queue closed".to_owned()))
    }

    /// Returns `true` once the receiver has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl UpdateNotifier for RebuildQueue {
    fn send(&self, request: CheckpointRequest) -> Result<(), DomainError> {
        self.enqueue(request)
    }
}

/// Consumer side of the rebuild queue.
#[derive(Debug)]
pub struct RebuildReceiver {
    receiver: mpsc::UnboundedReceiver<CheckpointRequest>,
}

impl RebuildReceiver {
    /// Waits for the next request.
    ///
    /// Returns `None` when `shutdown` is signalled (or its sender dropped)
    /// or when every producer is gone. A pending shutdown wins over queued
    /// requests.
    pub async fn dequeue(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<CheckpointRequest> {
        loop {
            if *shutdown.borrow_and_update() {
                return None;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
                request = self.receiver.recv() => return request,
            }
        }
    }
}
