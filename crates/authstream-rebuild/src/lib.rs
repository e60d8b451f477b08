//! Authstream Rebuild: keeps checkpoints and views in step with the event
//! log.
//!
//! Command handlers hand [`CheckpointRequest`](authstream_core::notify::CheckpointRequest)s
//! to a [`RebuildQueue`](queue::RebuildQueue); a single
//! [`RebuildWorker`](worker::RebuildWorker) per aggregate kind drains the
//! queue in order and refreshes the checkpoint store and then the view store.

pub mod queue;
pub mod worker;
