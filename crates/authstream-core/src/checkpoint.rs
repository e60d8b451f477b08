//! Checkpoint store contract and the generic checkpoint operations.
//!
//! A checkpoint is an [`Aggregate`] serialized at its `at_sequence`. The store
//! is a cache: every operation here can be redone from the event store.

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregate::{Aggregate, AggregateState};
use crate::container::ContainerRepository;
use crate::error::DomainError;
use crate::event::stream_id_for;
use crate::repository::EventRepository;

/// Versioned document store for aggregate checkpoints.
#[async_trait]
pub trait CheckpointRepository<S: AggregateState>: ContainerRepository<Aggregate<S>> {
    /// Event store the checkpoints are derived from.
    fn event_repository(&self) -> &dyn EventRepository;

    /// Writes `item` only if the stored checkpoint's version equals
    /// `expected_version` (`EMPTY_STREAM_VERSION` meaning "no checkpoint yet").
    ///
    /// Returns `Ok(None)` on a version mismatch.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store cannot be written.
    async fn upsert_versioned(
        &self,
        expected_version: i64,
        item: &Aggregate<S>,
    ) -> Result<Option<Aggregate<S>>, DomainError>;

    /// Folds every event committed after `item.at_sequence()` into `item`.
    ///
    /// A no-op for an aggregate that is already current or unidentified.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the stream cannot be read and
    /// `DomainError::UnrecognizedEvent` for an unknown stored payload.
    async fn fast_forward(&self, item: &mut Aggregate<S>) -> Result<(), DomainError> {
        if !item.is_created() {
            return Ok(());
        }
        let tail = self
            .event_repository()
            .load_stream_from(item.stream_id(), item.at_sequence() + 1)
            .await?;
        debug!(
            stream_id = %item.stream_id(),
            from = item.at_sequence() + 1,
            count = tail.events.len(),
            "fast-forwarding aggregate"
        );
        item.fold_stored(&tail.events)
    }

    /// Replays every stream of `S` and overwrites its checkpoint.
    ///
    /// Returns the number of checkpoints written. A stream that fails to
    /// replay or write is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the streams cannot be listed.
    async fn rebuild(&self) -> Result<usize, DomainError> {
        let streams = self
            .event_repository()
            .load_streams_by_type(S::STREAM_TYPE)
            .await?;

        let mut written = 0;
        for (stream_id, stream) in &streams {
            let aggregate = match Aggregate::<S>::from_stream(stream) {
                Ok(aggregate) => aggregate,
                Err(e) => {
                    warn!(%stream_id, error = %e, "skipping stream that cannot be replayed");
                    continue;
                }
            };
            match self.upsert(&aggregate).await {
                Ok(_) => written += 1,
                Err(e) => warn!(%stream_id, error = %e, "failed to write checkpoint"),
            }
        }

        info!(
            stream_type = S::STREAM_TYPE,
            streams = streams.len(),
            written,
            "rebuilt checkpoints"
        );
        Ok(written)
    }
}

/// Loads an aggregate from its checkpoint, falling back to a full replay.
///
/// Returns the aggregate together with the version of the checkpoint it was
/// read from (`EMPTY_STREAM_VERSION` when it came from the event store), or
/// `None` if the aggregate has never been created.
///
/// # Errors
///
/// Propagates store and replay errors.
pub async fn load_aggregate<S: AggregateState>(
    checkpoints: &dyn CheckpointRepository<S>,
    id: Uuid,
) -> Result<Option<(Aggregate<S>, i64)>, DomainError> {
    if let Some(checkpoint) = checkpoints.get_by_id(id).await? {
        if checkpoint.is_created() {
            let version = checkpoint.at_sequence();
            return Ok(Some((checkpoint, version)));
        }
    }

    let stream = checkpoints
        .event_repository()
        .load_stream(&stream_id_for(S::STREAM_TYPE, id))
        .await?;
    if stream.is_empty() {
        return Ok(None);
    }
    let aggregate = Aggregate::<S>::from_stream(&stream)?;
    Ok(Some((aggregate, crate::event::EMPTY_STREAM_VERSION)))
}

/// Brings the checkpoint of one aggregate up to date with its stream.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the stream is empty and
/// `DomainError::ConcurrencyConflict` if another writer moved the checkpoint
/// in between.
pub async fn update_checkpoint<S: AggregateState>(
    checkpoints: &dyn CheckpointRepository<S>,
    id: Uuid,
) -> Result<Aggregate<S>, DomainError> {
    let (mut aggregate, checkpoint_version) = load_aggregate(checkpoints, id)
        .await?
        .ok_or(DomainError::AggregateNotFound(id))?;
    checkpoints.fast_forward(&mut aggregate).await?;

    match checkpoints
        .upsert_versioned(checkpoint_version, &aggregate)
        .await?
    {
        Some(stored) => {
            debug!(%id, at_sequence = stored.at_sequence(), "checkpoint updated");
            Ok(stored)
        }
        None => Err(DomainError::ConcurrencyConflict {
            stream_id: aggregate.stream_id().to_owned(),
            expected: checkpoint_version,
        }),
    }
}
