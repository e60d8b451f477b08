//! Command pipeline.
//!
//! Every state-changing command runs the same skeleton: load the aggregate
//! (checkpoint first, stream replay second), apply one payload to a copy,
//! append under the expected version, and on a conflict fast-forward and try
//! again a bounded number of times. Committed changes are written to the
//! checkpoint store on a best-effort basis and announced to the notifier.

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::aggregate::{Aggregate, AggregateState};
use crate::checkpoint::{CheckpointRepository, load_aggregate};
use crate::clock::Clock;
use crate::error::DomainError;
use crate::event::EMPTY_STREAM_VERSION;
use crate::notify::{CheckpointRequest, UpdateNotifier};
use crate::repository::EventRepository;

/// Number of fast-forward-and-retry rounds after a first failed append.
pub const DEFAULT_RETRY_LIMIT: u32 = 1;

/// Load / apply / append / retry / notify skeleton for aggregate kind `S`.
pub struct CommandPipeline<'a, S: AggregateState> {
    events: &'a dyn EventRepository,
    checkpoints: &'a dyn CheckpointRepository<S>,
    notifier: &'a dyn UpdateNotifier,
    clock: &'a dyn Clock,
    retry_limit: u32,
}

impl<'a, S: AggregateState> CommandPipeline<'a, S> {
    /// Creates a pipeline with the default retry bound.
    #[must_use]
    pub fn new(
        events: &'a dyn EventRepository,
        checkpoints: &'a dyn CheckpointRepository<S>,
        notifier: &'a dyn UpdateNotifier,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            events,
            checkpoints,
            notifier,
            clock,
            retry_limit: DEFAULT_RETRY_LIMIT,
        }
    }

    /// Overrides the number of fast-forward-and-retry rounds.
    #[must_use]
    pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit;
        self
    }

    /// Clock used to stamp new events.
    #[must_use]
    pub fn clock(&self) -> &'a dyn Clock {
        self.clock
    }

    /// Loads the current state of aggregate `id`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` if neither a checkpoint nor
    /// any event exists for `id`.
    pub async fn load(&self, id: Uuid) -> Result<Aggregate<S>, DomainError> {
        load_aggregate(self.checkpoints, id)
            .await?
            .map(|(aggregate, _)| aggregate)
            .ok_or(DomainError::AggregateNotFound(id))
    }

    /// Creates a new aggregate from its creation payload.
    ///
    /// The append expects an empty stream; a collision is not retried.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if `payload` is not a
    /// creation payload, `DomainError::ConcurrencyConflict` if the stream
    /// already exists, and store errors as they occur.
    #[instrument(skip(self, payload), fields(stream_type = S::STREAM_TYPE))]
    pub async fn create(
        &self,
        payload: S::Payload,
        created_by: &str,
    ) -> Result<Aggregate<S>, DomainError> {
        let mut aggregate = Aggregate::<S>::new();
        aggregate.apply(payload, created_by, self.clock)?;

        let new_events = aggregate.stored_events_from(0)?;
        if !self
            .events
            .append_events(aggregate.stream_id(), EMPTY_STREAM_VERSION, &new_events)
            .await?
        {
            warn!(stream_id = %aggregate.stream_id(), "stream already exists");
            return Err(DomainError::ConcurrencyConflict {
                stream_id: aggregate.stream_id().to_owned(),
                expected: EMPTY_STREAM_VERSION,
            });
        }

        info!(stream_id = %aggregate.stream_id(), "aggregate created");
        self.commit(EMPTY_STREAM_VERSION, &aggregate).await;
        Ok(aggregate)
    }

    /// Applies the payload produced by `transition` to aggregate `id`.
    ///
    /// `transition` sees the aggregate state it is applied to and is invoked
    /// again after every fast-forward, so the intended change is re-derived
    /// from the refreshed state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` without appending anything if
    /// `id` does not exist, `DomainError::ConcurrencyConflict` once the retry
    /// bound is spent, and whatever `transition` or the stores return.
    #[instrument(skip(self, transition), fields(stream_type = S::STREAM_TYPE))]
    pub async fn execute<F>(
        &self,
        id: Uuid,
        created_by: &str,
        transition: F,
    ) -> Result<Aggregate<S>, DomainError>
    where
        F: Fn(&Aggregate<S>) -> Result<S::Payload, DomainError> + Send + Sync,
    {
        let (mut current, checkpoint_version) = load_aggregate(self.checkpoints, id)
            .await?
            .ok_or(DomainError::AggregateNotFound(id))?;

        let mut retries = 0;
        loop {
            let expected_version = current.at_sequence();
            let mut next = current.clone();
            next.apply(transition(&current)?, created_by, self.clock)?;

            let new_events = next.stored_events_from(expected_version + 1)?;
            if self
                .events
                .append_events(next.stream_id(), expected_version, &new_events)
                .await?
            {
                info!(
                    stream_id = %next.stream_id(),
                    at_sequence = next.at_sequence(),
                    retries,
                    "events appended"
                );
                self.commit(checkpoint_version, &next).await;
                return Ok(next);
            }

            if retries >= self.retry_limit {
                warn!(
                    stream_id = %next.stream_id(),
                    expected_version,
                    retries,
                    "append conflict persisted after fast-forward"
                );
                return Err(DomainError::ConcurrencyConflict {
                    stream_id: next.stream_id().to_owned(),
                    expected: expected_version,
                });
            }

            retries += 1;
            warn!(
                stream_id = %current.stream_id(),
                expected_version,
                "append conflict, fast-forwarding"
            );
            self.checkpoints.fast_forward(&mut current).await?;
        }
    }

    /// Best-effort checkpoint write followed by the update notification.
    async fn commit(&self, checkpoint_version: i64, aggregate: &Aggregate<S>) {
        match self
            .checkpoints
            .upsert_versioned(checkpoint_version, aggregate)
            .await
        {
            Ok(Some(_)) => debug!(id = %aggregate.id(), "checkpoint written"),
            Ok(None) => debug!(
                id = %aggregate.id(),
                checkpoint_version,
                "checkpoint moved on, leaving it to the update path"
            ),
            Err(e) => warn!(id = %aggregate.id(), error = %e, "failed to write checkpoint"),
        }

        let request = CheckpointRequest::UpdateById {
            stream_type: S::STREAM_TYPE.to_owned(),
            id: aggregate.id(),
        };
        if let Err(e) = self.notifier.send(request) {
            warn!(id = %aggregate.id(), error = %e, "failed to send checkpoint update");
        }
    }
}
