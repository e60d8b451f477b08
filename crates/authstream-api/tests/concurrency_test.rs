//! Two sign-ins racing on the same user, followed by the rebuild worker
//! catching the checkpoint and view up.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use authstream_api::rebuild::UserRebuildHandler;
use authstream_core::container::ContainerRepository;
use authstream_core::error::DomainError;
use authstream_core::event::{EMPTY_STREAM_VERSION, EventStream, stream_id_for};
use authstream_core::pipeline::CommandPipeline;
use authstream_core::repository::{EventRepository, StoredEvent};
use authstream_rebuild::queue::{RebuildQueue, rebuild_queue};
use authstream_rebuild::worker::RebuildWorker;
use authstream_test_support::{
    FixedClock, InMemoryCheckpointRepository, InMemoryContainerRepository,
    InMemoryEventRepository,
};
use authstream_user::application::command_handlers::{handle_create_user, handle_login_user};
use authstream_user::domain::aggregates::User;
use authstream_user::domain::commands::{CreateUser, LoginUser};
use authstream_user::domain::events::USER_STREAM_TYPE;
use authstream_user::domain::records::{UserRecord, UserViewRecord};
use chrono::{DateTime, Utc};
use tokio::sync::{Barrier, watch};
use uuid::Uuid;

/// Holds the next `armed` appends at a barrier so that every writer has
/// loaded its state before any of them appends.
struct GatedEvents {
    inner: InMemoryEventRepository,
    barrier: Barrier,
    armed: AtomicUsize,
}

impl GatedEvents {
    fn new(writers: usize) -> Self {
        Self {
            inner: InMemoryEventRepository::new(),
            barrier: Barrier::new(writers),
            armed: AtomicUsize::new(0),
        }
    }

    fn arm(&self, appends: usize) {
        self.armed.store(appends, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventRepository for GatedEvents {
    async fn is_connected(&self) -> bool {
        self.inner.is_connected().await
    }

    async fn append_events(
        &self,
        stream_id: &str,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<bool, DomainError> {
        let gated = self
            .armed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if gated {
            self.barrier.wait().await;
        }
        self.inner
            .append_events(stream_id, expected_version, events)
            .await
    }

    async fn load_stream_from(
        &self,
        stream_id: &str,
        from_sequence_number: i64,
    ) -> Result<EventStream, DomainError> {
        self.inner.load_stream_from(stream_id, from_sequence_number).await
    }

    async fn load_streams_by_type(
        &self,
        stream_type: &str,
    ) -> Result<HashMap<String, EventStream>, DomainError> {
        self.inner.load_streams_by_type(stream_type).await
    }

    async fn load_streams_by_type_since(
        &self,
        stream_type: &str,
        from: DateTime<Utc>,
    ) -> Result<HashMap<String, EventStream>, DomainError> {
        self.inner.load_streams_by_type_since(stream_type, from).await
    }
}

async fn sign_in(
    events: Arc<GatedEvents>,
    checkpoints: Arc<InMemoryCheckpointRepository<User>>,
    queue: RebuildQueue,
    clock: FixedClock,
    user_id: Uuid,
) -> Result<UserRecord, DomainError> {
    let pipeline =
        CommandPipeline::<User>::new(events.as_ref(), checkpoints.as_ref(), &queue, &clock);
    let command = LoginUser {
        correlation_id: Uuid::new_v4(),
        user_id,
        actor: "signin".to_owned(),
    };
    handle_login_user(&command, &pipeline).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_racing_sign_ins_both_land_and_worker_catches_up() {
    // Arrange
    let events = Arc::new(GatedEvents::new(2));
    let checkpoints = Arc::new(InMemoryCheckpointRepository::<User>::new(events.clone()));
    let views = Arc::new(InMemoryContainerRepository::<UserViewRecord>::new("User-view"));
    let (queue, receiver) = rebuild_queue();
    let clock = FixedClock::default();

    let created = {
        let pipeline =
            CommandPipeline::<User>::new(events.as_ref(), checkpoints.as_ref(), &queue, &clock);
        let command = CreateUser {
            correlation_id: Uuid::new_v4(),
            email: "racer@example.com".to_owned(),
            actor: "signin".to_owned(),
        };
        handle_create_user(&command, &pipeline).await.unwrap()
    };
    let stream_id = stream_id_for(USER_STREAM_TYPE, created.id);
    events.arm(2);

    // Act
    let first = tokio::spawn(sign_in(
        events.clone(),
        checkpoints.clone(),
        queue.clone(),
        FixedClock(clock.0 + chrono::Duration::minutes(1)),
        created.id,
    ));
    let second = tokio::spawn(sign_in(
        events.clone(),
        checkpoints.clone(),
        queue.clone(),
        FixedClock(clock.0 + chrono::Duration::minutes(2)),
        created.id,
    ));
    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();

    // Assert: both appends landed, the loser after one fast-forward.
    let mut landed = vec![first.at_sequence, second.at_sequence];
    landed.sort_unstable();
    assert_eq!(landed, vec![1, 2]);

    let sequences: Vec<i64> = events
        .inner
        .stream(&stream_id)
        .iter()
        .map(|e| e.sequence_number)
        .collect();
    assert_eq!(sequences, vec![0, 1, 2]);

    let expected_versions: Vec<i64> = events
        .inner
        .append_attempts()
        .iter()
        .map(|(_, expected, _)| *expected)
        .collect();
    assert_eq!(expected_versions, vec![EMPTY_STREAM_VERSION, 0, 0, 1]);

    // The loser's checkpoint write was rejected, so the command path leaves
    // the checkpoint one event behind.
    let checkpoint = checkpoints.get_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(checkpoint.at_sequence(), 1);

    // Act: drain the update requests through the worker.
    drop(queue);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = RebuildWorker::new(
        UserRebuildHandler::new(checkpoints.clone(), views.clone()),
        receiver,
    );
    tokio::time::timeout(Duration::from_secs(5), worker.run(shutdown_rx))
        .await
        .expect("worker did not drain the queue");

    // Assert
    let checkpoint = checkpoints.get_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(checkpoint.at_sequence(), 2);
    let view = views.get_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(view.at_sequence, 2);
    assert_eq!(view.normalized_email, "RACER@EXAMPLE.COM");
}
