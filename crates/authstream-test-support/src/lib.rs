//! Shared test doubles and utilities for the Authstream identity service.

mod clock;
mod container;
mod notifier;
mod repository;

pub use clock::{FixedClock, fixed_time};
pub use container::{InMemoryCheckpointRepository, InMemoryContainerRepository};
pub use notifier::RecordingNotifier;
pub use repository::{FailingEventRepository, InMemoryEventRepository};
