//! Authstream Event Store: `PostgreSQL` persistence.
//!
//! Implements the event, container and checkpoint repository traits from
//! `authstream-core` on top of `sqlx`. The schema lives in the workspace
//! `migrations/` directory.

pub mod error;
pub mod pg_checkpoint_repository;
pub mod pg_container_repository;
pub mod pg_event_repository;

/// Embedded schema migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");
