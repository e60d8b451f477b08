//! `PostgreSQL` implementation of the `EventRepository` trait.
//!
//! Appends run in one transaction that takes a per-stream advisory lock,
//! reads the current stream version, compares it with the expected version
//! and inserts. The `(stream_id, sequence_number)` unique constraint backs the
//! check up: a violation is reported as a conflict, not an error.

use std::collections::HashMap;

use async_trait::async_trait;
use authstream_core::error::DomainError;
use authstream_core::event::{EMPTY_STREAM_VERSION, EventStream};
use authstream_core::repository::{EventRepository, StoredEvent};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{is_unique_violation, map_sqlx_error};

const SELECT_EVENTS: &str = r"
SELECT event_id, stream_id, stream_type, sequence_number, payload_type, payload,
       created_by, created_utc
FROM events";

#[derive(sqlx::FromRow)]
struct EventRow {
    event_id: Uuid,
    stream_id: String,
    stream_type: String,
    sequence_number: i64,
    payload_type: String,
    payload: serde_json::Value,
    created_by: String,
    created_utc: DateTime<Utc>,
}

impl From<EventRow> for StoredEvent {
    fn from(row: EventRow) -> Self {
        Self {
            event_id: row.event_id,
            stream_id: row.stream_id,
            stream_type: row.stream_type,
            sequence_number: row.sequence_number,
            payload_type: row.payload_type,
            payload: row.payload,
            created_by: row.created_by,
            created_utc: row.created_utc,
        }
    }
}

fn group_by_stream(rows: Vec<EventRow>) -> HashMap<String, EventStream> {
    let mut streams: HashMap<String, EventStream> = HashMap::new();
    for row in rows {
        let event = StoredEvent::from(row);
        streams
            .entry(event.stream_id.clone())
            .or_insert_with(|| EventStream::empty(event.stream_id.clone()))
            .events
            .push(event);
    }
    streams
}

/// PostgreSQL-backed event repository.
#[derive(Debug, Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    /// Creates a new `PgEventRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn is_connected(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    #[instrument(skip(self, events), fields(event_count = events.len()))]
    async fn append_events(
        &self,
        stream_id: &str,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<bool, DomainError> {
        if let Some(stray) = events.iter().find(|e| e.stream_id != stream_id) {
            return Err(DomainError::Validation(format!(
                "event for stream '{}' in append to '{stream_id}'",
                stray.stream_id
            )));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(stream_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("stream_lock", e))?;

        let current_version: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(sequence_number), $2) FROM events WHERE stream_id = $1",
        )
        .bind(stream_id)
        .bind(EMPTY_STREAM_VERSION)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("stream_version", e))?;

        if current_version != expected_version {
            debug!(current_version, "expected version mismatch");
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Ok(false);
        }

        for (offset, event) in (1_i64..).zip(events) {
            if event.sequence_number != current_version + offset {
                return Err(DomainError::InvalidTransition(format!(
                    "append to '{stream_id}' at version {current_version} carries sequence {}",
                    event.sequence_number
                )));
            }

            let inserted = sqlx::query(
                r"
                INSERT INTO events (
                    event_id, stream_id, stream_type, sequence_number, payload_type,
                    payload, created_by, created_utc
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ",
            )
            .bind(event.event_id)
            .bind(&event.stream_id)
            .bind(&event.stream_type)
            .bind(event.sequence_number)
            .bind(&event.payload_type)
            .bind(&event.payload)
            .bind(&event.created_by)
            .bind(event.created_utc)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    warn!(sequence_number = event.sequence_number, "concurrent append detected");
                    return Ok(false);
                }
                Err(e) => return Err(map_sqlx_error("insert_event", e)),
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn load_stream_from(
        &self,
        stream_id: &str,
        from_sequence_number: i64,
    ) -> Result<EventStream, DomainError> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "{SELECT_EVENTS} WHERE stream_id = $1 AND sequence_number >= $2 ORDER BY sequence_number"
        ))
        .bind(stream_id)
        .bind(from_sequence_number)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_stream", e))?;

        Ok(EventStream::new(
            stream_id,
            rows.into_iter().map(StoredEvent::from).collect(),
        ))
    }

    #[instrument(skip(self))]
    async fn load_streams_by_type(
        &self,
        stream_type: &str,
    ) -> Result<HashMap<String, EventStream>, DomainError> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "{SELECT_EVENTS} WHERE stream_type = $1 ORDER BY stream_id, sequence_number"
        ))
        .bind(stream_type)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_streams_by_type", e))?;

        Ok(group_by_stream(rows))
    }

    #[instrument(skip(self))]
    async fn load_streams_by_type_since(
        &self,
        stream_type: &str,
        from: DateTime<Utc>,
    ) -> Result<HashMap<String, EventStream>, DomainError> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "{SELECT_EVENTS} WHERE stream_type = $1 AND created_utc >= $2 \
             ORDER BY stream_id, sequence_number"
        ))
        .bind(stream_type)
        .bind(from)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_streams_by_type_since", e))?;

        Ok(group_by_stream(rows))
    }
}
