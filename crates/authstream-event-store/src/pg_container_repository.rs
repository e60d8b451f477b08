//! `PostgreSQL` implementation of the `ContainerRepository` trait.
//!
//! All containers share the `documents` table; a repository instance only
//! ever touches rows of its own container.

use std::fmt::Write as _;
use std::marker::PhantomData;

use async_trait::async_trait;
use authstream_core::container::{ContainerRepository, Document, FieldFilter};
use authstream_core::error::DomainError;
use authstream_core::event::EMPTY_STREAM_VERSION;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::map_sqlx_error;

fn decode<T: Document>(value: serde_json::Value) -> Result<T, DomainError> {
    serde_json::from_value(value)
        .map_err(|e| DomainError::Infrastructure(format!("document decoding failed: {e}")))
}

fn encode<T: Document>(item: &T) -> Result<serde_json::Value, DomainError> {
    serde_json::to_value(item)
        .map_err(|e| DomainError::Infrastructure(format!("document encoding failed: {e}")))
}

/// PostgreSQL-backed document container.
#[derive(Debug)]
pub struct PgContainerRepository<T> {
    pool: PgPool,
    container: String,
    _document: PhantomData<fn() -> T>,
}

impl<T> Clone for PgContainerRepository<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            container: self.container.clone(),
            _document: PhantomData,
        }
    }
}

impl<T: Document> PgContainerRepository<T> {
    /// Creates a repository over the container called `container`.
    #[must_use]
    pub fn new(pool: PgPool, container: impl Into<String>) -> Self {
        Self {
            pool,
            container: container.into(),
            _document: PhantomData,
        }
    }

    /// Writes `item` only if the stored document's version equals
    /// `expected_version`, where `EMPTY_STREAM_VERSION` means "absent".
    ///
    /// Returns `Ok(None)` on a version mismatch.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on database or encoding failure.
    #[instrument(skip(self, item), fields(container = %self.container, id = %item.document_id()))]
    pub async fn upsert_versioned(
        &self,
        expected_version: i64,
        item: &T,
    ) -> Result<Option<T>, DomainError> {
        let document = encode(item)?;

        let result = if expected_version == EMPTY_STREAM_VERSION {
            sqlx::query_scalar::<_, serde_json::Value>(
                r"
                INSERT INTO documents (container, id, version, document, updated_utc)
                VALUES ($1, $2, $3, $4, NOW())
                ON CONFLICT (container, id) DO NOTHING
                RETURNING document
                ",
            )
            .bind(&self.container)
            .bind(item.document_id())
            .bind(item.document_version())
            .bind(&document)
            .fetch_optional(&self.pool)
            .await
        } else {
            sqlx::query_scalar::<_, serde_json::Value>(
                r"
                UPDATE documents
                SET version = $3, document = $4, updated_utc = NOW()
                WHERE container = $1 AND id = $2 AND version = $5
                RETURNING document
                ",
            )
            .bind(&self.container)
            .bind(item.document_id())
            .bind(item.document_version())
            .bind(&document)
            .bind(expected_version)
            .fetch_optional(&self.pool)
            .await
        };
        let stored = result.map_err(|e| map_sqlx_error("upsert_versioned", e))?;

        if stored.is_none() {
            debug!(expected_version, "document version moved on");
        }
        stored.map(decode).transpose()
    }
}

#[async_trait]
impl<T: Document> ContainerRepository<T> for PgContainerRepository<T> {
    fn container(&self) -> &str {
        &self.container
    }

    async fn is_connected(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    #[instrument(skip(self, item), fields(container = %self.container, id = %item.document_id()))]
    async fn upsert(&self, item: &T) -> Result<T, DomainError> {
        let document = encode(item)?;

        let stored: serde_json::Value = sqlx::query_scalar(
            r"
            INSERT INTO documents (container, id, version, document, updated_utc)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (container, id) DO UPDATE
            SET version = EXCLUDED.version, document = EXCLUDED.document, updated_utc = NOW()
            RETURNING document
            ",
        )
        .bind(&self.container)
        .bind(item.document_id())
        .bind(item.document_version())
        .bind(&document)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert", e))?;

        decode(stored)
    }

    async fn get_all(&self) -> Result<Vec<T>, DomainError> {
        let rows: Vec<serde_json::Value> =
            sqlx::query_scalar("SELECT document FROM documents WHERE container = $1 ORDER BY id")
                .bind(&self.container)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_all", e))?;

        rows.into_iter().map(decode).collect()
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<T>, DomainError> {
        let row: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT document FROM documents WHERE container = $1 AND id = $2")
                .bind(&self.container)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_by_id", e))?;

        row.map(decode).transpose()
    }

    #[instrument(skip(self), fields(container = %self.container))]
    async fn query(&self, filters: &[FieldFilter]) -> Result<Vec<T>, DomainError> {
        let mut sql = String::from("SELECT document FROM documents WHERE container = $1");
        for n in 0..filters.len() {
            let field = 2 + 2 * n;
            let _ = write!(sql, " AND document ->> ${field} = ${}", field + 1);
        }
        sql.push_str(" ORDER BY id");

        let mut query = sqlx::query_scalar::<_, serde_json::Value>(&sql).bind(&self.container);
        for filter in filters {
            query = query.bind(&filter.field).bind(&filter.value);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("query", e))?;

        rows.into_iter().map(decode).collect()
    }
}
