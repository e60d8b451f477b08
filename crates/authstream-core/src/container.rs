//! Document container abstraction.
//!
//! Checkpoints and view records are both JSON documents kept in named
//! containers, keyed by the owning aggregate's id.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::DomainError;

/// A value that can live in a [`ContainerRepository`].
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Key of the document within its container.
    fn document_id(&self) -> Uuid;

    /// Version stored alongside the document; unversioned documents use 0.
    fn document_version(&self) -> i64 {
        0
    }
}

/// Container holding the checkpoints of one aggregate kind.
#[must_use]
pub fn checkpoint_container(stream_type: &str) -> String {
    format!("{stream_type}-checkpoint")
}

/// Container holding the view records of one aggregate kind.
#[must_use]
pub fn view_container(stream_type: &str) -> String {
    format!("{stream_type}-view")
}

/// Exact-match predicate on one top-level document field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    /// Serialized (camelCase) field name.
    pub field: String,
    /// Expected value, compared as text.
    pub value: String,
}

impl FieldFilter {
    /// Builds a `field == value` predicate.
    #[must_use]
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Returns `true` if `document` satisfies the predicate.
    ///
    /// Strings compare by content; other scalars by their JSON text, which is
    /// how a JSON `->>` text extraction renders them.
    #[must_use]
    pub fn matches(&self, document: &serde_json::Value) -> bool {
        match document.get(&self.field) {
            Some(serde_json::Value::String(s)) => *s == self.value,
            Some(serde_json::Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

/// Returns `true` if `document` satisfies every filter.
#[must_use]
pub fn matches_all(document: &serde_json::Value, filters: &[FieldFilter]) -> bool {
    filters.iter().all(|f| f.matches(document))
}

/// Generic keyed document store.
#[async_trait]
pub trait ContainerRepository<T: Document>: Send + Sync {
    /// Name of the container this repository reads and writes.
    fn container(&self) -> &str;

    /// Liveness probe for the backing store.
    async fn is_connected(&self) -> bool;

    /// Inserts or replaces the document unconditionally.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store cannot be written.
    async fn upsert(&self, item: &T) -> Result<T, DomainError>;

    /// Returns every document in the container.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store cannot be read.
    async fn get_all(&self) -> Result<Vec<T>, DomainError>;

    /// Returns the document keyed by `id`, if any.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store cannot be read.
    async fn get_by_id(&self, id: Uuid) -> Result<Option<T>, DomainError>;

    /// Returns every document matching all `filters`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store cannot be read.
    async fn query(&self, filters: &[FieldFilter]) -> Result<Vec<T>, DomainError>;
}
