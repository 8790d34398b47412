//! Record store adapter
//!
//! Abstracts create/read/update/delete, the conditional flag write used by the
//! idempotency gate, field-filtered queries, and change-feed subscription over
//! named collections of JSON documents.

use std::pin::Pin;

use async_trait::async_trait;
use serde_json::Value;
use shared::{ChangeEvent, ChangeKind, Collection, Document, Fields, Record};
use tokio_stream::Stream;

use crate::error::{AppError, AppResult};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Live change feed for one collection. An `Err` item means the transport failed;
/// the stream ends right after it.
pub type ChangeStream = Pin<Box<dyn Stream<Item = AppResult<ChangeEvent>> + Send>>;

/// Query condition on a top-level document field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the given JSON value
    Eq(String, Value),
    /// Field is missing, null or `false`
    Falsy(String),
}

impl Condition {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Condition::Eq(field.to_string(), value.into())
    }

    pub fn falsy(field: &str) -> Self {
        Condition::Falsy(field.to_string())
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        match self {
            Condition::Eq(field, value) => fields.get(field) == Some(value),
            Condition::Falsy(field) => shared::is_falsy(fields.get(field)),
        }
    }
}

/// Document store with change notifications
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    async fn get(&self, collection: Collection, id: &str) -> AppResult<Option<Document>>;

    /// Create a document with a generated id and return the id
    async fn create(&self, collection: Collection, fields: Fields) -> AppResult<String>;

    /// Insert-if-absent. Returns `false` when the id already exists.
    async fn create_with_id(&self, collection: Collection, id: &str, fields: Fields) -> AppResult<bool>;

    /// Shallow-merge `fields` into an existing document
    async fn update(&self, collection: Collection, id: &str, fields: Fields) -> AppResult<()>;

    async fn delete(&self, collection: Collection, id: &str) -> AppResult<()>;

    /// Atomically set `field` to `true` iff it is currently falsy.
    /// Returns `false` when the flag was already set or the document is absent.
    async fn try_set_flag(&self, collection: Collection, id: &str, field: &str) -> AppResult<bool>;

    /// Documents matching every condition
    async fn query(&self, collection: Collection, conditions: &[Condition]) -> AppResult<Vec<Document>>;

    /// Subscribe to changes of the given kinds on one collection
    async fn subscribe(&self, collection: Collection, kinds: &[ChangeKind]) -> AppResult<ChangeStream>;
}

// ============================================================================
// Typed Helpers
// ============================================================================

/// Fetch and decode one record
pub async fn fetch<T: Record>(store: &dyn RecordStore, id: &str) -> AppResult<Option<T>> {
    match store.get(T::COLLECTION, id).await? {
        Some(doc) => Ok(Some(doc.decode()?)),
        None => Ok(None),
    }
}

/// Fetch and decode every record matching the conditions
pub async fn fetch_all<T: Record>(store: &dyn RecordStore, conditions: &[Condition]) -> AppResult<Vec<T>> {
    store
        .query(T::COLLECTION, conditions)
        .await?
        .iter()
        .map(|doc| doc.decode().map_err(AppError::from))
        .collect()
}

/// Insert a record with a generated id and return the id
pub async fn insert<T: Record>(store: &dyn RecordStore, record: &T) -> AppResult<String> {
    store.create(T::COLLECTION, record.to_fields()?).await
}

/// Insert a record under its own id unless one already exists
pub async fn insert_if_absent<T: Record>(store: &dyn RecordStore, record: &T) -> AppResult<bool> {
    store
        .create_with_id(T::COLLECTION, record.id(), record.to_fields()?)
        .await
}
