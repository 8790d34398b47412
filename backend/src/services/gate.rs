//! Idempotency gate over the per-document `processed` flag

use std::sync::Arc;

use shared::{Collection, PROCESSED_FIELD};

use crate::error::AppResult;
use crate::store::RecordStore;

/// Guarantees a rule fires at most once per document.
///
/// The check and the write are one conditional update on the source document,
/// so two concurrent deliveries of the same event can never both acquire.
#[derive(Clone)]
pub struct IdempotencyGate {
    store: Arc<dyn RecordStore>,
}

impl IdempotencyGate {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Mark the document processed. Returns `false` when it already was, or
    /// when the document no longer exists.
    pub async fn try_acquire(&self, collection: Collection, id: &str) -> AppResult<bool> {
        let acquired = self.store.try_set_flag(collection, id, PROCESSED_FIELD).await?;

        if !acquired {
            tracing::debug!(collection = %collection, id, "Gate already closed");
        }

        Ok(acquired)
    }
}
