//! Helpers shared by the integration tests

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use inventory_alerting_backend::store::{MemoryStore, RecordStore};
use inventory_alerting_backend::Config;
use serde_json::Value;
use shared::{ChangeEvent, ChangeKind, Collection, Fields};

/// Configuration with short retry delays and no periodic FEFO scan
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.watcher.retry_initial_ms = 10;
    config.watcher.retry_max_ms = 50;
    config.fefo.scan_interval_secs = 0;
    config.cascade.max_attempts = 5;
    config.cascade.retry_initial_ms = 1;
    config
}

pub fn memory_store() -> (MemoryStore, Arc<dyn RecordStore>) {
    let store = MemoryStore::new();
    let shared: Arc<dyn RecordStore> = Arc::new(store.clone());
    (store, shared)
}

/// Turn a `json!` object into a document body
pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

/// Read a stored document back as a create event
pub async fn created_event(store: &dyn RecordStore, collection: Collection, id: &str) -> ChangeEvent {
    let doc = store
        .get(collection, id)
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("{}/{} not found", collection, id));
    ChangeEvent::new(collection, ChangeKind::Create, doc.id, doc.fields)
}

/// Poll `check` until it holds or two seconds pass
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
