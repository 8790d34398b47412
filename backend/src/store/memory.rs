//! In-process record store with a broadcast change feed
//!
//! Used by the test-suite and for local runs without a database. Writes are
//! serialized by one lock, so `try_set_flag` is a true compare-and-swap.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use shared::{ChangeEvent, ChangeKind, Collection, Document, Fields};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use super::{ChangeStream, Condition, RecordStore};
use crate::error::{AppError, AppResult};

const CHANGE_FEED_CAPACITY: usize = 1024;
const SUBSCRIBER_BUFFER: usize = 256;

#[derive(Debug, Clone)]
enum FeedMessage {
    Change(ChangeEvent),
    /// Simulated transport drop
    Interrupt(String),
}

/// In-memory document store
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    collections: RwLock<HashMap<Collection, BTreeMap<String, Fields>>>,
    feed: broadcast::Sender<FeedMessage>,
    /// Remaining injected write failures per collection
    faults: Mutex<HashMap<Collection, u32>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(CHANGE_FEED_CAPACITY)
    }

    /// Create a store whose change feed buffers `capacity` events per subscriber
    pub fn with_capacity(capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(Inner {
                collections: RwLock::new(HashMap::new()),
                feed,
                faults: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Make the next `count` writes (create, create_with_id, update) to a
    /// collection fail with a storage error
    pub async fn fail_next_writes(&self, collection: Collection, count: u32) {
        self.inner.faults.lock().await.insert(collection, count);
    }

    /// End every open subscription with a transport error
    pub fn interrupt_subscriptions(&self, reason: &str) {
        let _ = self.inner.feed.send(FeedMessage::Interrupt(reason.to_string()));
    }

    /// Number of documents in a collection
    pub async fn len(&self, collection: Collection) -> usize {
        self.inner
            .collections
            .read()
            .await
            .get(&collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    async fn take_fault(&self, collection: Collection) -> AppResult<()> {
        let mut faults = self.inner.faults.lock().await;
        match faults.get_mut(&collection) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(AppError::StorageError(format!(
                    "injected write failure on {}",
                    collection
                )))
            }
            _ => Ok(()),
        }
    }

    fn publish(&self, collection: Collection, kind: ChangeKind, id: &str, fields: Fields) {
        self.send(ChangeEvent::new(collection, kind, id, fields));
    }

    fn publish_update(&self, collection: Collection, id: &str, fields: Fields, previous: Fields) {
        let event = ChangeEvent::new(collection, ChangeKind::Update, id, fields);
        self.send(event.with_previous(previous));
    }

    fn send(&self, event: ChangeEvent) {
        // No subscribers is not an error
        let _ = self.inner.feed.send(FeedMessage::Change(event));
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, collection: Collection, id: &str) -> AppResult<Option<Document>> {
        let collections = self.inner.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn create(&self, collection: Collection, fields: Fields) -> AppResult<String> {
        self.take_fault(collection).await?;
        let id = Uuid::new_v4().to_string();
        {
            let mut collections = self.inner.collections.write().await;
            collections
                .entry(collection)
                .or_default()
                .insert(id.clone(), fields.clone());
        }
        self.publish(collection, ChangeKind::Create, &id, fields);
        Ok(id)
    }

    async fn create_with_id(&self, collection: Collection, id: &str, fields: Fields) -> AppResult<bool> {
        self.take_fault(collection).await?;
        {
            let mut collections = self.inner.collections.write().await;
            let docs = collections.entry(collection).or_default();
            if docs.contains_key(id) {
                return Ok(false);
            }
            docs.insert(id.to_string(), fields.clone());
        }
        self.publish(collection, ChangeKind::Create, id, fields);
        Ok(true)
    }

    async fn update(&self, collection: Collection, id: &str, fields: Fields) -> AppResult<()> {
        self.take_fault(collection).await?;
        let (merged, previous) = {
            let mut collections = self.inner.collections.write().await;
            let doc = collections
                .get_mut(&collection)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| AppError::NotFound(format!("{}/{}", collection, id)))?;
            let previous = doc.clone();
            doc.extend(fields);
            (doc.clone(), previous)
        };
        self.publish_update(collection, id, merged, previous);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> AppResult<()> {
        let removed = {
            let mut collections = self.inner.collections.write().await;
            collections
                .get_mut(&collection)
                .and_then(|docs| docs.remove(id))
                .ok_or_else(|| AppError::NotFound(format!("{}/{}", collection, id)))?
        };
        self.publish(collection, ChangeKind::Delete, id, removed);
        Ok(())
    }

    async fn try_set_flag(&self, collection: Collection, id: &str, field: &str) -> AppResult<bool> {
        let (updated, previous) = {
            let mut collections = self.inner.collections.write().await;
            let Some(doc) = collections.get_mut(&collection).and_then(|docs| docs.get_mut(id)) else {
                return Ok(false);
            };
            if !shared::is_falsy(doc.get(field)) {
                return Ok(false);
            }
            let previous = doc.clone();
            doc.insert(field.to_string(), Value::Bool(true));
            (doc.clone(), previous)
        };
        self.publish_update(collection, id, updated, previous);
        Ok(true)
    }

    async fn query(&self, collection: Collection, conditions: &[Condition]) -> AppResult<Vec<Document>> {
        let collections = self.inner.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, fields)| conditions.iter().all(|c| c.matches(fields)))
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn subscribe(&self, collection: Collection, kinds: &[ChangeKind]) -> AppResult<ChangeStream> {
        let mut feed = self.inner.feed.subscribe();
        let kinds = kinds.to_vec();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);

        tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    _ = tx.closed() => break,
                    message = feed.recv() => message,
                };

                let item = match message {
                    Ok(FeedMessage::Change(event)) => {
                        if event.collection != collection || !kinds.contains(&event.kind) {
                            continue;
                        }
                        Ok(event)
                    }
                    Ok(FeedMessage::Interrupt(reason)) => Err(AppError::Subscription(reason)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => Err(AppError::Subscription(
                        format!("change feed lagged, {} events dropped", skipped),
                    )),
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                let failed = item.is_err();
                if tx.send(item).await.is_err() || failed {
                    break;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
