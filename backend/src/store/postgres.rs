//! PostgreSQL record store
//!
//! Documents live in one `documents` table keyed by `(collection, id)` with a
//! JSONB body. A row trigger publishes every change on the `document_changes`
//! channel; subscriptions consume it through `PgListener`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use shared::{ChangeEvent, ChangeKind, Collection, Document, Fields};
use sqlx::postgres::{PgListener, PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use super::{ChangeStream, Condition, RecordStore};
use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};

/// NOTIFY channel written by the `documents_change_feed` trigger
pub const CHANGE_CHANNEL: &str = "document_changes";

const SUBSCRIBER_BUFFER: usize = 256;

/// Postgres-backed document store
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create the connection pool
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let db = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.url)
            .await?;

        Ok(Self::new(db))
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }

    /// Turn a raw NOTIFY payload into a change event for this subscription,
    /// re-reading the body of created and updated documents. The pre-update
    /// body comes from the payload as-is.
    async fn resolve(
        &self,
        payload: &str,
        collection: Collection,
        kinds: &[ChangeKind],
    ) -> AppResult<Option<ChangeEvent>> {
        let mut event: ChangeEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, payload, "Ignoring malformed change notification");
                return Ok(None);
            }
        };

        if event.collection != collection || !kinds.contains(&event.kind) {
            return Ok(None);
        }

        if event.kind != ChangeKind::Delete {
            match self.get(collection, &event.id).await? {
                Some(doc) => event.fields = doc.fields,
                // Deleted before we could read it
                None => return Ok(None),
            }
        }

        Ok(Some(event))
    }
}

fn into_fields(collection: Collection, id: &str, body: Value) -> AppResult<Fields> {
    match body {
        Value::Object(fields) => Ok(fields),
        _ => Err(AppError::invalid_document(collection, id, "body is not a JSON object")),
    }
}

/// SQL fragment testing that a body field is missing, null or false
const FALSY_TEST: &str = ", 'null'::jsonb) IN ('null'::jsonb, 'false'::jsonb)";

#[async_trait]
impl RecordStore for PgStore {
    async fn get(&self, collection: Collection, id: &str) -> AppResult<Option<Document>> {
        let body = sqlx::query_scalar::<_, Value>(
            "SELECT body FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        body.map(|body| into_fields(collection, id, body).map(|fields| Document::new(id, fields)))
            .transpose()
    }

    async fn create(&self, collection: Collection, fields: Fields) -> AppResult<String> {
        let id = Uuid::new_v4().to_string();

        sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection.as_str())
            .bind(&id)
            .bind(Value::Object(fields))
            .execute(&self.db)
            .await?;

        Ok(id)
    }

    async fn create_with_id(&self, collection: Collection, id: &str, fields: Fields) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO NOTHING
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(Value::Object(fields))
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update(&self, collection: Collection, id: &str, fields: Fields) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET body = body || $3, updated_at = NOW()
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(Value::Object(fields))
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("{}/{}", collection, id)));
        }

        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("{}/{}", collection, id)));
        }

        Ok(())
    }

    async fn try_set_flag(&self, collection: Collection, id: &str, field: &str) -> AppResult<bool> {
        // The row lock taken by UPDATE makes a concurrent second caller
        // re-check the predicate against the committed row and match nothing.
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET body = jsonb_set(body, ARRAY[$3::text], 'true'::jsonb, true),
                updated_at = NOW()
            WHERE collection = $1
              AND id = $2
              AND COALESCE(body -> $3::text, 'null'::jsonb) IN ('null'::jsonb, 'false'::jsonb)
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(field)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn query(&self, collection: Collection, conditions: &[Condition]) -> AppResult<Vec<Document>> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT id, body FROM documents WHERE collection = ");
        builder.push_bind(collection.as_str());

        for condition in conditions {
            match condition {
                Condition::Eq(field, value) => {
                    builder.push(" AND body -> (");
                    builder.push_bind(field.clone());
                    builder.push("::text) = (");
                    builder.push_bind(value.clone());
                    builder.push("::jsonb)");
                }
                Condition::Falsy(field) => {
                    builder.push(" AND COALESCE(body -> (");
                    builder.push_bind(field.clone());
                    builder.push("::text)");
                    builder.push(FALSY_TEST);
                }
            }
        }
        builder.push(" ORDER BY created_at, id");

        let rows = builder
            .build_query_as::<(String, Value)>()
            .fetch_all(&self.db)
            .await?;

        rows.into_iter()
            .map(|(id, body)| into_fields(collection, &id, body).map(|fields| Document::new(id, fields)))
            .collect()
    }

    async fn subscribe(&self, collection: Collection, kinds: &[ChangeKind]) -> AppResult<ChangeStream> {
        let mut listener = PgListener::connect_with(&self.db).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        let store = self.clone();
        let kinds = kinds.to_vec();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);

        tokio::spawn(async move {
            loop {
                let notification = tokio::select! {
                    _ = tx.closed() => break,
                    notification = listener.try_recv() => notification,
                };

                let item = match notification {
                    Ok(Some(notification)) => {
                        match store.resolve(notification.payload(), collection, &kinds).await {
                            Ok(Some(event)) => Ok(event),
                            Ok(None) => continue,
                            Err(e) => Err(e),
                        }
                    }
                    // Notifications sent while disconnected are lost
                    Ok(None) => Err(AppError::Subscription(format!(
                        "listener for {} lost its connection",
                        collection
                    ))),
                    Err(e) => Err(AppError::from(e)),
                };

                let failed = item.is_err();
                if tx.send(item).await.is_err() || failed {
                    break;
                }
            }

            tracing::debug!(collection = %collection, "Change listener stopped");
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
