//! Common types used across the engine: collections, documents and change events

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::ModelError;

/// Document body: a flat JSON object keyed by camelCase field names
pub type Fields = Map<String, Value>;

/// Field used by the idempotency gate on every triggering document
pub const PROCESSED_FIELD: &str = "processed";

/// Named collections the engine reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Counts,
    Waste,
    Returns,
    Notifications,
    Products,
    Inventory,
    Config,
    Outbox,
    FefoAlerts,
}

impl Collection {
    pub const ALL: [Collection; 9] = [
        Collection::Counts,
        Collection::Waste,
        Collection::Returns,
        Collection::Notifications,
        Collection::Products,
        Collection::Inventory,
        Collection::Config,
        Collection::Outbox,
        Collection::FefoAlerts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Counts => "counts",
            Collection::Waste => "waste",
            Collection::Returns => "returns",
            Collection::Notifications => "notifications",
            Collection::Products => "products",
            Collection::Inventory => "inventory",
            Collection::Config => "config",
            Collection::Outbox => "outbox",
            Collection::FefoAlerts => "fefo_alerts",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of mutation reported by a change feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Create => "create",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

/// A stored document: its identifier and body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Decode the document into a typed record
    pub fn decode<T: Record>(&self) -> Result<T, ModelError> {
        decode_fields(&self.id, &self.fields)
    }
}

/// A change notification: `(kind, id, fields)` on one collection.
///
/// For deletes, `fields` carries the last stored body. Updates also carry the
/// body as it was before the write in `previous`, when the store knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub kind: ChangeKind,
    pub id: String,
    #[serde(default)]
    pub fields: Fields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Fields>,
}

impl ChangeEvent {
    pub fn new(collection: Collection, kind: ChangeKind, id: impl Into<String>, fields: Fields) -> Self {
        Self {
            collection,
            kind,
            id: id.into(),
            fields,
            previous: None,
        }
    }

    pub fn with_previous(mut self, previous: Fields) -> Self {
        self.previous = Some(previous);
        self
    }

    /// Synthesize a create event for a document found by a backlog scan
    pub fn backlog(collection: Collection, doc: Document) -> Self {
        Self::new(collection, ChangeKind::Create, doc.id, doc.fields)
    }

    pub fn decode<T: Record>(&self) -> Result<T, ModelError> {
        decode_fields(&self.id, &self.fields)
    }
}

/// A typed document stored in a fixed collection
pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: Collection;
    const NAME: &'static str;

    fn id(&self) -> &str;

    /// Serialize into a document body. The identifier is not part of the body.
    fn to_fields(&self) -> Result<Fields, ModelError> {
        match serde_json::to_value(self)? {
            Value::Object(mut map) => {
                map.remove("id");
                Ok(map)
            }
            _ => Err(ModelError::NotAnObject),
        }
    }
}

fn decode_fields<T: Record>(id: &str, fields: &Fields) -> Result<T, ModelError> {
    let mut body = fields.clone();
    body.insert("id".to_string(), Value::String(id.to_string()));
    serde_json::from_value(Value::Object(body)).map_err(|source| ModelError::Decode {
        record: T::NAME,
        id: id.to_string(),
        source,
    })
}

/// A flag is falsy when missing, null or `false`
pub fn is_falsy(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null) | Some(Value::Bool(false)))
}

/// Deserialize a boolean flag that may be stored as null
pub fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}
