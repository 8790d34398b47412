//! Outbox command turning a return into a write-off

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ReturnRecord, WasteRecord};
use crate::types::{deserialize_flag, Collection, Record};

/// Namespace for identifiers derived from return ids
const CASCADE_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a8e_4d3b_4e7a_9c51_0b2f_8d4e_a713);

/// Pending "create a write-off for this return" command.
///
/// Its id equals the return id, so a return can enqueue at most one command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CascadeCommand {
    #[serde(default)]
    pub id: String,
    pub return_id: String,
    #[serde(default)]
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub cause: String,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub processed: bool,
}

impl CascadeCommand {
    /// Build the command for a return whose reason cascades
    pub fn for_return(record: &ReturnRecord) -> Option<Self> {
        let cause = record.reason.cascade_cause()?;
        Some(Self {
            id: record.id.clone(),
            return_id: record.id.clone(),
            product_id: record.product_id.clone(),
            product_name: record.product_name.clone(),
            quantity: record.quantity,
            cause: cause.to_string(),
            attempts: 0,
            last_error: None,
            processed: false,
        })
    }

    /// Deterministic id of the write-off this command creates
    pub fn waste_id(&self) -> String {
        Uuid::new_v5(&CASCADE_NAMESPACE, self.return_id.as_bytes()).to_string()
    }

    pub fn to_waste(&self) -> WasteRecord {
        WasteRecord {
            id: self.waste_id(),
            product_name: self.product_name.clone(),
            quantity: self.quantity,
            cause: self.cause.clone(),
            product_id: Some(self.product_id.clone()).filter(|id| !id.is_empty()),
            source_return_id: Some(self.return_id.clone()),
            processed: false,
        }
    }
}

impl Record for CascadeCommand {
    const COLLECTION: Collection = Collection::Outbox;
    const NAME: &'static str = "cascade command";

    fn id(&self) -> &str {
        &self.id
    }
}
