//! Write-off (waste) models

use serde::{Deserialize, Serialize};

use crate::types::{deserialize_flag, Collection, Record};

/// A write-off event, entered manually or created by the return cascade
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WasteRecord {
    #[serde(default)]
    pub id: String,
    pub product_name: String,
    pub quantity: i64,
    pub cause: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    /// Set when the record was synthesized from a return
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_return_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub processed: bool,
}

impl WasteRecord {
    pub fn is_cascaded(&self) -> bool {
        self.source_return_id.is_some()
    }
}

impl Record for WasteRecord {
    const COLLECTION: Collection = Collection::Waste;
    const NAME: &'static str = "waste";

    fn id(&self) -> &str {
        &self.id
    }
}
