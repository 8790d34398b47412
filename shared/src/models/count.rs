//! Physical inventory count models

use serde::{Deserialize, Serialize};

use crate::types::{deserialize_flag, Collection, Record};

/// A physical-inventory tally produced by the counting workflow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CountRecord {
    #[serde(default)]
    pub id: String,
    /// Quantity the system expected to find
    pub expected: i64,
    /// Quantity physically counted
    pub counted: i64,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub processed: bool,
}

impl CountRecord {
    pub fn has_discrepancy(&self) -> bool {
        self.expected != self.counted
    }

    /// Counted minus expected; negative means stock is missing
    pub fn difference(&self) -> i64 {
        self.counted - self.expected
    }
}

impl Record for CountRecord {
    const COLLECTION: Collection = Collection::Counts;
    const NAME: &'static str = "count";

    fn id(&self) -> &str {
        &self.id
    }
}
