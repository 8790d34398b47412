//! Customer and route return models

use serde::{Deserialize, Serialize};

use crate::types::{deserialize_flag, Collection, Record};

/// Why goods came back.
///
/// Two reasons carry write-off semantics; everything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReturnReason {
    /// Product past its expiration date
    Expired,
    /// Container broken or leaking
    DamagedContainer,
    Other(String),
}

impl ReturnReason {
    pub const EXPIRED: &'static str = "expired";
    pub const DAMAGED_CONTAINER: &'static str = "damaged-container";

    /// Parse a stored reason. Case, surrounding whitespace and `_`/space
    /// separators are ignored for the reserved values.
    pub fn parse(raw: &str) -> Self {
        let normalized: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();

        match normalized.as_str() {
            Self::EXPIRED => ReturnReason::Expired,
            Self::DAMAGED_CONTAINER => ReturnReason::DamagedContainer,
            _ => ReturnReason::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ReturnReason::Expired => Self::EXPIRED,
            ReturnReason::DamagedContainer => Self::DAMAGED_CONTAINER,
            ReturnReason::Other(reason) => reason,
        }
    }

    /// Write-off cause produced by this reason, if it cascades
    pub fn cascade_cause(&self) -> Option<&'static str> {
        match self {
            ReturnReason::Expired => Some(Self::EXPIRED),
            ReturnReason::DamagedContainer => Some(Self::DAMAGED_CONTAINER),
            ReturnReason::Other(_) => None,
        }
    }

    pub fn cascades(&self) -> bool {
        self.cascade_cause().is_some()
    }
}

impl From<String> for ReturnReason {
    fn from(value: String) -> Self {
        ReturnReason::parse(&value)
    }
}

impl From<ReturnReason> for String {
    fn from(value: ReturnReason) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for ReturnReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A customer or route return request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub reason: ReturnReason,
    #[serde(default)]
    pub requested_by: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub processed: bool,
}

impl Record for ReturnRecord {
    const COLLECTION: Collection = Collection::Returns;
    const NAME: &'static str = "return";

    fn id(&self) -> &str {
        &self.id
    }
}
