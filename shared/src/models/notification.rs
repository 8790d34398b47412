//! Notification models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{deserialize_flag, Collection, Record};

/// Notification type enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Discrepancy,
    WriteOff,
    Return,
    Fefo,
    Config,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Discrepancy => "discrepancy",
            NotificationType::WriteOff => "write_off",
            NotificationType::Return => "return",
            NotificationType::Fefo => "fefo",
            NotificationType::Config => "config",
        }
    }
}

/// A derived alert. Only `read` is ever changed after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub description: String,
    /// Event-specific structured data
    #[serde(default)]
    pub payload: Value,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub read: bool,
    pub created_at: DateTime<Utc>,
    /// Back-reference to the triggering document
    #[serde(default)]
    pub related_id: Option<String>,
}

impl NotificationRecord {
    pub fn new(
        notification_type: NotificationType,
        title: impl Into<String>,
        description: impl Into<String>,
        payload: Value,
        related_id: Option<String>,
    ) -> Self {
        Self {
            id: String::new(),
            notification_type,
            title: title.into(),
            description: description.into(),
            payload,
            read: false,
            created_at: Utc::now(),
            related_id,
        }
    }
}

impl Record for NotificationRecord {
    const COLLECTION: Collection = Collection::Notifications;
    const NAME: &'static str = "notification";

    fn id(&self) -> &str {
        &self.id
    }
}
