//! Notification service
//!
//! Supports:
//! - Emitting notification records derived by the rules
//! - Listing and counting unread notifications
//! - Marking notifications as read (the only mutation a notification allows)

use std::sync::Arc;

use serde_json::{json, Value};
use shared::{
    AlertConfig, Collection, CountRecord, FefoAssessment, Fields, InventoryLot, NotificationRecord,
    NotificationType, ReturnRecord, WasteRecord,
};

use crate::error::{AppError, AppResult};
use crate::store::{self, Condition, RecordStore};

/// Notification service for writing and reading notification records
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn RecordStore>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Persist a notification and return its id
    pub async fn emit(&self, notification: &NotificationRecord) -> AppResult<String> {
        let id = store::insert(self.store.as_ref(), notification).await?;

        tracing::info!(
            id = %id,
            notification_type = notification.notification_type.as_str(),
            related_id = notification.related_id.as_deref().unwrap_or(""),
            "Notification emitted"
        );

        Ok(id)
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Newest notifications first
    pub async fn list(&self, unread_only: bool, limit: usize) -> AppResult<Vec<NotificationRecord>> {
        let conditions = if unread_only {
            vec![Condition::falsy("read")]
        } else {
            Vec::new()
        };

        let mut notifications: Vec<NotificationRecord> =
            store::fetch_all(self.store.as_ref(), &conditions).await?;
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notifications.truncate(limit);

        Ok(notifications)
    }

    /// Notifications pointing at a given source document
    pub async fn for_related(&self, related_id: &str) -> AppResult<Vec<NotificationRecord>> {
        store::fetch_all(self.store.as_ref(), &[Condition::eq("relatedId", related_id)]).await
    }

    pub async fn unread_count(&self) -> AppResult<usize> {
        Ok(self
            .store
            .query(Collection::Notifications, &[Condition::falsy("read")])
            .await?
            .len())
    }

    // ========================================================================
    // Read State
    // ========================================================================

    /// Mark notification as read
    pub async fn mark_as_read(&self, notification_id: &str) -> AppResult<()> {
        if self
            .store
            .get(Collection::Notifications, notification_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound("Notification".to_string()));
        }

        self.store
            .update(Collection::Notifications, notification_id, read_flag())
            .await
    }

    /// Mark all notifications as read and return how many changed
    pub async fn mark_all_as_read(&self) -> AppResult<usize> {
        let unread = self
            .store
            .query(Collection::Notifications, &[Condition::falsy("read")])
            .await?;

        for doc in &unread {
            self.store
                .update(Collection::Notifications, &doc.id, read_flag())
                .await?;
        }

        Ok(unread.len())
    }
}

fn read_flag() -> Fields {
    let mut fields = Fields::new();
    fields.insert("read".to_string(), Value::Bool(true));
    fields
}

// ============================================================================
// Notification Builders
// ============================================================================

/// Create a discrepancy notification for a physical count
pub fn discrepancy_notification(count: &CountRecord) -> NotificationRecord {
    NotificationRecord::new(
        NotificationType::Discrepancy,
        "Inventory discrepancy detected",
        format!(
            "The physical count does not match the system count. Expected: {}, Counted: {}, Difference: {:+}",
            count.expected,
            count.counted,
            count.difference()
        ),
        json!({
            "expected": count.expected,
            "counted": count.counted,
            "difference": count.difference(),
        }),
        Some(count.id.clone()),
    )
}

/// Create a write-off notification
pub fn write_off_notification(waste: &WasteRecord) -> NotificationRecord {
    NotificationRecord::new(
        NotificationType::WriteOff,
        format!("Write-off: {}", waste.product_name),
        format!(
            "{} units of '{}' were written off. Cause: {}",
            waste.quantity, waste.product_name, waste.cause
        ),
        json!({
            "productName": waste.product_name,
            "productId": waste.product_id,
            "quantity": waste.quantity,
            "cause": waste.cause,
            "sourceReturnId": waste.source_return_id,
        }),
        Some(waste.id.clone()),
    )
}

/// Create a return notification
pub fn return_notification(record: &ReturnRecord) -> NotificationRecord {
    NotificationRecord::new(
        NotificationType::Return,
        format!("Return: {}", record.product_name),
        format!(
            "{} units of '{}' were returned. Reason: {}",
            record.quantity, record.product_name, record.reason
        ),
        json!({
            "productId": record.product_id,
            "productName": record.product_name,
            "quantity": record.quantity,
            "reason": record.reason.as_str(),
            "requestedBy": record.requested_by,
            "writeOff": record.reason.cascades(),
        }),
        Some(record.id.clone()),
    )
}

/// Create an expiration-risk notification for a lot
pub fn fefo_notification(
    lot: &InventoryLot,
    assessment: &FefoAssessment,
    expiration_date: &str,
) -> NotificationRecord {
    let when = if assessment.days_remaining < 0 {
        format!("expired {} days ago", -assessment.days_remaining)
    } else {
        format!("expires in {} days", assessment.days_remaining)
    };

    NotificationRecord::new(
        NotificationType::Fefo,
        format!("FEFO {}: lot {}", assessment.tier, lot.batch_label()),
        format!(
            "Lot '{}' of product {} {} ({}). Quantity on hand: {}",
            lot.batch_label(),
            lot.product_id,
            when,
            expiration_date,
            lot.quantity
        ),
        json!({
            "productId": lot.product_id,
            "lotId": lot.id,
            "batch": lot.batch_label(),
            "quantity": lot.quantity,
            "tier": assessment.tier.as_str(),
            "daysRemaining": assessment.days_remaining,
            "criticalThreshold": assessment.critical_threshold,
            "warningThreshold": assessment.warning_threshold,
            "expirationDate": expiration_date,
        }),
        Some(lot.id.clone()),
    )
}

/// Create a notification announcing new FEFO thresholds
pub fn config_notification(config: &AlertConfig) -> NotificationRecord {
    NotificationRecord::new(
        NotificationType::Config,
        "FEFO thresholds updated",
        format!(
            "Critical at {} days, warning at {} days, {} product exception(s)",
            config.critical_days,
            config.warning_days,
            config.exceptions.len()
        ),
        json!({
            "criticalDays": config.critical_days,
            "warningDays": config.warning_days,
            "exceptions": config.exceptions,
        }),
        Some(config.id.clone()),
    )
}
