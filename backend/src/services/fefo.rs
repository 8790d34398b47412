//! FEFO expiration alerts
//!
//! Evaluates lots against the `config/fefo` thresholds and emits one
//! notification per lot, tier and expiration date. The insert of a
//! `FefoAlertMarker` under a deterministic key decides which caller emits.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{
    evaluate_at, parse_expiration, validate_alert_config, AlertConfig, Collection, FefoAlertMarker,
    FefoTier, InventoryLot, FEFO_CONFIG_ID,
};

use super::notification::{fefo_notification, NotificationService};
use crate::error::{AppError, AppResult};
use crate::store::{self, RecordStore};

/// What a FEFO check did for one lot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FefoOutcome {
    /// Empty lot or no expiration date
    Skipped,
    /// Outside both thresholds
    Clear,
    /// Marker already present; alert was emitted earlier
    AlreadyAlerted(FefoTier),
    Alerted {
        tier: FefoTier,
        notification_id: String,
    },
}

/// Totals of a full lot scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FefoScanSummary {
    pub checked: usize,
    pub alerted: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct FefoService {
    store: Arc<dyn RecordStore>,
    notifications: NotificationService,
    defaults: AlertConfig,
}

impl FefoService {
    pub fn new(store: Arc<dyn RecordStore>, defaults: AlertConfig) -> Self {
        Self {
            notifications: NotificationService::new(store.clone()),
            store,
            defaults,
        }
    }

    /// Current thresholds. Falls back to the configured defaults when the
    /// singleton is missing or invalid.
    pub async fn load_config(&self) -> AppResult<AlertConfig> {
        let Some(config) = store::fetch::<AlertConfig>(self.store.as_ref(), FEFO_CONFIG_ID).await? else {
            return Ok(self.defaults.clone());
        };

        if let Err(reason) = validate_alert_config(&config) {
            tracing::warn!(reason, "Ignoring invalid FEFO configuration, using defaults");
            return Ok(self.defaults.clone());
        }

        Ok(config)
    }

    /// Check one lot against the stored configuration
    pub async fn check_lot(&self, lot: &InventoryLot) -> AppResult<FefoOutcome> {
        let config = self.load_config().await?;
        self.check_lot_at(lot, &config, Utc::now()).await
    }

    /// Check one lot against a given configuration and clock
    pub async fn check_lot_at(
        &self,
        lot: &InventoryLot,
        config: &AlertConfig,
        now: DateTime<Utc>,
    ) -> AppResult<FefoOutcome> {
        let Some(raw_date) = lot.expiration_date.as_deref().filter(|d| !d.trim().is_empty()) else {
            return Ok(FefoOutcome::Skipped);
        };
        if lot.quantity <= 0 {
            return Ok(FefoOutcome::Skipped);
        }

        let expiration = parse_expiration(raw_date).map_err(|_| AppError::MalformedDate {
            lot_id: lot.id.clone(),
            value: raw_date.to_string(),
        })?;

        let assessment = evaluate_at(&lot.product_id, expiration, config, now);
        if !assessment.tier.is_alert() {
            return Ok(FefoOutcome::Clear);
        }

        let marker = FefoAlertMarker {
            id: FefoAlertMarker::key(&lot.id, assessment.tier, raw_date),
            lot_id: lot.id.clone(),
            product_id: lot.product_id.clone(),
            tier: assessment.tier,
            expiration_date: raw_date.trim().to_string(),
            created_at: now,
        };

        if !store::insert_if_absent(self.store.as_ref(), &marker).await? {
            return Ok(FefoOutcome::AlreadyAlerted(assessment.tier));
        }

        let notification = fefo_notification(lot, &assessment, raw_date.trim());
        let notification_id = self.notifications.emit(&notification).await?;

        tracing::info!(
            lot_id = %lot.id,
            product_id = %lot.product_id,
            tier = assessment.tier.as_str(),
            days_remaining = assessment.days_remaining,
            "FEFO alert raised"
        );

        Ok(FefoOutcome::Alerted {
            tier: assessment.tier,
            notification_id,
        })
    }

    /// Check every lot. Failures are logged per lot and do not stop the scan.
    pub async fn scan_all(&self) -> AppResult<FefoScanSummary> {
        let config = self.load_config().await?;
        let docs = self.store.query(Collection::Inventory, &[]).await?;
        let now = Utc::now();

        let mut summary = FefoScanSummary::default();
        for doc in &docs {
            summary.checked += 1;
            // Decoded one at a time so a malformed lot only fails itself
            let lot: InventoryLot = match doc.decode() {
                Ok(lot) => lot,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(lot_id = %doc.id, error = %e, "Skipping malformed lot in FEFO scan");
                    continue;
                }
            };
            match self.check_lot_at(&lot, &config, now).await {
                Ok(FefoOutcome::Alerted { .. }) => summary.alerted += 1,
                Ok(_) => {}
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(lot_id = %lot.id, error = %e, code = e.code(), "FEFO check failed");
                }
            }
        }

        tracing::info!(
            checked = summary.checked,
            alerted = summary.alerted,
            failed = summary.failed,
            "FEFO scan finished"
        );

        Ok(summary)
    }
}
