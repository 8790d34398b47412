//! FEFO alerting tests
//!
//! - Threshold boundaries through the service at a fixed clock
//! - Per-product exceptions override only the critical threshold
//! - Alerts fire once per lot, tier and expiration date
//! - Malformed dates fail only their own lot
//! - Lots that do not decode are counted as failed by the scan

mod common;

use chrono::{DateTime, TimeZone, Utc};
use common::{fields, memory_store};
use inventory_alerting_backend::services::{FefoOutcome, FefoService};
use inventory_alerting_backend::store::{self, RecordStore};
use inventory_alerting_backend::AppError;
use proptest::prelude::*;
use serde_json::json;
use shared::{AlertConfig, Collection, FefoTier, InventoryLot, NotificationRecord, NotificationType};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

fn lot(id: &str, product_id: &str, expiration: &str) -> InventoryLot {
    InventoryLot {
        id: id.to_string(),
        product_id: product_id.to_string(),
        batch: Some(format!("B-{}", id)),
        quantity: 10,
        expiration_date: Some(expiration.to_string()),
    }
}

async fn notifications(store: &dyn RecordStore) -> Vec<NotificationRecord> {
    store::fetch_all(store, &[]).await.unwrap()
}

// ============================================================================
// Unit Tests
// ============================================================================

mod unit_tests {
    use super::*;

    async fn tier_for(expiration: &str, config: &AlertConfig) -> FefoOutcome {
        let (_, store) = memory_store();
        let service = FefoService::new(store, AlertConfig::default());
        service
            .check_lot_at(&lot("l1", "p1", expiration), config, now())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_threshold_boundaries() {
        let config = AlertConfig::new(7, 30);

        assert!(matches!(
            tier_for("2025-01-08", &config).await,
            FefoOutcome::Alerted { tier: FefoTier::Critical, .. }
        ));
        assert!(matches!(
            tier_for("2025-01-09", &config).await,
            FefoOutcome::Alerted { tier: FefoTier::Warning, .. }
        ));
        assert_eq!(tier_for("2025-02-01", &config).await, FefoOutcome::Clear);
        assert!(matches!(
            tier_for("2024-12-29", &config).await,
            FefoOutcome::Alerted { tier: FefoTier::Critical, .. }
        ));
    }

    #[tokio::test]
    async fn test_exception_overrides_critical_only() {
        let config = AlertConfig::new(7, 30).with_exception("p1", 3);

        // 5 days: Critical globally, Warning for the exempted product
        assert!(matches!(
            tier_for("2025-01-06", &config).await,
            FefoOutcome::Alerted { tier: FefoTier::Warning, .. }
        ));
    }

    #[tokio::test]
    async fn test_alert_fires_once_per_tier() {
        let (_, store) = memory_store();
        let service = FefoService::new(store.clone(), AlertConfig::default());
        let config = AlertConfig::new(7, 30);
        let lot = lot("l1", "p1", "2025-01-20");

        let first = service.check_lot_at(&lot, &config, now()).await.unwrap();
        let second = service.check_lot_at(&lot, &config, now()).await.unwrap();

        assert!(matches!(first, FefoOutcome::Alerted { tier: FefoTier::Warning, .. }));
        assert_eq!(second, FefoOutcome::AlreadyAlerted(FefoTier::Warning));

        let sent = notifications(store.as_ref()).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].notification_type, NotificationType::Fefo);
        assert_eq!(sent[0].payload["lotId"], json!("l1"));
        assert_eq!(sent[0].payload["tier"], json!("warning"));
        assert_eq!(sent[0].payload["daysRemaining"], json!(19));
        assert_eq!(sent[0].related_id.as_deref(), Some("l1"));
    }

    #[tokio::test]
    async fn test_escalation_and_new_date_rearm() {
        let (_, store) = memory_store();
        let service = FefoService::new(store.clone(), AlertConfig::default());
        let config = AlertConfig::new(7, 30);
        let lot = lot("l1", "p1", "2025-01-20");

        service.check_lot_at(&lot, &config, now()).await.unwrap();

        // Two weeks later the same lot turns critical
        let later = now() + chrono::Duration::days(14);
        let escalated = service.check_lot_at(&lot, &config, later).await.unwrap();
        assert!(matches!(escalated, FefoOutcome::Alerted { tier: FefoTier::Critical, .. }));

        // A corrected expiration date is a different alert
        let relabeled = InventoryLot {
            expiration_date: Some("2025-01-22".to_string()),
            ..lot
        };
        let rearmed = service.check_lot_at(&relabeled, &config, later).await.unwrap();
        assert!(matches!(rearmed, FefoOutcome::Alerted { tier: FefoTier::Critical, .. }));

        assert_eq!(notifications(store.as_ref()).await.len(), 3);
    }

    #[tokio::test]
    async fn test_lots_without_stock_or_date_are_skipped() {
        let (_, store) = memory_store();
        let service = FefoService::new(store.clone(), AlertConfig::default());
        let config = AlertConfig::default();

        let empty = InventoryLot {
            quantity: 0,
            ..lot("l1", "p1", "2024-12-01")
        };
        let undated = InventoryLot {
            expiration_date: None,
            ..lot("l2", "p1", "")
        };

        assert_eq!(service.check_lot_at(&empty, &config, now()).await.unwrap(), FefoOutcome::Skipped);
        assert_eq!(service.check_lot_at(&undated, &config, now()).await.unwrap(), FefoOutcome::Skipped);
        assert!(notifications(store.as_ref()).await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_date() {
        let (_, store) = memory_store();
        let service = FefoService::new(store, AlertConfig::default());

        let err = service
            .check_lot_at(&lot("l1", "p1", "next tuesday"), &AlertConfig::default(), now())
            .await
            .unwrap_err();

        match err {
            AppError::MalformedDate { lot_id, value } => {
                assert_eq!(lot_id, "l1");
                assert_eq!(value, "next tuesday");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_load_config_falls_back_to_defaults() {
        let (_, store) = memory_store();
        let defaults = AlertConfig::new(10, 40);
        let service = FefoService::new(store.clone(), defaults.clone());

        assert_eq!(service.load_config().await.unwrap(), defaults);

        // Invalid thresholds are ignored
        store
            .create_with_id(Collection::Config, "fefo", fields(json!({"criticalDays": -1, "warningDays": 5})))
            .await
            .unwrap();
        assert_eq!(service.load_config().await.unwrap(), defaults);

        store
            .update(Collection::Config, "fefo", fields(json!({"criticalDays": 2, "warningDays": 5})))
            .await
            .unwrap();
        let loaded = service.load_config().await.unwrap();
        assert_eq!(loaded.critical_days, 2);
        assert_eq!(loaded.warning_days, 5);
    }

    #[tokio::test]
    async fn test_scan_continues_past_bad_lots() {
        let (_, store) = memory_store();
        let service = FefoService::new(store.clone(), AlertConfig::new(7, 30));

        let expired = (Utc::now() - chrono::Duration::days(2)).format("%Y-%m-%d").to_string();
        let distant = (Utc::now() + chrono::Duration::days(365)).format("%Y-%m-%d").to_string();

        for (id, date) in [("a", expired.as_str()), ("b", "not-a-date"), ("c", distant.as_str())] {
            store
                .create_with_id(
                    Collection::Inventory,
                    id,
                    fields(json!({"productId": "p1", "quantity": 3, "expirationDate": date})),
                )
                .await
                .unwrap();
        }

        let summary = service.scan_all().await.unwrap();
        assert_eq!(summary.checked, 3);
        assert_eq!(summary.alerted, 1);
        assert_eq!(summary.failed, 1);

        // A second scan finds the marker
        let again = service.scan_all().await.unwrap();
        assert_eq!(again.alerted, 0);
        assert_eq!(notifications(store.as_ref()).await.len(), 1);
    }

    #[tokio::test]
    async fn test_scan_counts_undecodable_lot_as_failed() {
        let (_, store) = memory_store();
        let service = FefoService::new(store.clone(), AlertConfig::new(7, 30));
        let expired = (Utc::now() - chrono::Duration::days(2)).format("%Y-%m-%d").to_string();

        store
            .create_with_id(
                Collection::Inventory,
                "bad",
                fields(json!({"productId": "p1", "quantity": "ten", "expirationDate": expired})),
            )
            .await
            .unwrap();
        store
            .create_with_id(
                Collection::Inventory,
                "good",
                fields(json!({"productId": "p1", "quantity": 5, "expirationDate": expired})),
            )
            .await
            .unwrap();

        let summary = service.scan_all().await.unwrap();
        assert_eq!(summary.checked, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.alerted, 1);

        let sent = notifications(store.as_ref()).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].related_id.as_deref(), Some("good"));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

mod property_tests {
    use super::*;

    proptest! {
        /// However often a lot is checked at one instant, at most one alert is sent
        #[test]
        fn prop_alert_at_most_once(days in -30i64..60, checks in 1usize..5) {
            let expiration = (now() + chrono::Duration::days(days)).format("%Y-%m-%d").to_string();

            let sent = tokio_test::block_on(async {
                let (_, store) = memory_store();
                let service = FefoService::new(store.clone(), AlertConfig::default());
                let lot = lot("l1", "p1", &expiration);
                for _ in 0..checks {
                    service.check_lot_at(&lot, &AlertConfig::new(7, 30), now()).await.unwrap();
                }
                notifications(store.as_ref()).await.len()
            });

            let expected = if days <= 30 { 1 } else { 0 };
            prop_assert_eq!(sent, expected);
        }
    }
}
