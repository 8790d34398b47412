//! Stock reconciliation tests
//!
//! - Totals equal the sum of lot quantities
//! - Deleting a lot lowers the total
//! - Reconciling twice gives the same result
//! - Status tier follows the total and minimum stock
//! - Moving a lot to another product reconciles both products

mod common;

use common::{fields, memory_store};
use inventory_alerting_backend::rules::{LotRule, Rule, RuleOutcome};
use inventory_alerting_backend::services::reconciler::sum_quantities;
use inventory_alerting_backend::services::StockReconciler;
use inventory_alerting_backend::store::{self, RecordStore};
use inventory_alerting_backend::AppError;
use proptest::prelude::*;
use serde_json::json;
use shared::{AlertConfig, ChangeEvent, ChangeKind, Collection, InventoryLot, Product, StockStatus};
use tokio_stream::StreamExt as _;

async fn seed_product(store: &dyn RecordStore, id: &str, min_stock: i64) {
    store
        .create_with_id(
            Collection::Products,
            id,
            fields(json!({"name": "Butter", "sku": "BTR-250", "totalStock": 0, "minStock": min_stock})),
        )
        .await
        .unwrap();
}

async fn seed_lot(store: &dyn RecordStore, product_id: &str, quantity: i64) -> String {
    store
        .create(
            Collection::Inventory,
            fields(json!({"productId": product_id, "quantity": quantity})),
        )
        .await
        .unwrap()
}

async fn product(store: &dyn RecordStore, id: &str) -> Product {
    store::fetch(store, id).await.unwrap().unwrap()
}

fn lot(id: &str, quantity: i64) -> InventoryLot {
    InventoryLot {
        id: id.to_string(),
        product_id: "p1".to_string(),
        batch: None,
        quantity,
        expiration_date: None,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

mod unit_tests {
    use super::*;

    #[tokio::test]
    async fn test_total_is_sum_of_lots() {
        let (_, store) = memory_store();
        seed_product(store.as_ref(), "p1", 3).await;
        for quantity in [10, 0, 5] {
            seed_lot(store.as_ref(), "p1", quantity).await;
        }
        // Lots of other products do not count
        seed_lot(store.as_ref(), "p2", 100).await;

        let reconciler = StockReconciler::new(store.clone());
        assert_eq!(reconciler.reconcile("p1").await.unwrap(), 15);

        let stored = product(store.as_ref(), "p1").await;
        assert_eq!(stored.total_stock, 15);
        assert_eq!(stored.status, StockStatus::InStock);
        assert_eq!(stored.name, "Butter");
    }

    #[tokio::test]
    async fn test_delete_lowers_total() {
        let (_, store) = memory_store();
        seed_product(store.as_ref(), "p1", 3).await;
        seed_lot(store.as_ref(), "p1", 10).await;
        seed_lot(store.as_ref(), "p1", 0).await;
        let five = seed_lot(store.as_ref(), "p1", 5).await;

        let reconciler = StockReconciler::new(store.clone());
        assert_eq!(reconciler.reconcile("p1").await.unwrap(), 15);

        store.delete(Collection::Inventory, &five).await.unwrap();
        assert_eq!(reconciler.reconcile("p1").await.unwrap(), 10);
        assert_eq!(product(store.as_ref(), "p1").await.total_stock, 10);
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let (_, store) = memory_store();
        seed_product(store.as_ref(), "p1", 0).await;
        seed_lot(store.as_ref(), "p1", 7).await;

        let reconciler = StockReconciler::new(store.clone());
        let first = reconciler.reconcile("p1").await.unwrap();
        let second = reconciler.reconcile("p1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(product(store.as_ref(), "p1").await.total_stock, 7);
    }

    #[tokio::test]
    async fn test_status_tiers() {
        let (_, store) = memory_store();
        let reconciler = StockReconciler::new(store.clone());

        seed_product(store.as_ref(), "empty", 5).await;
        reconciler.reconcile("empty").await.unwrap();
        assert_eq!(product(store.as_ref(), "empty").await.status, StockStatus::OutOfStock);

        seed_product(store.as_ref(), "low", 5).await;
        seed_lot(store.as_ref(), "low", 5).await;
        reconciler.reconcile("low").await.unwrap();
        assert_eq!(product(store.as_ref(), "low").await.status, StockStatus::LowStock);
    }

    #[tokio::test]
    async fn test_missing_product_is_not_found() {
        let (_, store) = memory_store();
        seed_lot(store.as_ref(), "ghost", 3).await;

        let err = StockReconciler::new(store.clone())
            .reconcile("ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_negative_lot_is_rejected() {
        let (_, store) = memory_store();
        seed_product(store.as_ref(), "p1", 0).await;
        seed_lot(store.as_ref(), "p1", 4).await;
        seed_lot(store.as_ref(), "p1", -2).await;

        let err = StockReconciler::new(store.clone())
            .reconcile("p1")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_DOCUMENT");
        // The cached total is left alone
        assert_eq!(product(store.as_ref(), "p1").await.total_stock, 0);
    }

    #[tokio::test]
    async fn test_lot_rule_reconciles_on_every_kind() {
        let (_, store) = memory_store();
        seed_product(store.as_ref(), "p1", 0).await;
        let rule = LotRule::new(store.clone(), AlertConfig::default());

        let id = seed_lot(store.as_ref(), "p1", 8).await;
        let doc = store.get(Collection::Inventory, &id).await.unwrap().unwrap();
        let created = ChangeEvent::new(Collection::Inventory, ChangeKind::Create, &id, doc.fields.clone());
        assert_eq!(rule.handle(&created).await.unwrap(), RuleOutcome::Fired);
        assert_eq!(product(store.as_ref(), "p1").await.total_stock, 8);

        store.delete(Collection::Inventory, &id).await.unwrap();
        let deleted = ChangeEvent::new(Collection::Inventory, ChangeKind::Delete, &id, doc.fields);
        assert_eq!(rule.handle(&deleted).await.unwrap(), RuleOutcome::Fired);
        assert_eq!(product(store.as_ref(), "p1").await.total_stock, 0);
    }

    #[tokio::test]
    async fn test_moved_lot_reconciles_both_products() {
        let (_, store) = memory_store();
        seed_product(store.as_ref(), "pA", 0).await;
        seed_product(store.as_ref(), "pB", 0).await;
        let rule = LotRule::new(store.clone(), AlertConfig::default());
        let mut stream = store
            .subscribe(Collection::Inventory, &[ChangeKind::Create, ChangeKind::Update])
            .await
            .unwrap();

        let id = seed_lot(store.as_ref(), "pA", 10).await;
        let created = stream.next().await.unwrap().unwrap();
        assert_eq!(rule.handle(&created).await.unwrap(), RuleOutcome::Fired);
        assert_eq!(product(store.as_ref(), "pA").await.total_stock, 10);

        store
            .update(Collection::Inventory, &id, fields(json!({"productId": "pB"})))
            .await
            .unwrap();
        let moved = stream.next().await.unwrap().unwrap();
        assert_eq!(rule.handle(&moved).await.unwrap(), RuleOutcome::Fired);

        let old = product(store.as_ref(), "pA").await;
        assert_eq!(old.total_stock, 0);
        assert_eq!(old.status, StockStatus::OutOfStock);
        assert_eq!(product(store.as_ref(), "pB").await.total_stock, 10);
    }

    #[tokio::test]
    async fn test_update_without_prior_body_reconciles_current_product() {
        let (_, store) = memory_store();
        seed_product(store.as_ref(), "pA", 0).await;
        seed_product(store.as_ref(), "pB", 0).await;
        let rule = LotRule::new(store.clone(), AlertConfig::default());

        let id = seed_lot(store.as_ref(), "pB", 4).await;
        let doc = store.get(Collection::Inventory, &id).await.unwrap().unwrap();
        let event = ChangeEvent::new(Collection::Inventory, ChangeKind::Update, &id, doc.fields);

        assert_eq!(rule.handle(&event).await.unwrap(), RuleOutcome::Fired);
        assert_eq!(product(store.as_ref(), "pB").await.total_stock, 4);
        assert_eq!(product(store.as_ref(), "pA").await.total_stock, 0);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

mod property_tests {
    use super::*;

    proptest! {
        /// The total is the plain sum of non-negative quantities
        #[test]
        fn prop_sum_matches_iterator_sum(quantities in prop::collection::vec(0i64..10_000, 0..50)) {
            let lots: Vec<InventoryLot> = quantities
                .iter()
                .enumerate()
                .map(|(i, q)| lot(&i.to_string(), *q))
                .collect();

            prop_assert_eq!(sum_quantities(&lots).unwrap(), quantities.iter().sum::<i64>());
        }

        /// Any negative quantity fails the whole sum
        #[test]
        fn prop_negative_quantity_rejected(
            quantities in prop::collection::vec(0i64..100, 0..10),
            negative in -1_000i64..0,
        ) {
            let mut lots: Vec<InventoryLot> = quantities
                .iter()
                .enumerate()
                .map(|(i, q)| lot(&i.to_string(), *q))
                .collect();
            lots.push(lot("bad", negative));

            prop_assert!(sum_quantities(&lots).is_err());
        }

        /// Reconciling against the store agrees with the pure sum, and twice is the same as once
        #[test]
        fn prop_reconcile_matches_store(quantities in prop::collection::vec(0i64..1_000, 0..12)) {
            let total = tokio_test::block_on(async {
                let (_, store) = memory_store();
                seed_product(store.as_ref(), "p1", 10).await;
                for quantity in &quantities {
                    seed_lot(store.as_ref(), "p1", *quantity).await;
                }

                let reconciler = StockReconciler::new(store.clone());
                let first = reconciler.reconcile("p1").await.unwrap();
                let second = reconciler.reconcile("p1").await.unwrap();
                assert_eq!(first, second);
                first
            });

            prop_assert_eq!(total, quantities.iter().sum::<i64>());
        }
    }
}
