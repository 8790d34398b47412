//! Stock reconciliation
//!
//! `Product.totalStock` is a cache of the sum of the product's lot quantities.
//! Reconciling recomputes it from scratch, so running it twice is harmless.

use std::sync::Arc;

use serde_json::Value;
use shared::{classify_stock, Collection, Fields, InventoryLot, Product};

use crate::error::{AppError, AppResult};
use crate::store::{self, Condition, RecordStore};

#[derive(Clone)]
pub struct StockReconciler {
    store: Arc<dyn RecordStore>,
}

impl StockReconciler {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Recompute and store the total stock of a product, returning the new total
    pub async fn reconcile(&self, product_id: &str) -> AppResult<i64> {
        let product: Product = store::fetch(self.store.as_ref(), product_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))?;

        let lots: Vec<InventoryLot> = store::fetch_all(
            self.store.as_ref(),
            &[Condition::eq("productId", product_id)],
        )
        .await?;

        let total = sum_quantities(&lots)?;
        let status = classify_stock(total, product.min_stock);

        let mut fields = Fields::new();
        fields.insert("totalStock".to_string(), Value::from(total));
        fields.insert("status".to_string(), Value::from(status.as_str()));
        self.store.update(Collection::Products, product_id, fields).await?;

        tracing::debug!(
            product_id,
            lots = lots.len(),
            previous = product.total_stock,
            total,
            status = status.as_str(),
            "Stock reconciled"
        );

        Ok(total)
    }
}

/// Sum lot quantities, rejecting negative ones
pub fn sum_quantities(lots: &[InventoryLot]) -> AppResult<i64> {
    lots.iter().try_fold(0i64, |total, lot| {
        if lot.quantity < 0 {
            return Err(AppError::invalid_document(
                Collection::Inventory,
                &lot.id,
                format!("negative quantity {}", lot.quantity),
            ));
        }
        total
            .checked_add(lot.quantity)
            .ok_or_else(|| AppError::Internal(format!("stock total overflow at lot {}", lot.id)))
    })
}
