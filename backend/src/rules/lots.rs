//! Lot rule: keep product totals in sync and check expiration risk

use std::sync::Arc;

use async_trait::async_trait;
use shared::{validate_lot, AlertConfig, ChangeEvent, ChangeKind, Collection, InventoryLot};

use super::{Rule, RuleOutcome};
use crate::error::{AppError, AppResult};
use crate::services::{FefoOutcome, FefoService, StockReconciler};
use crate::store::RecordStore;

pub struct LotRule {
    reconciler: StockReconciler,
    fefo: FefoService,
}

impl LotRule {
    pub fn new(store: Arc<dyn RecordStore>, fefo_defaults: AlertConfig) -> Self {
        Self {
            reconciler: StockReconciler::new(store.clone()),
            fefo: FefoService::new(store, fefo_defaults),
        }
    }
}

#[async_trait]
impl Rule for LotRule {
    fn name(&self) -> &'static str {
        "lot"
    }

    fn collection(&self) -> Collection {
        Collection::Inventory
    }

    fn kinds(&self) -> &'static [ChangeKind] {
        &[ChangeKind::Create, ChangeKind::Update, ChangeKind::Delete]
    }

    async fn handle(&self, event: &ChangeEvent) -> AppResult<RuleOutcome> {
        let lot: InventoryLot = event.decode()?;

        if let Err(reason) = validate_lot(&lot) {
            tracing::warn!(id = %lot.id, reason, "Invalid inventory lot");
        }

        let total = self.reconciler.reconcile(&lot.product_id).await;

        // A lot moved to another product leaves the old total short
        let moved_from = previous_product(event).filter(|old| *old != lot.product_id);
        let old_total = match moved_from {
            Some(old) => {
                tracing::info!(id = %lot.id, from = %old, to = %lot.product_id, "Lot changed product");
                match self.reconciler.reconcile(&old).await {
                    Ok(_) => Ok(()),
                    // Nothing left to correct
                    Err(AppError::NotFound(_)) => Ok(()),
                    Err(e) => Err(e),
                }
            }
            None => Ok(()),
        };

        if event.kind != ChangeKind::Delete {
            match self.fefo.check_lot(&lot).await {
                Ok(FefoOutcome::Alerted { tier, .. }) => {
                    tracing::debug!(id = %lot.id, tier = tier.as_str(), "Lot raised a FEFO alert");
                }
                Ok(_) => {}
                // A bad date only affects this lot's alerting
                Err(e) => tracing::warn!(id = %lot.id, error = %e, code = e.code(), "FEFO check failed"),
            }
        }

        total?;
        old_total?;
        Ok(RuleOutcome::Fired)
    }
}

/// Product id of the lot before this update, when the event carries it
fn previous_product(event: &ChangeEvent) -> Option<String> {
    if event.kind != ChangeKind::Update {
        return None;
    }
    event
        .previous
        .as_ref()?
        .get("productId")?
        .as_str()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}
