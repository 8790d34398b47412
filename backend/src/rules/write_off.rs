//! Write-off rule: announce every waste record once, whatever created it

use std::sync::Arc;

use async_trait::async_trait;
use shared::{validate_waste, ChangeEvent, ChangeKind, Collection, WasteRecord};

use super::{unprocessed, Rule, RuleOutcome};
use crate::error::AppResult;
use crate::services::notification::{write_off_notification, NotificationService};
use crate::services::IdempotencyGate;
use crate::store::RecordStore;

pub struct WriteOffRule {
    store: Arc<dyn RecordStore>,
    gate: IdempotencyGate,
    notifications: NotificationService,
}

impl WriteOffRule {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            gate: IdempotencyGate::new(store.clone()),
            notifications: NotificationService::new(store.clone()),
            store,
        }
    }
}

#[async_trait]
impl Rule for WriteOffRule {
    fn name(&self) -> &'static str {
        "write_off"
    }

    fn collection(&self) -> Collection {
        Collection::Waste
    }

    fn kinds(&self) -> &'static [ChangeKind] {
        &[ChangeKind::Create]
    }

    async fn handle(&self, event: &ChangeEvent) -> AppResult<RuleOutcome> {
        let waste: WasteRecord = event.decode()?;

        if waste.processed || !self.gate.try_acquire(Collection::Waste, &waste.id).await? {
            return Ok(RuleOutcome::AlreadyProcessed);
        }

        if let Err(reason) = validate_waste(&waste) {
            tracing::warn!(id = %waste.id, reason, "Write-off looks wrong, announcing anyway");
        }

        self.notifications.emit(&write_off_notification(&waste)).await?;

        tracing::debug!(id = %waste.id, cascaded = waste.is_cascaded(), "Write-off announced");
        Ok(RuleOutcome::Fired)
    }

    async fn backlog(&self) -> AppResult<Vec<ChangeEvent>> {
        unprocessed(&self.store, Collection::Waste).await
    }
}
