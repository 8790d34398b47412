//! Discrepancy rule: physical count differs from the system count

use std::sync::Arc;

use async_trait::async_trait;
use shared::{ChangeEvent, ChangeKind, Collection, CountRecord};

use super::{unprocessed, Rule, RuleOutcome};
use crate::error::AppResult;
use crate::services::notification::{discrepancy_notification, NotificationService};
use crate::services::IdempotencyGate;
use crate::store::RecordStore;

pub struct DiscrepancyRule {
    store: Arc<dyn RecordStore>,
    gate: IdempotencyGate,
    notifications: NotificationService,
}

impl DiscrepancyRule {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            gate: IdempotencyGate::new(store.clone()),
            notifications: NotificationService::new(store.clone()),
            store,
        }
    }
}

#[async_trait]
impl Rule for DiscrepancyRule {
    fn name(&self) -> &'static str {
        "discrepancy"
    }

    fn collection(&self) -> Collection {
        Collection::Counts
    }

    fn kinds(&self) -> &'static [ChangeKind] {
        &[ChangeKind::Create, ChangeKind::Update]
    }

    async fn handle(&self, event: &ChangeEvent) -> AppResult<RuleOutcome> {
        let count: CountRecord = event.decode()?;

        if !count.has_discrepancy() {
            return Ok(RuleOutcome::NotApplicable);
        }
        // Our own gate write comes back as an update with the flag set
        if count.processed || !self.gate.try_acquire(Collection::Counts, &count.id).await? {
            return Ok(RuleOutcome::AlreadyProcessed);
        }

        self.notifications.emit(&discrepancy_notification(&count)).await?;
        Ok(RuleOutcome::Fired)
    }

    async fn backlog(&self) -> AppResult<Vec<ChangeEvent>> {
        let events = unprocessed(&self.store, Collection::Counts).await?;
        Ok(events
            .into_iter()
            .filter(|event| {
                event
                    .decode::<CountRecord>()
                    .map(|count| count.has_discrepancy())
                    .unwrap_or(true)
            })
            .collect())
    }
}
