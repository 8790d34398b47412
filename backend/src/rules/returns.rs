//! Return rule: announce the return and, for expired or damaged goods,
//! queue the write-off cascade

use std::sync::Arc;

use async_trait::async_trait;
use shared::{validate_return, ChangeEvent, ChangeKind, Collection, ReturnRecord};

use super::{unprocessed, Rule, RuleOutcome};
use crate::config::CascadeConfig;
use crate::error::AppResult;
use crate::services::notification::{return_notification, NotificationService};
use crate::services::{CascadeService, IdempotencyGate};
use crate::store::RecordStore;

pub struct ReturnRule {
    store: Arc<dyn RecordStore>,
    gate: IdempotencyGate,
    notifications: NotificationService,
    cascade: CascadeService,
}

impl ReturnRule {
    pub fn new(store: Arc<dyn RecordStore>, policy: CascadeConfig) -> Self {
        Self {
            gate: IdempotencyGate::new(store.clone()),
            notifications: NotificationService::new(store.clone()),
            cascade: CascadeService::new(store.clone(), policy),
            store,
        }
    }
}

#[async_trait]
impl Rule for ReturnRule {
    fn name(&self) -> &'static str {
        "return"
    }

    fn collection(&self) -> Collection {
        Collection::Returns
    }

    fn kinds(&self) -> &'static [ChangeKind] {
        &[ChangeKind::Create]
    }

    async fn handle(&self, event: &ChangeEvent) -> AppResult<RuleOutcome> {
        let record: ReturnRecord = event.decode()?;
        if record.processed {
            return Ok(RuleOutcome::AlreadyProcessed);
        }

        if let Err(reason) = validate_return(&record) {
            tracing::warn!(id = %record.id, reason, "Return looks wrong, processing anyway");
        }

        // The command must exist before the gate closes: a failed enqueue
        // leaves the return unprocessed for the backlog scan.
        self.cascade.enqueue(&record).await?;

        if !self.gate.try_acquire(Collection::Returns, &record.id).await? {
            return Ok(RuleOutcome::AlreadyProcessed);
        }

        self.notifications.emit(&return_notification(&record)).await?;

        Ok(RuleOutcome::Fired)
    }

    async fn backlog(&self) -> AppResult<Vec<ChangeEvent>> {
        unprocessed(&self.store, Collection::Returns).await
    }
}
