//! Cascade relay: executes queued return → write-off commands

use std::sync::Arc;

use async_trait::async_trait;
use shared::{CascadeCommand, ChangeEvent, ChangeKind, Collection};

use super::{unprocessed, Rule, RuleOutcome};
use crate::config::CascadeConfig;
use crate::error::AppResult;
use crate::services::CascadeService;
use crate::store::RecordStore;

pub struct CascadeRelayRule {
    store: Arc<dyn RecordStore>,
    cascade: CascadeService,
}

impl CascadeRelayRule {
    pub fn new(store: Arc<dyn RecordStore>, policy: CascadeConfig) -> Self {
        Self {
            cascade: CascadeService::new(store.clone(), policy),
            store,
        }
    }
}

#[async_trait]
impl Rule for CascadeRelayRule {
    fn name(&self) -> &'static str {
        "cascade_relay"
    }

    fn collection(&self) -> Collection {
        Collection::Outbox
    }

    // Attempt bookkeeping writes updates; only creates start work
    fn kinds(&self) -> &'static [ChangeKind] {
        &[ChangeKind::Create]
    }

    async fn handle(&self, event: &ChangeEvent) -> AppResult<RuleOutcome> {
        let command: CascadeCommand = event.decode()?;
        if command.processed {
            return Ok(RuleOutcome::AlreadyProcessed);
        }

        let outcome = self.cascade.execute(&command).await?;
        if outcome.created || outcome.completed {
            Ok(RuleOutcome::Fired)
        } else {
            Ok(RuleOutcome::AlreadyProcessed)
        }
    }

    async fn backlog(&self) -> AppResult<Vec<ChangeEvent>> {
        unprocessed(&self.store, Collection::Outbox).await
    }
}
