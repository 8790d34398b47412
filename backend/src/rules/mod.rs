//! Change-triggered rules
//!
//! Each rule watches one collection for some change kinds. The supervisor
//! subscribes on its behalf and calls `handle` for every event, concurrently.

use std::sync::Arc;

use async_trait::async_trait;
use shared::{ChangeEvent, ChangeKind, Collection};

use crate::error::AppResult;
use crate::store::{Condition, RecordStore};

pub mod cascade;
pub mod config;
pub mod discrepancy;
pub mod lots;
pub mod returns;
pub mod write_off;

pub use cascade::CascadeRelayRule;
pub use config::ConfigRule;
pub use discrepancy::DiscrepancyRule;
pub use lots::LotRule;
pub use returns::ReturnRule;
pub use write_off::WriteOffRule;

/// What handling one event amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    /// Side effects were produced
    Fired,
    /// The gate was already closed for this document
    AlreadyProcessed,
    /// The document does not qualify
    NotApplicable,
}

impl RuleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleOutcome::Fired => "fired",
            RuleOutcome::AlreadyProcessed => "already_processed",
            RuleOutcome::NotApplicable => "not_applicable",
        }
    }
}

#[async_trait]
pub trait Rule: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn collection(&self) -> Collection;

    fn kinds(&self) -> &'static [ChangeKind];

    async fn handle(&self, event: &ChangeEvent) -> AppResult<RuleOutcome>;

    /// Documents that still need processing, replayed as create events after
    /// every (re)subscription. Rules without a gate have no backlog.
    async fn backlog(&self) -> AppResult<Vec<ChangeEvent>> {
        Ok(Vec::new())
    }
}

/// Every document in a collection whose `processed` flag is still falsy
pub(crate) async fn unprocessed(store: &Arc<dyn RecordStore>, collection: Collection) -> AppResult<Vec<ChangeEvent>> {
    Ok(store
        .query(collection, &[Condition::falsy(shared::PROCESSED_FIELD)])
        .await?
        .into_iter()
        .map(|doc| ChangeEvent::backlog(collection, doc))
        .collect())
}
