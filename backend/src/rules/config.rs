//! Config rule: announce FEFO threshold changes and re-evaluate every lot

use std::sync::Arc;

use async_trait::async_trait;
use shared::{validate_alert_config, AlertConfig, ChangeEvent, ChangeKind, Collection, FEFO_CONFIG_ID};

use super::{Rule, RuleOutcome};
use crate::error::{AppError, AppResult};
use crate::services::notification::{config_notification, NotificationService};
use crate::services::FefoService;
use crate::store::RecordStore;

pub struct ConfigRule {
    notifications: NotificationService,
    fefo: FefoService,
}

impl ConfigRule {
    pub fn new(store: Arc<dyn RecordStore>, fefo_defaults: AlertConfig) -> Self {
        Self {
            notifications: NotificationService::new(store.clone()),
            fefo: FefoService::new(store, fefo_defaults),
        }
    }
}

#[async_trait]
impl Rule for ConfigRule {
    fn name(&self) -> &'static str {
        "config"
    }

    fn collection(&self) -> Collection {
        Collection::Config
    }

    fn kinds(&self) -> &'static [ChangeKind] {
        &[ChangeKind::Create, ChangeKind::Update]
    }

    async fn handle(&self, event: &ChangeEvent) -> AppResult<RuleOutcome> {
        if event.id != FEFO_CONFIG_ID {
            return Ok(RuleOutcome::NotApplicable);
        }

        let config: AlertConfig = event.decode()?;
        validate_alert_config(&config)
            .map_err(|reason| AppError::invalid_document(Collection::Config, &event.id, reason))?;

        self.notifications.emit(&config_notification(&config)).await?;
        self.fefo.scan_all().await?;

        Ok(RuleOutcome::Fired)
    }
}
