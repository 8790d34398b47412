//! Wiring of rules, services and the supervisor for one record store

use std::sync::Arc;

use crate::config::Config;
use crate::rules::{
    CascadeRelayRule, ConfigRule, DiscrepancyRule, LotRule, ReturnRule, Rule, WriteOffRule,
};
use crate::services::{FefoService, NotificationService, StockReconciler};
use crate::store::RecordStore;
use crate::supervisor::WatcherSupervisor;

/// The alerting and reconciliation engine
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn RecordStore>,
    config: Config,
}

impl Engine {
    pub fn new(store: Arc<dyn RecordStore>, config: &Config) -> Self {
        Self {
            store,
            config: config.clone(),
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Every rule, one watcher each
    pub fn rules(&self) -> Vec<Arc<dyn Rule>> {
        let fefo_defaults = self.config.fefo.default_alert_config();

        vec![
            Arc::new(DiscrepancyRule::new(self.store.clone())),
            Arc::new(WriteOffRule::new(self.store.clone())),
            Arc::new(ReturnRule::new(self.store.clone(), self.config.cascade.clone())),
            Arc::new(CascadeRelayRule::new(self.store.clone(), self.config.cascade.clone())),
            Arc::new(LotRule::new(self.store.clone(), fefo_defaults.clone())),
            Arc::new(ConfigRule::new(self.store.clone(), fefo_defaults)),
        ]
    }

    pub fn notifications(&self) -> NotificationService {
        NotificationService::new(self.store.clone())
    }

    pub fn reconciler(&self) -> StockReconciler {
        StockReconciler::new(self.store.clone())
    }

    pub fn fefo(&self) -> FefoService {
        FefoService::new(self.store.clone(), self.config.fefo.default_alert_config())
    }

    /// A supervisor for all rules, with the periodic FEFO scan when enabled
    pub fn supervisor(&self) -> WatcherSupervisor {
        let supervisor = WatcherSupervisor::new(self.store.clone(), self.rules(), self.config.watcher.clone());

        match self.config.fefo.scan_interval() {
            Some(interval) => supervisor.with_fefo_scan(self.fefo(), interval),
            None => supervisor,
        }
    }
}
