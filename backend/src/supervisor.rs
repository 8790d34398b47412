//! Watcher supervisor
//!
//! Owns one watcher task per rule plus the periodic FEFO scan. Every task
//! listens on a shared shutdown signal, so `shutdown()` stops them all and
//! waits for them to exit. In-flight rule bodies are aborted.

use std::sync::Arc;
use std::time::Duration;

use shared::ChangeEvent;
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt as _;

use crate::config::WatcherConfig;
use crate::error::{AppError, AppResult};
use crate::rules::Rule;
use crate::services::FefoService;
use crate::store::RecordStore;

pub struct WatcherSupervisor {
    store: Arc<dyn RecordStore>,
    rules: Vec<Arc<dyn Rule>>,
    config: WatcherConfig,
    fefo_scan: Option<(FefoService, Duration)>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl WatcherSupervisor {
    pub fn new(store: Arc<dyn RecordStore>, rules: Vec<Arc<dyn Rule>>, config: WatcherConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            store,
            rules,
            config,
            fefo_scan: None,
            shutdown,
            tasks: Vec::new(),
        }
    }

    /// Also run a full FEFO scan every `interval`, starting immediately
    pub fn with_fefo_scan(mut self, service: FefoService, interval: Duration) -> Self {
        self.fefo_scan = Some((service, interval));
        self
    }

    /// Spawn every watcher. Returns once each one has made its first
    /// subscription attempt.
    pub async fn start(&mut self) -> AppResult<()> {
        if !self.tasks.is_empty() {
            return Err(AppError::Internal("watcher supervisor already started".into()));
        }

        let (shutdown, _) = watch::channel(false);
        self.shutdown = shutdown;

        for rule in &self.rules {
            let (ready_tx, ready_rx) = oneshot::channel();
            self.tasks.push(tokio::spawn(run_watcher(
                self.store.clone(),
                rule.clone(),
                self.config.clone(),
                self.shutdown.subscribe(),
                ready_tx,
            )));
            // A dropped sender means the task already exited
            let _ = ready_rx.await;
        }

        if let Some((service, interval)) = &self.fefo_scan {
            self.tasks.push(tokio::spawn(run_fefo_scan(
                service.clone(),
                *interval,
                self.shutdown.subscribe(),
            )));
        }

        tracing::info!(watchers = self.rules.len(), fefo_scan = self.fefo_scan.is_some(), "Watcher supervisor started");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|task| !task.is_finished())
    }

    /// Signal every task to stop and wait for them to exit
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown.send(true);

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                log_join_error("supervisor", e);
            }
        }

        tracing::info!("Watcher supervisor stopped");
    }
}

impl Drop for WatcherSupervisor {
    fn drop(&mut self) {
        if self.is_running() {
            tracing::warn!("Watcher supervisor dropped without shutdown(); signaling tasks to stop");
            let _ = self.shutdown.send(true);
        }
    }
}

// ============================================================================
// Tasks
// ============================================================================

async fn run_watcher(
    store: Arc<dyn RecordStore>,
    rule: Arc<dyn Rule>,
    config: WatcherConfig,
    mut shutdown: watch::Receiver<bool>,
    ready: oneshot::Sender<()>,
) {
    let mut ready = Some(ready);
    let mut handlers = JoinSet::new();
    let mut backoff = config.retry_initial();

    'watch: loop {
        if *shutdown.borrow() {
            break;
        }

        let subscribed = store.subscribe(rule.collection(), rule.kinds()).await;
        if let Some(ready) = ready.take() {
            let _ = ready.send(());
        }

        match subscribed {
            Ok(mut stream) => {
                tracing::info!(rule = rule.name(), collection = %rule.collection(), "Watcher subscribed");
                backoff = config.retry_initial();

                if config.backlog_scan {
                    match rule.backlog().await {
                        Ok(events) => {
                            if !events.is_empty() {
                                tracing::info!(rule = rule.name(), pending = events.len(), "Replaying backlog");
                            }
                            for event in events {
                                spawn_handler(&mut handlers, &rule, event);
                            }
                        }
                        Err(e) => {
                            tracing::warn!(rule = rule.name(), error = %e, code = e.code(), "Backlog scan failed");
                        }
                    }
                }

                loop {
                    tokio::select! {
                        _ = shutdown.changed() => break 'watch,
                        item = stream.next() => match item {
                            Some(Ok(event)) => spawn_handler(&mut handlers, &rule, event),
                            Some(Err(e)) => {
                                tracing::warn!(rule = rule.name(), error = %e, code = e.code(), "Change feed failed");
                                break;
                            }
                            None => {
                                tracing::warn!(rule = rule.name(), "Change feed ended");
                                break;
                            }
                        },
                        Some(joined) = handlers.join_next() => {
                            if let Err(e) = joined {
                                log_join_error(rule.name(), e);
                            }
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(rule = rule.name(), error = %e, code = e.code(), "Subscribe failed");
            }
        }

        tracing::info!(rule = rule.name(), delay_ms = backoff.as_millis() as u64, "Resubscribing");
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(config.retry_max());
    }

    handlers.abort_all();
    while let Some(joined) = handlers.join_next().await {
        if let Err(e) = joined {
            if !e.is_cancelled() {
                log_join_error(rule.name(), e);
            }
        }
    }

    tracing::debug!(rule = rule.name(), "Watcher stopped");
}

fn spawn_handler(handlers: &mut JoinSet<()>, rule: &Arc<dyn Rule>, event: ChangeEvent) {
    let rule = rule.clone();
    handlers.spawn(async move {
        match rule.handle(&event).await {
            Ok(outcome) => tracing::debug!(
                rule = rule.name(),
                collection = %event.collection,
                id = %event.id,
                kind = event.kind.as_str(),
                outcome = outcome.as_str(),
                "Event handled"
            ),
            Err(e) => tracing::error!(
                rule = rule.name(),
                collection = %event.collection,
                id = %event.id,
                kind = event.kind.as_str(),
                error = %e,
                code = e.code(),
                "Rule failed"
            ),
        }
    });
}

async fn run_fefo_scan(service: FefoService, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                if let Err(e) = service.scan_all().await {
                    tracing::warn!(error = %e, code = e.code(), "FEFO scan failed");
                }
            }
        }
    }

    tracing::debug!("FEFO scan stopped");
}

fn log_join_error(task: &str, error: JoinError) {
    if error.is_panic() {
        tracing::error!(task, "Task panicked");
    } else {
        tracing::debug!(task, "Task cancelled");
    }
}
