//! Return → write-off cascade
//!
//! The Return rule enqueues a `CascadeCommand` into the outbox; the relay
//! executes it here. The write-off id is derived from the return id, so a
//! retried or redelivered command never creates a second write-off.

use std::sync::Arc;

use serde_json::Value;
use shared::{CascadeCommand, Collection, Fields, ReturnRecord};

use super::gate::IdempotencyGate;
use crate::config::CascadeConfig;
use crate::error::{AppError, AppResult};
use crate::store::{self, RecordStore};

/// Result of executing one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeOutcome {
    pub waste_id: String,
    /// This call inserted the write-off
    pub created: bool,
    /// This call closed the command
    pub completed: bool,
}

#[derive(Clone)]
pub struct CascadeService {
    store: Arc<dyn RecordStore>,
    gate: IdempotencyGate,
    policy: CascadeConfig,
}

impl CascadeService {
    pub fn new(store: Arc<dyn RecordStore>, policy: CascadeConfig) -> Self {
        Self {
            gate: IdempotencyGate::new(store.clone()),
            store,
            policy,
        }
    }

    /// Write the outbox command for a return whose reason cascades.
    /// Returns `false` when the reason does not cascade or the command exists.
    pub async fn enqueue(&self, record: &ReturnRecord) -> AppResult<bool> {
        let Some(command) = CascadeCommand::for_return(record) else {
            return Ok(false);
        };

        let queued = store::insert_if_absent(self.store.as_ref(), &command).await?;
        if queued {
            tracing::info!(return_id = %record.id, cause = %command.cause, "Cascade command queued");
        }

        Ok(queued)
    }

    /// Create the write-off for a command, retrying with exponential backoff
    pub async fn execute(&self, command: &CascadeCommand) -> AppResult<CascadeOutcome> {
        let mut delay = self.policy.retry_initial();
        let mut attempts = command.attempts;

        for attempt in 1..=self.policy.max_attempts {
            let error = match self.attempt(command).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => e,
            };

            attempts += 1;
            tracing::warn!(
                return_id = %command.return_id,
                attempt,
                error = %error,
                code = error.code(),
                "Cascade attempt failed"
            );
            self.record_failure(command, attempts, &error).await;

            if attempt == self.policy.max_attempts {
                return Err(AppError::CascadeExhausted {
                    return_id: command.return_id.clone(),
                    attempts,
                    last_error: error.to_string(),
                });
            }

            tokio::time::sleep(delay).await;
            delay *= 2;
        }

        // Only reachable with max_attempts = 0
        Err(AppError::Configuration("cascade.max_attempts must be at least 1".into()))
    }

    async fn attempt(&self, command: &CascadeCommand) -> AppResult<CascadeOutcome> {
        let waste = command.to_waste();
        let created = store::insert_if_absent(self.store.as_ref(), &waste).await?;
        let completed = self.gate.try_acquire(Collection::Outbox, &command.id).await?;

        if created {
            tracing::info!(
                return_id = %command.return_id,
                waste_id = %waste.id,
                quantity = waste.quantity,
                "Write-off created from return"
            );
        }

        Ok(CascadeOutcome {
            waste_id: waste.id,
            created,
            completed,
        })
    }

    /// Best effort: the bookkeeping write may fail for the same reason the attempt did
    async fn record_failure(&self, command: &CascadeCommand, attempts: u32, error: &AppError) {
        let mut fields = Fields::new();
        fields.insert("attempts".to_string(), Value::from(attempts));
        fields.insert("lastError".to_string(), Value::from(error.to_string()));

        if let Err(e) = self.store.update(Collection::Outbox, &command.id, fields).await {
            tracing::debug!(return_id = %command.return_id, error = %e, "Could not record cascade failure");
        }
    }
}
