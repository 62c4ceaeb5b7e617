//! # Batch Coordinator
//!
//! Drives one cron-triggered pass over the due-task set: scan once, then for
//! each task Dispatch → Outcome → Persist, sequentially. No task is retried
//! within the same pass; a failed task re-enters the queue with a future due
//! time and waits for a later invocation.
//!
//! Per-task failures are fully contained - classified and persisted, never
//! propagated. Only errors outside the per-task boundary (the due scan
//! itself) surface as a whole-pass error. A crash mid-pass leaves the
//! remaining tasks untouched for the next invocation, because all state
//! lives in the store.
//!
//! Invocations are assumed not to overlap (the cron trigger is expected to
//! be non-concurrent); there is no claim column or lease. Overlapping
//! triggers could deliver the same due task twice.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::error::Result;
use crate::scheduler::backoff::BackoffPolicy;
use crate::scheduler::classifier::{should_retry, FailureKind};
use crate::scheduler::executor::{Deliverer, DeliveryRequest};
use crate::scheduler::store::{AttemptRecord, DueTask, TaskStore};

/// Recorded when a task arrives at the coordinator already out of attempts.
const MAX_ATTEMPTS_EXCEEDED: &str = "max attempts exceeded";

/// Counts for one batch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Tasks taken from the due set this pass
    pub processed: usize,
    /// Tasks delivered this pass
    pub succeeded: usize,
    /// Tasks that failed their attempt this pass (rescheduled or terminal)
    pub failed: usize,
}

/// Sequential batch processor for due delivery tasks.
pub struct BatchCoordinator<S: TaskStore, D: Deliverer> {
    store: S,
    deliverer: D,
    backoff: BackoffPolicy,
    /// Fixed pause between tasks to avoid hammering one destination's rate
    /// limits; zero disables pacing
    pacing_delay: Duration,
}

impl<S: TaskStore, D: Deliverer> BatchCoordinator<S, D> {
    pub fn new(store: S, deliverer: D, backoff: BackoffPolicy, pacing_delay: Duration) -> Self {
        Self {
            store,
            deliverer,
            backoff,
            pacing_delay,
        }
    }

    /// Access the underlying task store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Access the underlying deliverer.
    pub fn deliverer(&self) -> &D {
        &self.deliverer
    }

    /// Run one pass over every task due at `now`.
    ///
    /// Returns `Err` only when the due scan fails; per-task errors (including
    /// persist failures) are logged, counted, and contained.
    #[instrument(skip(self), fields(due_count))]
    pub async fn run_pass(&self, now: DateTime<Utc>) -> Result<BatchSummary> {
        let due = self.store.due_tasks(now).await?;
        tracing::Span::current().record("due_count", due.len() as u64);
        info!(due = due.len(), "scanning due deliveries");

        let mut summary = BatchSummary::default();
        for (index, task) in due.iter().enumerate() {
            if index > 0 && !self.pacing_delay.is_zero() {
                tokio::time::sleep(self.pacing_delay).await;
            }

            summary.processed += 1;
            match self.process_task(task, now).await {
                Ok(true) => summary.succeeded += 1,
                Ok(false) => summary.failed += 1,
                Err(err) => {
                    // State for this task stays as-is; the next scheduled
                    // invocation picks it up again.
                    error!(task_id = task.id, error = %err, "failed to persist delivery state");
                    summary.failed += 1;
                }
            }
        }

        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "batch pass complete"
        );
        Ok(summary)
    }

    /// Dispatch → Outcome → Persist for one task. Returns whether the
    /// delivery succeeded; `Err` means the state update itself failed.
    async fn process_task(&self, task: &DueTask, now: DateTime<Utc>) -> Result<bool> {
        // Defensive: the scanner should never hand out an exhausted task,
        // but a row edited out-of-band must not loop forever.
        if task.attempts_made >= task.max_attempts {
            let record = AttemptRecord {
                error_message: Some(MAX_ATTEMPTS_EXCEEDED.to_string()),
                ..AttemptRecord::default()
            };
            self.store
                .mark_failed(task.id, task.attempts_made, &record, now)
                .await?;
            warn!(task_id = task.id, "due task already out of attempts");
            return Ok(false);
        }

        let request = DeliveryRequest {
            url: task.url.clone(),
            event_type: task.event_type.clone(),
            payload: task.payload.clone(),
            secret: task.secret.clone(),
        };
        let outcome = self.deliverer.attempt(&request).await;

        let attempts_made = task.attempts_made + 1;
        let record = AttemptRecord {
            http_status: outcome.http_status.map(i32::from),
            response_body: outcome.response_body,
            error_message: outcome.error_message,
            duration_ms: outcome.duration_ms,
        };

        if outcome.ok {
            self.store
                .mark_succeeded(task.id, attempts_made, &record, now)
                .await?;
            info!(
                task_id = task.id,
                attempts = attempts_made,
                duration_ms = record.duration_ms,
                "delivery succeeded"
            );
            return Ok(true);
        }

        let kind = outcome.failure_kind.unwrap_or(FailureKind::Other);
        let retryable = should_retry(kind, outcome.http_status);

        if retryable && attempts_made < task.max_attempts {
            // Delay is keyed off the upcoming attempt number.
            let delay = self.backoff.delay_for(attempts_made as u32 + 1);
            let next_attempt_at = now + chrono_delay(delay);
            self.store
                .mark_retry_scheduled(task.id, attempts_made, next_attempt_at, &record)
                .await?;
            warn!(
                task_id = task.id,
                attempts = attempts_made,
                http_status = record.http_status,
                next_attempt_at = %next_attempt_at,
                "delivery failed, retry scheduled"
            );
        } else {
            self.store
                .mark_failed(task.id, attempts_made, &record, now)
                .await?;
            warn!(
                task_id = task.id,
                attempts = attempts_made,
                http_status = record.http_status,
                retryable,
                "delivery failed terminally"
            );
        }
        Ok(false)
    }
}

/// Convert a std delay to a chrono one, clamping rather than failing for
/// out-of-range values (the uncapped policy can produce them).
fn chrono_delay(delay: Duration) -> chrono::Duration {
    // chrono::Duration::seconds panics past i64::MAX milliseconds.
    let secs = delay.as_secs().min((i64::MAX / 1000) as u64) as i64;
    chrono::Duration::seconds(secs)
}
