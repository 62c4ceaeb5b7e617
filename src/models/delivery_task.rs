//! # Delivery Task Model
//!
//! One queued unit of outbound work, tracked through attempt/backoff state.
//!
//! ## Lifecycle
//!
//! Tasks are created `pending` with zero attempts by an upstream producer
//! (article published, social post scheduled). The batch coordinator is the
//! only writer after that: each pass either marks the task `succeeded`,
//! reschedules it (`retry_scheduled` with a future `next_attempt_at`), or
//! fails it terminally. Terminal rows are never selected or written again.
//!
//! ## Outcome record
//!
//! The `last_*` columns are a single-slot record of the most recent attempt
//! only; prior attempts are overwritten, not retained.
//!
//! ## Database Schema
//!
//! Maps to `delivery_tasks` with a partial index on
//! `(status, next_attempt_at)` covering the due-scan predicate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

/// Delivery task status values, stored as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Enqueued, no attempt made yet
    Pending,
    /// Failed at least once, waiting for its next due time
    RetryScheduled,
    /// Delivered (terminal)
    Succeeded,
    /// Exhausted or permanently rejected (terminal)
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::RetryScheduled => "retry_scheduled",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<TaskStatus> {
        match value {
            "pending" => Some(TaskStatus::Pending),
            "retry_scheduled" => Some(TaskStatus::RetryScheduled),
            "succeeded" => Some(TaskStatus::Succeeded),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delivery task row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DeliveryTask {
    pub id: i64,
    pub endpoint_id: i64,
    pub event_type: String,
    /// Payload serialized once at enqueue time and stored as text, so every
    /// delivery sends byte-for-byte what was stored
    pub payload: String,
    pub status: String,
    pub attempts_made: i32,
    pub max_attempts: i32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub last_http_status: Option<i32>,
    pub last_response_body: Option<String>,
    pub last_error_message: Option<String>,
    pub last_duration_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl DeliveryTask {
    pub fn status(&self) -> Option<TaskStatus> {
        TaskStatus::parse(&self.status)
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_some_and(|s| s.is_terminal())
    }
}

/// New delivery task for creation (without generated fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDeliveryTask {
    pub endpoint_id: i64,
    pub event_type: String,
    /// Serialized to its stored text form by [`DeliveryTask::create`]
    pub payload: serde_json::Value,
    pub max_attempts: i32,
    /// First eligible attempt time; defaults to now (immediately due)
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// A due task joined with its destination endpoint.
///
/// Produced by the queue scanner; carries the URL and optional signing
/// secret alongside the task row so the executor needs no second lookup.
#[derive(Debug, Clone, FromRow)]
pub struct DueDelivery {
    #[sqlx(flatten)]
    pub task: DeliveryTask,
    pub url: String,
    pub secret: Option<String>,
}

impl DeliveryTask {
    /// Enqueue a new delivery task (`pending`, zero attempts).
    pub async fn create(
        pool: &PgPool,
        new_task: NewDeliveryTask,
    ) -> Result<DeliveryTask, sqlx::Error> {
        sqlx::query_as::<_, DeliveryTask>(
            r#"
            INSERT INTO delivery_tasks (
                endpoint_id, event_type, payload, status, attempts_made,
                max_attempts, next_attempt_at, created_at
            )
            VALUES ($1, $2, $3, 'pending', 0, $4, COALESCE($5, NOW()), NOW())
            RETURNING id, endpoint_id, event_type, payload, status, attempts_made,
                      max_attempts, next_attempt_at, last_http_status,
                      last_response_body, last_error_message, last_duration_ms,
                      created_at, delivered_at, failed_at
            "#,
        )
        .bind(new_task.endpoint_id)
        .bind(&new_task.event_type)
        .bind(new_task.payload.to_string())
        .bind(new_task.max_attempts)
        .bind(new_task.scheduled_for)
        .fetch_one(pool)
        .await
    }

    /// Find a task by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<DeliveryTask>, sqlx::Error> {
        sqlx::query_as::<_, DeliveryTask>(
            r#"
            SELECT id, endpoint_id, event_type, payload, status, attempts_made,
                   max_attempts, next_attempt_at, last_http_status,
                   last_response_body, last_error_message, last_duration_ms,
                   created_at, delivered_at, failed_at
            FROM delivery_tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Scan the queue for due work: non-terminal tasks whose next attempt
    /// time has passed, joined with their destination endpoint.
    ///
    /// The full due set is fetched - no limit. Expected queue sizes are small
    /// (tens, not thousands); revisit with a LIMIT and claim column if that
    /// changes.
    pub async fn due_tasks(
        pool: &PgPool,
        now: DateTime<Utc>,
    ) -> Result<Vec<DueDelivery>, sqlx::Error> {
        sqlx::query_as::<_, DueDelivery>(
            r#"
            SELECT t.id, t.endpoint_id, t.event_type, t.payload, t.status,
                   t.attempts_made, t.max_attempts, t.next_attempt_at,
                   t.last_http_status, t.last_response_body, t.last_error_message,
                   t.last_duration_ms, t.created_at, t.delivered_at, t.failed_at,
                   e.url, e.secret
            FROM delivery_tasks t
            JOIN webhook_endpoints e ON e.id = t.endpoint_id
            WHERE t.status IN ('pending', 'retry_scheduled')
              AND t.next_attempt_at <= $1
            ORDER BY t.next_attempt_at ASC
            "#,
        )
        .bind(now)
        .fetch_all(pool)
        .await
    }

    /// Transition to `succeeded` (terminal) and record the final attempt.
    #[allow(clippy::too_many_arguments)]
    pub async fn mark_succeeded(
        pool: &PgPool,
        id: i64,
        attempts_made: i32,
        http_status: Option<i32>,
        response_body: Option<&str>,
        duration_ms: i64,
        delivered_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE delivery_tasks
            SET status = 'succeeded',
                attempts_made = $2,
                next_attempt_at = NULL,
                last_http_status = $3,
                last_response_body = $4,
                last_error_message = NULL,
                last_duration_ms = $5,
                delivered_at = $6
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(attempts_made)
        .bind(http_status)
        .bind(response_body)
        .bind(duration_ms)
        .bind(delivered_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Transition to `retry_scheduled` with a future due time and record the
    /// failed attempt in the single outcome slot.
    #[allow(clippy::too_many_arguments)]
    pub async fn mark_retry_scheduled(
        pool: &PgPool,
        id: i64,
        attempts_made: i32,
        next_attempt_at: DateTime<Utc>,
        http_status: Option<i32>,
        response_body: Option<&str>,
        error_message: Option<&str>,
        duration_ms: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE delivery_tasks
            SET status = 'retry_scheduled',
                attempts_made = $2,
                next_attempt_at = $3,
                last_http_status = $4,
                last_response_body = $5,
                last_error_message = $6,
                last_duration_ms = $7
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(attempts_made)
        .bind(next_attempt_at)
        .bind(http_status)
        .bind(response_body)
        .bind(error_message)
        .bind(duration_ms)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Transition to `failed` (terminal) and record the final attempt.
    #[allow(clippy::too_many_arguments)]
    pub async fn mark_failed(
        pool: &PgPool,
        id: i64,
        attempts_made: i32,
        http_status: Option<i32>,
        response_body: Option<&str>,
        error_message: Option<&str>,
        duration_ms: i64,
        failed_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE delivery_tasks
            SET status = 'failed',
                attempts_made = $2,
                next_attempt_at = NULL,
                last_http_status = $3,
                last_response_body = $4,
                last_error_message = $5,
                last_duration_ms = $6,
                failed_at = $7
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(attempts_made)
        .bind(http_status)
        .bind(response_body)
        .bind(error_message)
        .bind(duration_ms)
        .bind(failed_at)
        .execute(pool)
        .await?;
        Ok(())
    }
}
