//! # Task Store
//!
//! Scheduler-facing view of the durable queue. The trait keeps the batch
//! coordinator independent of Postgres so its state machine can be exercised
//! against an in-memory store; [`PgTaskStore`] delegates to the model-layer
//! queries in production.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;
use crate::models::DeliveryTask;

/// A due work item handed to the coordinator: the task's attempt state plus
/// the joined destination URL and optional signing secret.
#[derive(Debug, Clone)]
pub struct DueTask {
    pub id: i64,
    pub url: String,
    pub event_type: String,
    pub payload: String,
    pub secret: Option<String>,
    pub attempts_made: i32,
    pub max_attempts: i32,
}

/// Single-slot record of the most recent attempt, persisted on every
/// transition.
#[derive(Debug, Clone, Default)]
pub struct AttemptRecord {
    pub http_status: Option<i32>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: i64,
}

/// Durable queue operations the coordinator needs.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// All non-terminal tasks whose next attempt time has passed.
    async fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<DueTask>>;

    /// Terminal success: record the attempt and the delivery timestamp.
    async fn mark_succeeded(
        &self,
        id: i64,
        attempts_made: i32,
        record: &AttemptRecord,
        delivered_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Schedule the next attempt and record this one.
    async fn mark_retry_scheduled(
        &self,
        id: i64,
        attempts_made: i32,
        next_attempt_at: DateTime<Utc>,
        record: &AttemptRecord,
    ) -> Result<()>;

    /// Terminal failure: record the attempt and the failure timestamp.
    async fn mark_failed(
        &self,
        id: i64,
        attempts_made: i32,
        record: &AttemptRecord,
        failed_at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Postgres-backed store used by the server.
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<DueTask>> {
        let rows = DeliveryTask::due_tasks(&self.pool, now).await?;
        Ok(rows
            .into_iter()
            .map(|row| DueTask {
                id: row.task.id,
                url: row.url,
                event_type: row.task.event_type,
                payload: row.task.payload,
                secret: row.secret,
                attempts_made: row.task.attempts_made,
                max_attempts: row.task.max_attempts,
            })
            .collect())
    }

    async fn mark_succeeded(
        &self,
        id: i64,
        attempts_made: i32,
        record: &AttemptRecord,
        delivered_at: DateTime<Utc>,
    ) -> Result<()> {
        DeliveryTask::mark_succeeded(
            &self.pool,
            id,
            attempts_made,
            record.http_status,
            record.response_body.as_deref(),
            record.duration_ms,
            delivered_at,
        )
        .await?;
        Ok(())
    }

    async fn mark_retry_scheduled(
        &self,
        id: i64,
        attempts_made: i32,
        next_attempt_at: DateTime<Utc>,
        record: &AttemptRecord,
    ) -> Result<()> {
        DeliveryTask::mark_retry_scheduled(
            &self.pool,
            id,
            attempts_made,
            next_attempt_at,
            record.http_status,
            record.response_body.as_deref(),
            record.error_message.as_deref(),
            record.duration_ms,
        )
        .await?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: i64,
        attempts_made: i32,
        record: &AttemptRecord,
        failed_at: DateTime<Utc>,
    ) -> Result<()> {
        DeliveryTask::mark_failed(
            &self.pool,
            id,
            attempts_made,
            record.http_status,
            record.response_body.as_deref(),
            record.error_message.as_deref(),
            record.duration_ms,
            failed_at,
        )
        .await?;
        Ok(())
    }
}
