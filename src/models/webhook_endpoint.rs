//! # Webhook Endpoint Model
//!
//! A registered delivery destination: the URL payloads are POSTed to and an
//! optional shared secret used to sign them. The secret is scheduler input,
//! not scheduler-owned state - the queue scanner joins it onto due tasks so
//! the executor can add the signature header.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

/// A delivery destination row.
///
/// Maps to the `webhook_endpoints` table. When `secret` is set, every
/// delivery to this endpoint carries an `X-Webhook-Signature` header with an
/// HMAC-SHA256 of the payload; when absent the header is omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WebhookEndpoint {
    pub id: i64,
    pub url: String,
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// New endpoint for creation (without generated fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWebhookEndpoint {
    pub url: String,
    pub secret: Option<String>,
}

impl WebhookEndpoint {
    /// Register a new delivery destination.
    pub async fn create(
        pool: &PgPool,
        new_endpoint: NewWebhookEndpoint,
    ) -> Result<WebhookEndpoint, sqlx::Error> {
        sqlx::query_as::<_, WebhookEndpoint>(
            r#"
            INSERT INTO webhook_endpoints (url, secret, created_at)
            VALUES ($1, $2, NOW())
            RETURNING id, url, secret, created_at
            "#,
        )
        .bind(&new_endpoint.url)
        .bind(&new_endpoint.secret)
        .fetch_one(pool)
        .await
    }

    /// Find an endpoint by its primary key.
    pub async fn find_by_id(
        pool: &PgPool,
        id: i64,
    ) -> Result<Option<WebhookEndpoint>, sqlx::Error> {
        sqlx::query_as::<_, WebhookEndpoint>(
            r#"
            SELECT id, url, secret, created_at
            FROM webhook_endpoints
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}
