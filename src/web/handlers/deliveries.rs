//! # Delivery Producer Handlers
//!
//! Thin producer surface for the queue: enqueue a delivery task and read one
//! back. Task visibility (status, last error, timestamps) is the record
//! itself; dashboards consume it from here.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::models::{DeliveryTask, NewDeliveryTask, WebhookEndpoint};
use crate::web::response_types::{ApiError, ApiResult};
use crate::web::state::AppState;

/// Request body for enqueueing a delivery.
#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub endpoint_id: i64,
    pub event_type: String,
    pub payload: serde_json::Value,
    /// Attempt budget; defaults from scheduler config
    pub max_attempts: Option<i32>,
    /// First eligible attempt time; defaults to now
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// POST /deliveries - enqueue a new delivery task.
pub async fn enqueue(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EnqueueRequest>,
) -> ApiResult<(StatusCode, Json<DeliveryTask>)> {
    let max_attempts = request
        .max_attempts
        .unwrap_or(state.config.scheduler.default_max_attempts);
    if !(1..=5).contains(&max_attempts) {
        return Err(ApiError::bad_request(format!(
            "max_attempts must be between 1 and 5, got {max_attempts}"
        )));
    }
    if request.event_type.trim().is_empty() {
        return Err(ApiError::bad_request("event_type must not be empty"));
    }

    let endpoint = WebhookEndpoint::find_by_id(&state.pool, request.endpoint_id)
        .await
        .map_err(|_| ApiError::database_error("endpoint lookup"))?
        .ok_or(ApiError::NotFound)?;

    let task = DeliveryTask::create(
        &state.pool,
        NewDeliveryTask {
            endpoint_id: endpoint.id,
            event_type: request.event_type,
            payload: request.payload,
            max_attempts,
            scheduled_for: request.scheduled_for,
        },
    )
    .await
    .map_err(|_| ApiError::database_error("enqueue delivery"))?;

    info!(
        task_id = task.id,
        endpoint_id = task.endpoint_id,
        event_type = %task.event_type,
        "delivery task enqueued"
    );
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /deliveries/:id - fetch one delivery task record.
pub async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<DeliveryTask>> {
    let task = DeliveryTask::find_by_id(&state.pool, id)
        .await
        .map_err(|_| ApiError::database_error("delivery lookup"))?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(task))
}
