//! # Scheduler Trigger Handler
//!
//! The cron entry point. Each POST runs one batch pass over the due-task
//! set. Per-task failures are expected, normal outcomes and still produce a
//! 200; only a whole-pass failure (the due scan itself erroring) returns a
//! 500, with already-persisted per-task states left as they are.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tracing::error;

use crate::web::state::AppState;

/// Trigger response. Field names are part of the wire contract consumed by
/// the cron host, hence camelCase.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunBatchResponse {
    pub success: bool,
    pub processed_count: usize,
    pub success_count: usize,
    pub failed_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /scheduler/run - run one batch pass now.
pub async fn run_batch(State(state): State<Arc<AppState>>) -> Response {
    match state.coordinator.run_pass(Utc::now()).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(RunBatchResponse {
                success: true,
                processed_count: summary.processed,
                success_count: summary.succeeded,
                failed_count: summary.failed,
                error: None,
            }),
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "batch pass failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RunBatchResponse {
                    success: false,
                    processed_count: 0,
                    success_count: 0,
                    failed_count: 0,
                    error: Some(err.to_string()),
                }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_serializes_camel_case() {
        let response = RunBatchResponse {
            success: true,
            processed_count: 3,
            success_count: 2,
            failed_count: 1,
            error: None,
        };
        let json = serde_json::to_value(&response).expect("serializes");
        assert_eq!(
            json,
            serde_json::json!({
                "success": true,
                "processedCount": 3,
                "successCount": 2,
                "failedCount": 1
            })
        );
    }

    #[test]
    fn test_failure_response_includes_error() {
        let response = RunBatchResponse {
            success: false,
            processed_count: 0,
            success_count: 0,
            failed_count: 0,
            error: Some("scan failed".to_string()),
        };
        let json = serde_json::to_value(&response).expect("serializes");
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "scan failed");
    }
}
