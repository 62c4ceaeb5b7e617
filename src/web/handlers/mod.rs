//! # Web API Request Handlers
//!
//! Contains all HTTP request handlers organized by functional area.

pub mod deliveries;
pub mod health;
pub mod scheduler;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::web::state::AppState;

/// Build the relay API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/scheduler/run", post(scheduler::run_batch))
        .route("/deliveries", post(deliveries::enqueue))
        .route("/deliveries/:id", get(deliveries::get_delivery))
        .with_state(state)
}
