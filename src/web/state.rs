//! # Web API Application State
//!
//! Shared state for the axum handlers: the database pool for producer
//! queries and the fully wired batch coordinator for the trigger endpoint.

use sqlx::PgPool;

use crate::config::RelayConfig;
use crate::scheduler::{BatchCoordinator, HttpDeliverer, PgTaskStore};

/// State shared across all handlers, wrapped in an `Arc` by the router.
pub struct AppState {
    pub pool: PgPool,
    pub coordinator: BatchCoordinator<PgTaskStore, HttpDeliverer>,
    pub config: RelayConfig,
}
