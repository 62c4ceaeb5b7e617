//! # Web API
//!
//! The relay's HTTP surface: the cron trigger that runs a batch pass, thin
//! producer endpoints for enqueueing and inspecting delivery tasks, and a
//! health check. Authentication of the trigger is an external concern.

pub mod handlers;
pub mod response_types;
pub mod state;

pub use handlers::router;
pub use response_types::{ApiError, ApiResult};
pub use state::AppState;
