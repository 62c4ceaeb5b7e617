use thiserror::Error;

/// Crate-wide error type for scheduler, store, and configuration failures.
///
/// Per-task delivery failures are not errors: they are classified outcomes
/// persisted on the task record. `RelayError` covers the operations around
/// them (scanning the queue, persisting state, building clients).
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Delivery client error: {0}")]
    DeliveryClient(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
