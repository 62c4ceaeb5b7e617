//! # Delivery Scheduler
//!
//! The retry core: a pure backoff policy, a pure outcome classifier, an HTTP
//! delivery executor, the durable task store, and the batch coordinator that
//! drives them sequentially over each cron-triggered pass.

pub mod backoff;
pub mod classifier;
pub mod coordinator;
pub mod executor;
pub mod store;

pub use backoff::BackoffPolicy;
pub use classifier::{should_retry, FailureKind};
pub use coordinator::{BatchCoordinator, BatchSummary};
pub use executor::{AttemptOutcome, Deliverer, DeliveryRequest, HttpDeliverer};
pub use store::{AttemptRecord, DueTask, PgTaskStore, TaskStore};
