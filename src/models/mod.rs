//! # Data Models
//!
//! Row types and query surfaces for the durable delivery queue. Each model
//! owns its SQL; callers hand in a pool and get typed rows back.

pub mod delivery_task;
pub mod webhook_endpoint;

pub use delivery_task::{DeliveryTask, DueDelivery, NewDeliveryTask, TaskStatus};
pub use webhook_endpoint::{NewWebhookEndpoint, WebhookEndpoint};
