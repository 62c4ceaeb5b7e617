//! # Relay Core
//!
//! Postgres-backed webhook delivery scheduler with bounded retries and
//! exponential backoff.
//!
//! ## Overview
//!
//! Relay delivers enqueued webhook payloads to destination endpoints. It is
//! not a long-lived worker: an external cron trigger POSTs to the scheduler
//! endpoint, and each invocation is a stateless batch pass over the durable
//! `delivery_tasks` queue. All retry state lives in the database, so a crash
//! mid-pass leaves the remaining due tasks untouched for the next invocation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    ┌───────────────────┐    ┌───────────────────┐
//! │ Cron Trigger │───▶│ BatchCoordinator  │───▶│ HttpDeliverer     │
//! │ POST /run    │    │ scan → attempt →  │    │ signed POST, 30s  │
//! └──────────────┘    │ classify → persist│    │ timeout           │
//!                     └───────────────────┘    └───────────────────┘
//!                              │
//!                              ▼
//!                     ┌───────────────────┐
//!                     │ delivery_tasks    │
//!                     │ (status, due-time)│
//!                     └───────────────────┘
//! ```
//!
//! Components:
//! - [`scheduler::backoff`] - pure exponential backoff policy
//! - [`scheduler::classifier`] - retry-or-fail decision from status/error kind
//! - [`scheduler::executor`] - single signed HTTP delivery attempt
//! - [`scheduler::store`] - due-task scan and state persistence
//! - [`scheduler::coordinator`] - sequential batch pass over the due set
//! - [`web`] - axum handlers for the trigger, producer, and health endpoints

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod scheduler;
pub mod web;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
