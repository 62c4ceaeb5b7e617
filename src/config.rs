//! # Relay Configuration System
//!
//! Explicit, validated configuration loading: defaults first, then an
//! optional `relay.toml`, then `RELAY__`-prefixed environment variables
//! (`RELAY__DATABASE__URL`, `RELAY__WEB__BIND_ADDRESS`, ...). No silent
//! fallbacks past this module - invalid values fail at startup.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// Root configuration for the relay server.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RelayConfig {
    /// Database connection and pooling
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Outbound HTTP delivery settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Retry scheduling policy
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Web API settings
    #[serde(default)]
    pub web: WebConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres connection URL
    pub url: String,

    /// Maximum pool connections
    pub pool: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Hard per-attempt timeout for outbound deliveries, in seconds
    pub request_timeout_secs: u64,

    /// User-Agent header sent with every delivery
    pub user_agent: String,

    /// Maximum stored length of a destination response body
    pub response_body_limit: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Base delay for the first retry, in seconds
    pub base_delay_secs: u64,

    /// Optional cap on the exponential delay; uncapped when absent
    pub max_delay_secs: Option<u64>,

    /// Default attempt budget for new tasks
    pub default_max_attempts: i32,

    /// Fixed pause between tasks within one batch pass, in milliseconds
    pub pacing_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address for the trigger/producer API
    pub bind_address: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            pool: 10,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            user_agent: "relay-core-webhooks/0.1".to_string(),
            response_body_limit: 2000,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: 30,
            max_delay_secs: None,
            default_max_attempts: 3,
            pacing_delay_ms: 100,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from `relay.toml` (if present) and environment
    /// overrides, then validate it.
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name("relay").required(false))
            .add_source(
                Environment::with_prefix("RELAY")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .map_err(|e| RelayError::Configuration(e.to_string()))?;

        let config: RelayConfig = settings
            .try_deserialize()
            .map_err(|e| RelayError::Configuration(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.base_delay_secs == 0 {
            return Err(RelayError::Configuration(
                "scheduler.base_delay_secs must be at least 1".to_string(),
            ));
        }
        if !(1..=5).contains(&self.scheduler.default_max_attempts) {
            // Backoff is uncapped by default, so a large attempt budget would
            // produce multi-hour delays.
            return Err(RelayError::Configuration(format!(
                "scheduler.default_max_attempts must be between 1 and 5, got {}",
                self.scheduler.default_max_attempts
            )));
        }
        if self.http.request_timeout_secs == 0 {
            return Err(RelayError::Configuration(
                "http.request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
