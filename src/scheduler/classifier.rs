//! # Outcome Classifier
//!
//! Pure retry-or-fail decision for a single delivery attempt. Status codes
//! take priority over error kinds: a 4xx is a permanent rejection no matter
//! how the transport behaved, while 5xx and 429 are transient. Transport
//! failures with no status (timeout, connect/DNS errors) are transient, and
//! anything unrecognized fails open toward retrying so unclassified errors
//! never silently drop work.

use serde::{Deserialize, Serialize};

/// Transport-level failure kinds, distinguished so timeouts are not
/// conflated with generic network errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The 30s attempt timeout fired
    Timeout,
    /// Connection-level failure (DNS, refused, reset)
    Network,
    /// Anything else
    Other,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network"),
            FailureKind::Other => write!(f, "other"),
        }
    }
}

/// Decide whether a failed attempt should be retried.
///
/// Rules in priority order:
/// 1. status >= 500: retry (server error)
/// 2. status == 429: retry (rate limited)
/// 3. other 4xx: do not retry (client error is not transient)
/// 4. no status, timeout: retry
/// 5. no status, network failure: retry
/// 6. anything else: retry (fail open)
pub fn should_retry(kind: FailureKind, http_status: Option<u16>) -> bool {
    match http_status {
        Some(status) if status >= 500 => true,
        Some(429) => true,
        Some(status) if (400..500).contains(&status) => false,
        // A non-error status reported as a failure is unexpected; fail open.
        Some(_) => true,
        None => match kind {
            FailureKind::Timeout | FailureKind::Network | FailureKind::Other => true,
        },
    }
}
