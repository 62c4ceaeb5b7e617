//! # Backoff Policy
//!
//! Pure mapping from attempt number to retry delay. Exponential with a 30s
//! base: attempt 1 waits 30s, attempt 2 waits 60s, attempt 3 waits 120s.
//!
//! There is no cap unless one is configured. Callers keep `max_attempts`
//! small (at most 5) to bound the worst-case delay; an optional `max_delay`
//! is available as an explicit policy parameter for deployments that want
//! a ceiling.

use std::time::Duration;

/// Exponential backoff policy: `base_delay * 2^(attempt_number - 1)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    base_delay: Duration,
    max_delay: Option<Duration>,
}

impl BackoffPolicy {
    /// Policy with the given base delay and no cap.
    pub fn new(base_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay: None,
        }
    }

    /// Cap every computed delay at `max_delay`.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Delay to impose before `attempt_number` (1-based).
    ///
    /// Total over the full attempt domain: saturates instead of overflowing
    /// for absurd attempt numbers.
    pub fn delay_for(&self, attempt_number: u32) -> Duration {
        debug_assert!(attempt_number >= 1, "attempt numbers are 1-based");
        let exponent = attempt_number.saturating_sub(1).min(63);
        let secs = self.base_delay.as_secs().saturating_mul(1u64 << exponent);
        let delay = Duration::from_secs(secs);
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

impl Default for BackoffPolicy {
    /// The observed production policy: 30s base, uncapped.
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}
