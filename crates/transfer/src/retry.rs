//! Bounded exponential backoff for transient network failures.
//!
//! Only failures where no HTTP status came back (connect errors, timeouts,
//! reset connections) are retried. A status code is always the server's
//! final word on that request.

use std::time::Duration;

/// Retry settings for a single PUT.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Whether another attempt is allowed after `attempt` (1-based) failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Growth factor actually applied. Values below 1.0, NaN and infinities
    /// fall back to a constant delay.
    fn factor(&self) -> f64 {
        if self.backoff_factor.is_finite() && self.backoff_factor >= 1.0 {
            self.backoff_factor
        } else {
            1.0
        }
    }

    /// Converts `secs` to a delay within `[0, max_delay]`.
    fn clamp_secs(&self, secs: f64) -> Duration {
        let max = self.max_delay.as_secs_f64();
        if secs.is_nan() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs.clamp(0.0, max))
    }

    /// Backoff after the failed `attempt` (1-based), before jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        self.clamp_secs(self.initial_delay.as_secs_f64() * self.factor().powi(exp))
    }

    /// Backoff after the failed `attempt`, with up to ±20% jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_secs_f64();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();
        // Maps the sub-second clock onto [0.8, 1.2).
        let scale = 0.8 + 0.4 * (f64::from(nanos) / 1_000_000_000.0);
        self.clamp_secs(base * scale)
    }
}
