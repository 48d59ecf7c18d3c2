//! Retry policy for transient carrier failures.
//!
//! HTTP 5xx responses and transport timeouts are retried with exponential
//! backoff as a bounded loop. A 401 is not handled here: clients perform a
//! single token refresh + replay outside the retry budget.

use std::time::Duration;

use rand::Rng;

/// Configuration for the transient-failure retry loop.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Base delay for the backoff schedule; doubles each retry.
    pub base_delay: Duration,
    /// Jitter factor applied to each delay (0.0 = none, 1.0 = full).
    pub jitter: f64,
}

impl RetryConfig {
    /// Default retry cap: 3 retries, 4 total calls.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    /// Default backoff base delay in milliseconds.
    pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

    /// A policy with no delays, for tests.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            max_retries: Self::DEFAULT_MAX_RETRIES,
            base_delay: Duration::ZERO,
            jitter: 0.0,
        }
    }

    /// Delay to sleep before retry number `attempt` (1-based).
    ///
    /// Schedule with the default base delay: 1s, 2s, 4s, ...
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let base = self.base_delay.saturating_mul(1_u32 << exp);
        apply_jitter(base, self.jitter)
    }

    /// Sleep for the backoff delay before retry number `attempt`.
    pub async fn wait(&self, attempt: u32) {
        let delay = self.backoff_delay(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: Self::DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(Self::DEFAULT_BASE_DELAY_MS),
            jitter: 0.0,
        }
    }
}

/// Apply random jitter to a delay.
///
/// With jitter factor `j`, the result is uniform in `[d * (1 - j), d]`.
fn apply_jitter(delay: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 || delay.is_zero() {
        return delay;
    }
    let jitter = jitter.min(1.0);
    let factor = 1.0 - rand::rng().random_range(0.0..jitter);
    delay.mul_f64(factor)
}
