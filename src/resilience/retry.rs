//! Bounded retry with exponential backoff and jitter.
//!
//! Retries cover transient provider failures only; once the attempts are
//! exhausted the error flows into the circuit breaker's own accounting.

use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::config::ResilienceConfig;
use crate::embedding::ProviderError;

/// Retry parameters, derived from [`ResilienceConfig`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn from_config(config: &ResilienceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay,
        }
    }

    /// Backoff for a given attempt (0-based): base × 2^attempt plus up to
    /// one base delay of jitter.
    fn delay(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1 << attempt.min(16));
        let jitter_ms = rand::rng().random_range(0..=self.base_delay.as_millis().max(1) as u64);
        exp + Duration::from_millis(jitter_ms)
    }
}

/// Run `op`, retrying transient failures up to the policy's limit.
///
/// Non-transient errors (invalid input) return immediately.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                let delay = policy.delay(attempt);
                debug!(attempt, ?delay, error = %err, "transient failure, backing off");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
