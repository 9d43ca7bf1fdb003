use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tenantd_errors::TenantResult;
use tracing::warn;

/// Bounded retry with exponential backoff and jitter, applied per activity
/// invocation. Only transient errors are retried; everything else
/// propagates immediately so saga compensation sees an unambiguous signal.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Random jitter range applied to each delay (0.0 - 1.0).
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Policy with no waiting between attempts, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter_factor: 0.0,
        }
    }

    pub async fn execute<T, F, Fut>(&self, activity: &str, mut operation: F) -> TenantResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = TenantResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        activity,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "activity failed transiently, retrying: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let mut delay_ms = (self.base_delay.as_millis() as f64 * exp)
            .min(self.max_delay.as_millis() as f64);
        if self.jitter_factor > 0.0 {
            let jitter = rand::rng().random_range(0.0..=self.jitter_factor);
            delay_ms *= 1.0 + jitter;
        }
        Duration::from_millis(delay_ms as u64)
    }
}
