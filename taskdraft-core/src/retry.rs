//! Bounded retry with exponential backoff and a per-attempt timeout.

use crate::provider::ProviderError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Total invocations per candidate, including the first.
pub const MAX_ATTEMPTS: u32 = 3;
pub const MULTIPLIER: f64 = 1.0;
pub const MIN_WAIT: Duration = Duration::from_secs(3);
pub const MAX_WAIT: Duration = Duration::from_secs(5);
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub multiplier: f64,
    pub min_wait: Duration,
    pub max_wait: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            multiplier: MULTIPLIER,
            min_wait: MIN_WAIT,
            max_wait: MAX_WAIT,
            attempt_timeout: ATTEMPT_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    /// Same attempt bound, no waiting between attempts.
    pub fn immediate() -> Self {
        Self {
            min_wait: Duration::ZERO,
            max_wait: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Wait before the attempt following `attempt` (1-based):
    /// `multiplier * 2^(attempt - 1)` seconds, clamped to `[min_wait, max_wait]`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = 2f64.powi(attempt.saturating_sub(1).min(62) as i32);
        let secs = (self.multiplier * exp).max(0.0);
        let raw = Duration::try_from_secs_f64(secs).unwrap_or(self.max_wait);
        raw.max(self.min_wait).min(self.max_wait)
    }
}

/// Runs `operation` until it succeeds or `policy.max_attempts` invocations have failed.
///
/// Every attempt is bounded by `policy.attempt_timeout`; an expired attempt counts as
/// [`ProviderError::Timeout`]. `on_failure` sees each failed attempt before the backoff wait.
/// The last error is returned once the bound is reached.
pub async fn with_retry<F, Fut, T, N>(
    policy: &RetryPolicy,
    mut operation: F,
    mut on_failure: N,
) -> Result<T, ProviderError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
    N: FnMut(u32, &ProviderError),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(policy.attempt_timeout, operation(attempt)).await {
            Ok(r) => r,
            Err(_) => Err(ProviderError::Timeout),
        };
        match result {
            Ok(value) => return Ok(value),
            Err(e) => {
                on_failure(attempt, &e);
                if attempt >= max_attempts {
                    return Err(e);
                }
                let wait = policy.backoff_delay(attempt);
                debug!(attempt, max_attempts, wait_ms = wait.as_millis() as u64, "retrying after error: {e}");
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn backoff_is_clamped_between_bounds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(3));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(3));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(4), Duration::from_secs(5));
        assert_eq!(policy.backoff_delay(40), Duration::from_secs(5));
    }

    #[test]
    fn immediate_policy_never_waits() {
        let policy = RetryPolicy::immediate();
        assert_eq!(policy.max_attempts, MAX_ATTEMPTS);
        assert!(policy.backoff_delay(2).is_zero());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut seen = Vec::new();
        let c = calls.clone();
        let started = tokio::time::Instant::now();
        let res: Result<(), _> = with_retry(
            &RetryPolicy::default(),
            |_| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(ProviderError::Transport)
                }
            },
            |attempt, _| seen.push(attempt),
        )
        .await;
        assert_eq!(res, Err(ProviderError::Transport));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(seen, vec![1, 2, 3]);
        assert!(started.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_times_out_and_is_retried() {
        let res = with_retry(
            &RetryPolicy::immediate(),
            |attempt| async move {
                if attempt == 1 {
                    tokio::time::sleep(Duration::from_secs(31)).await;
                }
                Ok::<_, ProviderError>(attempt)
            },
            |_, e| assert_eq!(e, &ProviderError::Timeout),
        )
        .await;
        assert_eq!(res, Ok(2));
    }
}
