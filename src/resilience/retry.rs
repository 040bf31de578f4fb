//! Bounded retry with linear backoff.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RetryConfig;
use crate::resilience::RemoteError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.base_delay_ms))
    }

    /// Delay slept after the zero-based `attempt` fails.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * (attempt + 1)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. The last error is returned to the caller.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if !e.is_retryable() => {
                    warn!(attempt = attempt + 1, error = %e, "Non-retryable failure");
                    return Err(e);
                }
                Err(e) => {
                    if attempt + 1 >= self.max_attempts {
                        warn!(
                            attempts = self.max_attempts,
                            error = %e,
                            "Retry budget exhausted"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tokio::time::Instant;

    #[test]
    fn test_delay_grows_linearly() {
        let policy = RetryPolicy::new(5, Duration::from_millis(250));
        assert_eq!(policy.delay_for(0), Duration::from_millis(250));
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(3), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_429_gives_up_after_budget() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        let calls = RefCell::new(Vec::new());

        let result: Result<(), RemoteError> = policy
            .run(|| {
                calls.borrow_mut().push(Instant::now());
                async { Err(RemoteError::Status(429)) }
            })
            .await;

        assert!(matches!(result, Err(RemoteError::Status(429))));

        let calls = calls.into_inner();
        assert_eq!(calls.len(), 5);

        let gaps: Vec<Duration> = calls.windows(2).map(|w| w[1] - w[0]).collect();
        for pair in gaps.windows(2) {
            assert!(pair[1] > pair[0], "delays must strictly increase: {gaps:?}");
        }
        assert!(gaps[0] >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_fast() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        let calls = RefCell::new(0u32);

        let result: Result<(), RemoteError> = policy
            .run(|| {
                *calls.borrow_mut() += 1;
                async { Err(RemoteError::Status(400)) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.into_inner(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let policy = RetryPolicy::new(5, Duration::from_millis(10));
        let calls = RefCell::new(0u32);

        let result = policy
            .run(|| {
                let n = {
                    let mut calls = calls.borrow_mut();
                    *calls += 1;
                    *calls
                };
                async move {
                    if n < 3 {
                        Err(RemoteError::Network("connection reset".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
    }
}
