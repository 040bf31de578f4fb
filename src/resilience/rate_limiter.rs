//! Fixed-window request counter.
//!
//! One granted call consumes one unit no matter how many cells it batches.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::config::RateLimitConfig;

#[derive(Debug)]
pub struct FixedWindowLimiter {
    window: Duration,
    max_per_window: u32,
    window_start: Instant,
    requests_in_window: u32,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, max_per_window: u32) -> Self {
        Self {
            window,
            max_per_window: max_per_window.max(1),
            window_start: Instant::now(),
            requests_in_window: 0,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(Duration::from_millis(config.window_ms), config.max_per_window)
    }

    /// Take one unit of capacity, suspending until the window rolls over if it is spent.
    /// Returns how long the caller was suspended.
    pub async fn acquire(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.window_start);
        let mut waited = Duration::ZERO;

        if elapsed >= self.window {
            self.reset(now);
        } else if self.requests_in_window >= self.max_per_window {
            waited = self.window - elapsed;
            debug!(
                waited_ms = waited.as_millis() as u64,
                used = self.requests_in_window,
                "Rate limit window exhausted, waiting for reset"
            );
            tokio::time::sleep(waited).await;
            self.reset(Instant::now());
        }

        self.requests_in_window += 1;
        waited
    }

    /// Units left in the current window, without rolling it over.
    pub fn remaining(&self) -> u32 {
        self.max_per_window.saturating_sub(self.requests_in_window)
    }

    fn reset(&mut self, now: Instant) {
        self.window_start = now;
        self.requests_in_window = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_grants_immediately_within_capacity() {
        let mut limiter = FixedWindowLimiter::new(Duration::from_millis(1000), 3);
        let start = Instant::now();

        for _ in 0..3 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_window_suspends_for_remainder() {
        let mut limiter = FixedWindowLimiter::new(Duration::from_millis(1000), 2);
        limiter.acquire().await;
        limiter.acquire().await;

        tokio::time::advance(Duration::from_millis(400)).await;

        let start = Instant::now();
        let waited = limiter.acquire().await;

        assert_eq!(waited, Duration::from_millis(600));
        assert!(start.elapsed() >= Duration::from_millis(600));
        // Fresh window with this call already counted
        assert_eq!(limiter.remaining(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_window_resets_without_waiting() {
        let mut limiter = FixedWindowLimiter::new(Duration::from_millis(1000), 2);
        limiter.acquire().await;
        limiter.acquire().await;

        tokio::time::advance(Duration::from_millis(1001)).await;

        let start = Instant::now();
        assert_eq!(limiter.acquire().await, Duration::ZERO);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.remaining(), 1);
    }

    #[test]
    fn test_zero_cap_is_clamped() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(1), 0);
        assert_eq!(limiter.remaining(), 1);
    }
}
