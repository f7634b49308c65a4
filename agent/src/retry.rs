use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Bounded exponential backoff. No jitter, no cap beyond the attempt count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; zero behaves as one.
    pub max_attempts: u32,
    /// Wait before the second attempt; doubles for each attempt after that.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// A policy that never retries.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Wait before 0-indexed `attempt`: zero for the first, then
    /// `base_delay * 2^(attempt - 1)`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        match attempt {
            0 => Duration::ZERO,
            n => self.base_delay.saturating_mul(2u32.saturating_pow(n - 1)),
        }
    }

    /// Run `op` until it succeeds or the attempts run out. The closure gets
    /// the 0-indexed attempt number. The final failure is returned as is.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            let delay = self.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 >= attempts => return Err(e),
                Err(e) => {
                    warn!(
                        attempt = attempt + 1,
                        of = attempts,
                        error = %e,
                        "Attempt failed, backing off"
                    );
                    attempt += 1;
                }
            }
        }
    }
}
