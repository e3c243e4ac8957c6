//! Reusable retry policy for async operations.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// How long to wait after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base * 2^attempt`, attempts counted from 1.
    Exponential { base: Duration },
    /// Same delay after every failure.
    Fixed(Duration),
}

impl Backoff {
    /// Delay after the given failed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Exponential { base } => {
                base.saturating_mul(2u32.saturating_pow(attempt.min(16)))
            }
            Backoff::Fixed(d) => d,
        }
    }
}

/// Bounded sequential retries with backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    /// Three attempts, sleeping 2s then 4s.
    fn default() -> Self {
        Self::exponential(3)
    }
}

impl RetryPolicy {
    /// Exponential backoff with a one-second base.
    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Exponential {
                base: Duration::from_secs(1),
            },
        }
    }

    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..self
        }
    }

    /// Run `operation` until it succeeds or attempts run out.
    ///
    /// `operation` receives the 1-based attempt number. No sleep follows the
    /// final attempt; its error is returned as-is.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= max => {
                    tracing::warn!("attempt {attempt}/{max} failed, giving up: {err}");
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.backoff.delay(attempt);
                    tracing::warn!(
                        "attempt {attempt}/{max} failed: {err}; retrying in {}ms",
                        delay.as_millis()
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_exponential_delays() {
        let b = Backoff::Exponential {
            base: Duration::from_secs(1),
        };
        assert_eq!(b.delay(1), Duration::from_secs(2));
        assert_eq!(b.delay(2), Duration::from_secs(4));
        assert_eq!(b.delay(3), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_fail_succeed_waits_for_backoff() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<&str, String> = RetryPolicy::exponential(3)
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(format!("attempt {attempt} failed"))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let start = Instant::now();
        let result: Result<(), String> = RetryPolicy::exponential(2)
            .run(|attempt| async move { Err(format!("boom {attempt}")) })
            .await;

        assert_eq!(result, Err("boom 2".to_string()));
        // Only the sleep between attempt 1 and 2.
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(2) && waited < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_first_success_does_not_sleep() {
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff: Backoff::Fixed(Duration::from_secs(3600)),
        };
        let result: Result<u32, String> = policy.run(|attempt| async move { Ok(attempt) }).await;
        assert_eq!(result, Ok(1));
    }
}
