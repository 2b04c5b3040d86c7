//! Bounded retry with a per-attempt timeout and jittered exponential backoff.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a single attempt failed
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("attempt failed: {0}")]
    Failed(#[source] BoxError),
    #[error("attempt timed out after {0:?}")]
    TimedOut(Duration),
}

/// Every attempt failed
#[derive(Debug, Error)]
#[error("all {attempts} attempts failed")]
pub struct RetryError {
    pub attempts: u32,
    #[source]
    pub last: AttemptError,
}

/// How many times to try, how long each try may take, how long to wait
/// between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per logical call (N), at least 1
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(2),
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Run `operation` until it succeeds or the attempts run out.
    ///
    /// The closure receives the 1-based attempt number. A timeout counts as a
    /// failed attempt. Stops at the first success.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let outcome = tokio::time::timeout(self.attempt_timeout, operation(attempt)).await;
            let last = match outcome {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(error)) => AttemptError::Failed(error),
                Err(_) => AttemptError::TimedOut(self.attempt_timeout),
            };

            tracing::warn!(attempt, max_attempts = attempts, error = %last, "attempt failed");

            if attempt >= attempts {
                return Err(RetryError { attempts, last });
            }

            tokio::time::sleep(self.backoff(attempt)).await;
            attempt += 1;
        }
    }

    /// Delay before the retry that follows `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        calculate_backoff(
            attempt,
            self.base_delay.as_millis() as u64,
            self.max_delay.as_millis() as u64,
        )
    }
}

/// Exponential backoff with up to 10% jitter, capped at `max_ms` before jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            attempt_timeout: Duration::from_secs(1),
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        }
    }

    #[test]
    fn test_backoff_calculation() {
        assert_eq!(calculate_backoff(0, 100, 2000), Duration::ZERO);

        let b1 = calculate_backoff(1, 100, 2000);
        assert!(b1 >= Duration::from_millis(100) && b1 < Duration::from_millis(110));

        let b2 = calculate_backoff(2, 100, 2000);
        assert!(b2 >= Duration::from_millis(200));

        let capped = calculate_backoff(10, 100, 1000);
        assert!(capped >= Duration::from_millis(1000) && capped < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_first_success() {
        let calls = &AtomicU32::new(0);

        let result = policy(3)
            .run(move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, BoxError>(42)
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let result = policy(3)
            .run(|attempt| async move {
                if attempt < 3 {
                    Err::<u32, BoxError>("transient".into())
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts() {
        let calls = &AtomicU32::new(0);

        let result = policy(3)
            .run(move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), BoxError>("down".into())
            })
            .await;

        let error = result.unwrap_err();
        assert_eq!(error.attempts, 3);
        assert!(matches!(error.last, AttemptError::Failed(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let result = policy(2)
            .run(|_| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, BoxError>(())
            })
            .await;

        let error = result.unwrap_err();
        assert_eq!(error.attempts, 2);
        assert!(matches!(error.last, AttemptError::TimedOut(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_tries_once() {
        let calls = &AtomicU32::new(0);

        let _ = policy(0)
            .run(move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), BoxError>("down".into())
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
