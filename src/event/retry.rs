use std::future::Future;
use std::time::Duration;

use crate::config::{IndexerConfig, StreamConfig};
use crate::repository::RepositoryError;

/// Largest exponent applied to the base delay.
const MAX_BACKOFF_SHIFT: u32 = 16;

/// Exponential backoff: the n-th retry waits `base_delay * 2^(n-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn for_indexer(config: &IndexerConfig) -> Self {
        Self::new(config.max_retries, Duration::from_millis(config.base_delay_ms))
    }

    pub fn for_stream(config: &StreamConfig) -> Self {
        Self::new(
            config.max_reconnect_attempts,
            Duration::from_millis(config.reconnect_base_delay_ms),
        )
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        self.base_delay.saturating_mul(1 << shift)
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or the
    /// retries run out. The last error is returned on exhaustion.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, RepositoryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RepositoryError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= self.max_retries => {
                    tracing::error!("{what} failed after {} attempts: {e}", attempt + 1);
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "{what} failed ({e}), retry {attempt}/{} in {delay:?}",
                        self.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_doubles_per_attempt() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        assert_eq!(policy.delay_for(100), policy.delay_for(MAX_BACKOFF_SHIFT + 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(100));

        let result = policy
            .run("fetch", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(RepositoryError::NetworkError("reset".into()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(100));

        let result: Result<(), _> = policy
            .run("fetch", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(RepositoryError::RateLimited(format!("attempt {n}")))
            })
            .await;

        assert!(matches!(result, Err(RepositoryError::RateLimited(msg)) if msg == "attempt 2"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(100));

        let result: Result<(), _> = policy
            .run("fetch", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RepositoryError::RangeTooLarge("10000 results".into()))
            })
            .await;

        assert!(matches!(result, Err(RepositoryError::RangeTooLarge(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
