//! Bounded retry for flaky collaborator calls.

use std::future::Future;
use std::time::Duration;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
}

impl RetryConfig {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
        }
    }
}

/// Execute an async operation up to `config.max_attempts` times.
///
/// Delays double between attempts, capped at `config.max_delay`. Returns the
/// first success, or the last error once attempts are exhausted.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    let mut delay = config.initial_delay;

    loop {
        match operation(attempt).await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt >= config.max_attempts {
                    return Err(e);
                }

                tracing::warn!(
                    "Operation failed (attempt {}/{}): {}. Retrying in {:?}...",
                    attempt,
                    config.max_attempts,
                    e,
                    delay
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
                delay = (delay * 2).min(config.max_delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config(attempts: u32) -> RetryConfig {
        RetryConfig::new(attempts, Duration::from_millis(10), Duration::from_millis(100))
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_first_attempt() {
        let calls = AtomicU32::new(0);

        let result: Result<i32, &str> = with_retry(&config(2), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_on_second_attempt() {
        let result: Result<&str, &str> = with_retry(&config(2), |attempt| async move {
            if attempt < 2 {
                Err("temporary failure")
            } else {
                Ok("ok")
            }
        })
        .await;

        assert_eq!(result, Ok("ok"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausted_after_max_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<i32, &str> = with_retry(&config(2), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("permanent failure") }
        })
        .await;

        assert_eq!(result, Err("permanent failure"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        assert_eq!(config(0).max_attempts, 1);
    }
}
