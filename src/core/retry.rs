//! Retry utility for handling transient errors in async operations
//!
//! Provides bounded retry with exponential backoff. Callers decide which
//! errors are worth another attempt.

use std::time::Duration;
use tokio::time::sleep;

/// Configurable retry policy for async operations
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    /// Delay before the second attempt; doubles for every further attempt
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given (1-based) failed attempt
    pub fn delay_after(&self, attempt: usize) -> Duration {
        let exp = attempt.saturating_sub(1).min(16) as u32;
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.max_delay)
    }
}

/// Execute an async operation, retrying only errors accepted by `should_retry`
///
/// # Examples
/// ```rust
/// use commitscan::core::retry::{retry_async_when, RetryPolicy};
///
/// # async fn example() -> Result<String, String> {
/// let result = retry_async_when(
///     "component_lookup",
///     RetryPolicy::default(),
///     |error: &String| error.starts_with("503"),
///     || async { Ok::<String, String>("found".to_string()) },
/// )
/// .await?;
/// # Ok(result)
/// # }
/// ```
pub async fn retry_async_when<F, T, E, Fut, P>(
    operation_name: &str,
    policy: RetryPolicy,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) if attempt < max_attempts && should_retry(&error) => {
                let delay = policy.delay_after(attempt);
                log::debug!(
                    "Operation '{}' failed on attempt {}/{}, retrying in {:?}: {}",
                    operation_name,
                    attempt,
                    max_attempts,
                    delay,
                    error
                );
                sleep(delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}
