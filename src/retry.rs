//! Retry utilities with exponential backoff
//!
//! The HTTP backends wrap each completion request in one of these helpers when their
//! [`HttpSettings`](crate::HttpSettings) carry a [`RetryConfig`]. Retrying happens strictly
//! below the tool-calling loop: one logical completion request may be sent several times,
//! but a tool is never re-executed and loop errors are never retried.
//!
//! Both an async flavour (`tokio::time::sleep`) and a blocking flavour
//! (`std::thread::sleep`) are provided.
//!
//! # Examples
//!
//! ```rust,no_run
//! use structured_llm::retry::{retry_with_backoff_conditional, RetryConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RetryConfig::default()
//!     .with_max_attempts(3)
//!     .with_initial_delay(Duration::from_millis(250));
//!
//! let value = retry_with_backoff_conditional(&config, || async {
//!     Ok::<_, structured_llm::Error>(42)
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Upper bound for any single delay
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (2.0 doubles the delay each time)
    pub backoff_multiplier: f64,

    /// Random jitter as a fraction of the delay (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set jitter factor, clamped to 0.0..=1.0
    pub fn with_jitter_factor(mut self, jitter: f64) -> Self {
        self.jitter_factor = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `attempt + 1`: exponential growth, capped, then jittered
    /// symmetrically around the capped value.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let exponential = base_ms * self.backoff_multiplier.powi(attempt as i32);
        let capped = exponential.min(self.max_delay.as_millis() as f64);

        let jitter_range = capped * self.jitter_factor;
        let jitter = rand::random::<f64>() * jitter_range;
        let final_ms = capped + jitter - (jitter_range / 2.0);

        Duration::from_millis(final_ms.max(0.0) as u64)
    }

    fn is_last(&self, attempt: u32) -> bool {
        attempt + 1 >= self.max_attempts
    }
}

/// Whether an error is worth retrying.
///
/// True for transport failures: network errors, timeouts and 5xx responses. Everything
/// raised by the tool-calling loop or by response validation is final.
pub fn is_retryable_error(error: &Error) -> bool {
    error.is_retryable()
}

/// Retry an async operation, giving up immediately on non-retryable errors
pub async fn retry_with_backoff_conditional<F, Fut, T>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !is_retryable_error(&err) || config.is_last(attempt) => return Err(err),
            Err(err) => {
                let delay = config.delay_for(attempt);
                warn!(attempt = attempt + 1, ?delay, error = %err, "retrying after transient failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Blocking counterpart of [`retry_with_backoff_conditional`]
pub fn retry_blocking_conditional<F, T>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) if !is_retryable_error(&err) || config.is_last(attempt) => return Err(err),
            Err(err) => {
                let delay = config.delay_for(attempt);
                warn!(attempt = attempt + 1, ?delay, error = %err, "retrying after transient failure");
                std::thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(3)
            .with_initial_delay(Duration::from_millis(5))
            .with_jitter_factor(0.0)
    }

    #[test]
    fn test_retry_config_builder() {
        let config = RetryConfig::new()
            .with_max_attempts(5)
            .with_initial_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(30))
            .with_backoff_multiplier(1.5)
            .with_jitter_factor(2.0);

        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.initial_delay, Duration::from_millis(500));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.backoff_multiplier, 1.5);
        assert_eq!(config.jitter_factor, 1.0);
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        assert_eq!(RetryConfig::new().with_max_attempts(0).max_attempts, 1);
    }

    #[test]
    fn test_delay_growth_and_cap() {
        let config = RetryConfig::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(3))
            .with_jitter_factor(0.0);

        assert_eq!(config.delay_for(0), Duration::from_secs(1));
        assert_eq!(config.delay_for(1), Duration::from_secs(2));
        assert_eq!(config.delay_for(2), Duration::from_secs(3));
        assert_eq!(config.delay_for(5), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result = retry_with_backoff_conditional(&fast(), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(Error::timeout())
                } else {
                    Ok::<i32, Error>(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result = retry_with_backoff_conditional(&fast().with_max_attempts(2), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, Error>(Error::timeout()) }
        })
        .await;

        assert!(matches!(result, Err(Error::Timeout)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_conditional_stops_on_client_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result = retry_with_backoff_conditional(&fast(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, Error>(Error::api_status(StatusCode::BAD_REQUEST, "nope")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_blocking_conditional_retries_server_errors() {
        let mut calls = 0;
        let result = retry_blocking_conditional(&fast(), || {
            calls += 1;
            if calls < 2 {
                Err(Error::api_status(StatusCode::SERVICE_UNAVAILABLE, "busy"))
            } else {
                Ok("done")
            }
        });

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_blocking_retry_never_retries_loop_errors() {
        let mut calls = 0;
        let result: Result<()> = retry_blocking_conditional(&fast(), || {
            calls += 1;
            Err(Error::max_recursion(3, 3))
        });

        assert!(matches!(result, Err(Error::MaxRecursion { .. })));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_is_retryable_error() {
        assert!(is_retryable_error(&Error::timeout()));
        assert!(is_retryable_error(&Error::api_status(StatusCode::INTERNAL_SERVER_ERROR, "x")));
        assert!(!is_retryable_error(&Error::config("Invalid config")));
        assert!(!is_retryable_error(&Error::invalid_input("Bad input")));
        assert!(!is_retryable_error(&Error::function_execution("c", "f", "boom")));
    }
}
