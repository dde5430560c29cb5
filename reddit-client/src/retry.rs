use std::future::Future;
use std::time::Duration;
use subsnap_core::{CoreError, RedditApiError};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Backoff policy for transient API failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Attempts in total, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Up to this fraction of the delay is added as random jitter.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn reddit() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            jitter_factor: 0.2,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based), jitter included.
    pub fn backoff(&self, retry: u32) -> Duration {
        let scaled = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(retry as i32);
        let capped = Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()));
        let jitter = capped.mul_f64(self.jitter_factor * fastrand::f64());
        (capped + jitter).min(self.max_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryStrategy {
    Backoff,
    /// The server said how long to wait.
    After(Duration),
    GiveUp,
}

impl RetryStrategy {
    pub fn for_error(error: &CoreError) -> Self {
        match error {
            CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after }) => {
                RetryStrategy::After(Duration::from_secs(*retry_after))
            }
            // Truncated bodies surface as InvalidResponse
            CoreError::RedditApi(
                RedditApiError::ServerError { .. }
                | RedditApiError::RequestTimeout
                | RedditApiError::InvalidResponse { .. },
            ) => RetryStrategy::Backoff,
            CoreError::Network(e) if e.is_timeout() || e.is_connect() => RetryStrategy::Backoff,
            _ => RetryStrategy::GiveUp,
        }
    }
}

/// Repeats one request while its failures are transient. When attempts run
/// out the last error is returned as-is.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub async fn execute<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut retry = 0u32;
        loop {
            let error = match operation().await {
                Ok(value) => {
                    if retry > 0 {
                        info!("{} succeeded after {} retries", operation_name, retry);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let delay = match RetryStrategy::for_error(&error) {
                RetryStrategy::GiveUp => {
                    debug!("{} failed permanently: {}", operation_name, error);
                    return Err(error);
                }
                _ if retry + 1 >= self.config.max_attempts => {
                    warn!(
                        "{} failed after {} attempts: {}",
                        operation_name, self.config.max_attempts, error
                    );
                    return Err(error);
                }
                RetryStrategy::Backoff => self.config.backoff(retry),
                RetryStrategy::After(delay) => delay,
            };

            info!("Retrying {} in {:?} after: {}", operation_name, delay, error);
            sleep(delay).await;
            retry += 1;
        }
    }
}
