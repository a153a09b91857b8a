//! Retry logic for read-only network calls.
//!
//! Aggregator and node reads are retried with exponential backoff. Wallet prompts
//! and transaction broadcasts never go through here.

use crate::config::SwapConfig;
use crate::error::{Result, RetryContext, SwapError};
use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry strategy configuration
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    /// Maximum number of retries
    pub max_retries: usize,
    /// Initial retry delay
    pub initial_delay: Duration,
    /// Maximum retry delay
    pub max_delay: Duration,
    /// Backoff multiplier
    pub multiplier: f64,
}

impl RetryStrategy {
    /// Create a new retry strategy from the swap config
    pub fn from_config(config: &SwapConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.retry_initial_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            multiplier: config.retry_multiplier,
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_delay)
            .with_max_interval(self.max_delay)
            .with_multiplier(self.multiplier)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Check if an error is retryable
    pub fn is_retryable(error: &SwapError) -> bool {
        match error {
            SwapError::NetworkError(_) => true,
            SwapError::RateLimitExceeded(_) => true,
            SwapError::Aggregator { status, .. } => *status == 429 || *status >= 500,
            // -32005 is the common "limit exceeded" code of hosted nodes
            SwapError::Rpc { code, .. } => *code == -32005 || *code == -32603,
            SwapError::InvalidResponse(_) => true,
            _ => false,
        }
    }

    /// Execute a function with the default retry predicate
    pub async fn retry<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.retry_with_predicate(operation, Self::is_retryable)
            .await
    }

    /// Execute a function with retry logic and custom retry predicate
    pub async fn retry_with_predicate<F, Fut, T, P>(
        &self,
        operation: F,
        should_retry: P,
    ) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&SwapError) -> bool,
    {
        let mut backoff = self.create_backoff();
        let mut retry_ctx = RetryContext::new();

        loop {
            debug!(
                "Attempt {} of {}",
                retry_ctx.attempts + 1,
                self.max_retries + 1
            );

            match operation().await {
                Ok(result) => {
                    if retry_ctx.attempts > 0 {
                        debug!(
                            "Operation succeeded after {} retries ({} ms backing off)",
                            retry_ctx.attempts, retry_ctx.total_time_ms
                        );
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !should_retry(&error) {
                        debug!("Non-retryable error: {:?}", error);
                        return Err(error);
                    }

                    if retry_ctx.attempts >= self.max_retries {
                        warn!(
                            "Max retries ({}) exceeded. Last error: {:?}",
                            self.max_retries, error
                        );
                        return Err(SwapError::MaxRetriesExceeded(self.max_retries));
                    }

                    let delay = match backoff.next_backoff() {
                        Some(d) => d,
                        None => {
                            warn!("Backoff exhausted");
                            return Err(SwapError::MaxRetriesExceeded(self.max_retries));
                        }
                    };

                    retry_ctx.record_attempt(&error.to_string(), delay.as_millis() as u64);

                    warn!(
                        "Attempt {} failed: {}. Retrying in {:?}",
                        retry_ctx.attempts, retry_ctx.last_error, delay
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
