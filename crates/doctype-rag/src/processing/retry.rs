//! Backoff for rate-limited hosted APIs

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::RetryConfig;
use crate::error::{Error, Result};

/// Exponential backoff with random jitter, applied only to rate-limit errors
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, doubled each time
    pub base_delay: Duration,
    /// Upper bound of the uniform jitter added to every delay
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_secs_f64(config.base_delay_secs.max(0.0)),
            max_jitter: Duration::from_secs_f64(config.max_jitter_secs.max(0.0)),
        }
    }

    /// Backoff before retry number `attempt` (0-based), without jitter
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Backoff before retry number `attempt` (0-based): `base * 2^attempt`
    /// plus up to `max_jitter`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter = if self.max_jitter.is_zero() {
            Duration::ZERO
        } else {
            rand::thread_rng().gen_range(Duration::ZERO..=self.max_jitter)
        };
        self.base_delay_for(attempt) + jitter
    }

    /// Run `op`, sleeping and retrying while it reports a rate limit.
    ///
    /// Other errors are returned immediately. When the first attempt and all
    /// `max_retries` retries are rate limited the result is
    /// [`Error::RetriesExhausted`].
    pub async fn run<F, Fut, T>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_rate_limited() => {
                    if retry >= self.max_retries {
                        tracing::error!(
                            "{}: still rate limited after {} attempts",
                            what,
                            retry + 1
                        );
                        return Err(Error::RetriesExhausted {
                            attempts: retry + 1,
                            last_error: e.to_string(),
                        });
                    }

                    let delay = self.delay_for(retry);
                    tracing::warn!(
                        "{}: rate limit hit, retrying in {:.1}s (retry {}/{})",
                        what,
                        delay.as_secs_f64(),
                        retry + 1,
                        self.max_retries
                    );
                    sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
