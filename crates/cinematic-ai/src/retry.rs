//! Retry with exponential backoff for completion calls

use std::time::Duration;

use crate::{Completion, CompletionProvider, CompletionRequest, Result};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A config that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }

    /// Run a completion, retrying retryable failures.
    pub async fn complete(
        &self,
        provider: &dyn CompletionProvider,
        request: &CompletionRequest,
    ) -> Result<Completion> {
        let mut attempt = 0;
        loop {
            match provider.complete(request).await {
                Ok(completion) => return Ok(completion),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = e
                        .retry_after()
                        .map(|secs| Duration::from_secs(secs).min(self.max_delay))
                        .unwrap_or_else(|| self.delay_for_attempt(attempt));
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying completion"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
