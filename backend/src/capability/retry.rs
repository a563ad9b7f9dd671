use async_trait::async_trait;
use backoff::ExponentialBackoff;
use std::time::Duration;

use super::{CapabilityError, ModelCapability, ModelPrompt};

/// Retries transient failures of the wrapped capability with exponential
/// backoff. Shape failures and client errors are returned immediately.
pub struct RetryingCapability<C> {
    inner: C,
    max_retries: u32,
    initial_interval: Duration,
    max_interval: Duration,
}

impl<C: ModelCapability> RetryingCapability<C> {
    pub fn new(inner: C, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(4),
        }
    }

    pub fn with_intervals(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_interval = initial;
        self.max_interval = max;
        self
    }

    fn policy(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_interval,
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

#[async_trait]
impl<C: ModelCapability> ModelCapability for RetryingCapability<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, prompt: &ModelPrompt) -> Result<serde_json::Value, CapabilityError> {
        if self.max_retries == 0 {
            return self.inner.generate(prompt).await;
        }

        let inner = &self.inner;
        let max_retries = self.max_retries;
        let mut attempt: u32 = 0;

        backoff::future::retry(self.policy(), || {
            attempt += 1;
            let attempt = attempt;
            async move {
                inner.generate(prompt).await.map_err(|e| {
                    if e.is_transient() && attempt <= max_retries {
                        log::warn!(
                            "{} prompt '{}' attempt {}/{} failed, retrying: {}",
                            inner.name(),
                            prompt.name,
                            attempt,
                            max_retries + 1,
                            e
                        );
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        })
        .await
    }
}
