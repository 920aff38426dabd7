//! Bounded exponential backoff around another provider.

use super::{LlmError, LlmProvider};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Add up to 25% random delay on top of the computed backoff
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Never retry
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay before retry number `retry` (1-based), honoring a server hint.
    pub fn delay_for(&self, retry: u32, error: &LlmError) -> Duration {
        if let LlmError::RateLimited {
            retry_after_secs: Some(secs),
        } = error
        {
            return Duration::from_secs(*secs).min(self.max_delay);
        }

        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);

        if self.jitter && !delay.is_zero() {
            let max_extra = u64::try_from(delay.as_millis() / 4).unwrap_or(u64::MAX);
            let extra = rand::rng().random_range(0..=max_extra);
            return (delay + Duration::from_millis(extra)).min(self.max_delay);
        }

        delay
    }
}

#[derive(Debug)]
pub struct RetryingProvider {
    inner: Box<dyn LlmProvider>,
    policy: RetryPolicy,
}

impl RetryingProvider {
    pub fn new(inner: Box<dyn LlmProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl LlmProvider for RetryingProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let mut attempt = 1;
        loop {
            match self.inner.complete(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempt, &e);
                    tracing::warn!(
                        provider = self.inner.provider_name(),
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Model call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
