//! Text-generation providers used by the structured extractor.

mod fake;
mod groq;
mod retry;

pub use fake::FakeProvider;
pub use groq::GroqProvider;
pub use retry::{RetryPolicy, RetryingProvider};

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{ProviderConfig, ProviderKind};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("API returned error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Request timed out")]
    Timeout,

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl LlmError {
    /// Whether repeating the same request might succeed
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed(_) | Self::RateLimited { .. } | Self::Timeout => true,
            Self::ApiError { status, .. } => *status >= 500,
            Self::ParseError(_) | Self::NotConfigured(_) => false,
        }
    }
}

/// A text-generation backend.
///
/// Implementations are stateless per call and safe to share across requests.
#[async_trait]
pub trait LlmProvider: Send + Sync + fmt::Debug {
    /// Send a prompt and return the model's raw text answer.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    fn provider_name(&self) -> &'static str;

    fn model_name(&self) -> &str;
}

#[async_trait]
impl<P: LlmProvider + ?Sized> LlmProvider for Arc<P> {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        (**self).complete(prompt).await
    }

    fn provider_name(&self) -> &'static str {
        (**self).provider_name()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Build the configured provider, wrapped with retries.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let inner: Box<dyn LlmProvider> = match config.kind {
        ProviderKind::Fake => Box::new(FakeProvider::default()),
        ProviderKind::Groq => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| LlmError::NotConfigured("GROQ_API_KEY not set".to_string()))?;
            Box::new(GroqProvider::new(
                api_key,
                config.model.clone(),
                config.temperature,
                config.timeout(),
            )?)
        }
    };

    let policy = RetryPolicy::default().with_max_attempts(config.max_attempts);
    Ok(Arc::new(RetryingProvider::new(inner, policy)))
}
