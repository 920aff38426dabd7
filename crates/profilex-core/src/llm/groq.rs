//! Groq chat-completions provider (OpenAI-compatible API).

use super::{LlmError, LlmProvider};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ApiKey;

const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";

#[derive(Debug)]
pub struct GroqProvider {
    api_key: ApiKey,
    model: String,
    temperature: f32,
    endpoint: String,
    client: reqwest::Client,
}

impl GroqProvider {
    pub fn new(
        api_key: ApiKey,
        model: String,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::NotConfigured(e.to_string()))?;

        Ok(Self {
            api_key,
            model,
            temperature,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client,
        })
    }

    /// Point at a different OpenAI-compatible endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn build_request(&self, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiErrorBody,
}

fn map_send_error(e: &reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::RequestFailed(e.to_string())
    }
}

fn parse_completion(body: &str) -> Result<String, LlmError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::ParseError(e.to_string()))?;

    response
        .choices
        .into_iter()
        .find_map(|c| c.message.content)
        .ok_or_else(|| LlmError::ParseError("No content in response".to_string()))
}

fn api_error(status: u16, body: String) -> LlmError {
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(error_response) => LlmError::ApiError {
            status,
            message: error_response.error.message,
        },
        Err(_) => LlmError::ApiError {
            status,
            message: body,
        },
    }
}

#[async_trait]
impl LlmProvider for GroqProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = self.build_request(prompt);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(&e))?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(LlmError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let body = response.text().await.map_err(|e| map_send_error(&e))?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), body));
        }

        parse_completion(&body)
    }

    fn provider_name(&self) -> &'static str {
        "groq"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
