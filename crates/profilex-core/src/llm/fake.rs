//! Fake provider for tests and offline runs.
//!
//! Answers are chosen by checking whether the prompt contains a registered
//! substring. A queue of scripted results, if present, takes precedence.

use super::{LlmError, LlmProvider};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
pub struct FakeProvider {
    /// (prompt substring, response), checked in insertion order
    responses: Vec<(String, String)>,
    default_response: Option<String>,
    scripted: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new().with_default_response("{}")
    }
}

impl FakeProvider {
    /// No registered responses; unmatched prompts fail.
    pub fn new() -> Self {
        Self {
            responses: Vec::new(),
            default_response: None,
            scripted: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answer with `response`.
    pub fn answering(response: &str) -> Self {
        Self::new().with_default_response(response)
    }

    pub fn with_response(mut self, prompt_contains: &str, response: &str) -> Self {
        self.responses
            .push((prompt_contains.to_lowercase(), response.to_string()));
        self
    }

    pub fn with_default_response(mut self, response: &str) -> Self {
        self.default_response = Some(response.to_string());
        self
    }

    /// Queue a result returned (once) before any matching happens.
    pub fn with_scripted(self, result: Result<String, LlmError>) -> Self {
        lock(&self.scripted).push_back(result);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl LlmProvider for FakeProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.prompts).push(prompt.to_string());

        if let Some(result) = lock(&self.scripted).pop_front() {
            return result;
        }

        let prompt_lower = prompt.to_lowercase();
        if let Some((_, response)) = self
            .responses
            .iter()
            .find(|(pattern, _)| prompt_lower.contains(pattern.as_str()))
        {
            return Ok(response.clone());
        }

        self.default_response.clone().ok_or_else(|| {
            let preview: String = prompt.chars().take(100).collect();
            LlmError::RequestFailed(format!(
                "FakeProvider: no response configured for prompt: {preview}"
            ))
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }
}
