use regex::Regex;
use std::sync::{Arc, LazyLock};
use thiserror::Error;

use super::record::{ExtractedRecord, ProfileRecord};
use crate::llm::{LlmError, LlmProvider};

/// Below this many characters of trimmed text no model call is made
pub const MIN_TEXT_CHARS: usize = 100;

const SCHEMA_DESCRIPTION: &str = r#"{
  "name": string,
  "headline": string,
  "about": string,
  "skills": [string, ...],
  "experience": [{"role": string, "company": string, "duration": string}],
  "education": [{"degree": string, "institute": string, "year": string}]
}"#;

/// Fence markers, with or without a `json` label
static FENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```(?:json)?").expect("Invalid fence regex"));

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Insufficient profile text: {length} characters (minimum {minimum})")]
    InsufficientInput { length: usize, minimum: usize },
    #[error("Model invocation failed: {0}")]
    Model(#[from] LlmError),
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    /// Turn normalized page text into a record.
    ///
    /// Output that is not a JSON object is returned as
    /// [`ExtractedRecord::Raw`], never as an error.
    async fn extract(&self, text: &str) -> ExtractionResult<ExtractedRecord>;
}

/// Extracts a [`ProfileRecord`] by prompting a language model.
#[derive(Debug, Clone)]
pub struct ProfileExtractor {
    provider: Arc<dyn LlmProvider>,
    min_chars: usize,
}

impl ProfileExtractor {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            min_chars: MIN_TEXT_CHARS,
        }
    }

    #[must_use]
    pub const fn with_min_chars(mut self, min_chars: usize) -> Self {
        self.min_chars = min_chars;
        self
    }

    pub fn provider(&self) -> &dyn LlmProvider {
        self.provider.as_ref()
    }

    fn check_length(&self, text: &str) -> ExtractionResult<()> {
        let length = text.trim().chars().count();
        if length < self.min_chars {
            return Err(ExtractionError::InsufficientInput {
                length,
                minimum: self.min_chars,
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Extractor for ProfileExtractor {
    async fn extract(&self, text: &str) -> ExtractionResult<ExtractedRecord> {
        self.check_length(text)?;

        let prompt = build_prompt(text);
        tracing::debug!(
            provider = self.provider.provider_name(),
            model = self.provider.model_name(),
            prompt_chars = prompt.len(),
            "Invoking model"
        );

        let response = self.provider.complete(&prompt).await?;
        let record = parse_response(&response);

        if record.is_raw() {
            tracing::warn!(
                response_chars = response.len(),
                "Model output is not a JSON object, keeping raw text"
            );
        }

        Ok(record)
    }
}

/// The fixed extraction instruction with `text` appended verbatim.
pub fn build_prompt(text: &str) -> String {
    format!(
        "You are a precise data extraction model.\n\
         Extract a structured JSON object from the profile text below using this schema:\n\
         {SCHEMA_DESCRIPTION}\n\
         Use null for anything the text does not state.\n\
         Return only the JSON object. No markdown, no code fences, no commentary.\n\n\
         Profile Text:\n{text}"
    )
}

/// Trim the model's answer and drop every code-fence marker in it.
pub fn clean_response(response: &str) -> String {
    FENCE_REGEX
        .replace_all(response.trim(), "")
        .trim()
        .to_string()
}

/// Parse a model answer, falling back to the raw text.
pub fn parse_response(response: &str) -> ExtractedRecord {
    let cleaned = clean_response(response);

    match serde_json::from_str::<serde_json::Value>(&cleaned) {
        Ok(value) => match ProfileRecord::from_value(value) {
            Some(profile) => ExtractedRecord::Profile(profile),
            None => ExtractedRecord::Raw { raw: cleaned },
        },
        Err(_) => ExtractedRecord::Raw { raw: cleaned },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FakeProvider;
    use serde_json::json;

    fn text_of(len: usize) -> String {
        "x".repeat(len)
    }

    fn extractor(fake: &Arc<FakeProvider>) -> ProfileExtractor {
        ProfileExtractor::new(fake.clone())
    }

    #[tokio::test]
    async fn test_short_text_is_rejected_without_model_call() {
        let fake = Arc::new(FakeProvider::answering("{}"));

        let result = extractor(&fake).extract(&text_of(50)).await;

        assert!(matches!(
            result,
            Err(ExtractionError::InsufficientInput {
                length: 50,
                minimum: 100
            })
        ));
        assert_eq!(fake.call_count(), 0);
    }

    #[tokio::test]
    async fn test_padding_does_not_count_towards_length() {
        let fake = Arc::new(FakeProvider::answering("{}"));
        let text = format!("   {}   \n\n", text_of(99));

        let result = extractor(&fake).extract(&text).await;

        assert!(matches!(result, Err(ExtractionError::InsufficientInput { length: 99, .. })));
    }

    #[tokio::test]
    async fn test_long_enough_text_invokes_model() {
        let fake = Arc::new(FakeProvider::answering(r#"{"name":"A"}"#));
        let text = text_of(150);

        let record = extractor(&fake).extract(&text).await.unwrap();

        assert_eq!(fake.call_count(), 1);
        assert_eq!(record.as_profile().unwrap().name.as_deref(), Some("A"));
        assert!(fake.prompts()[0].ends_with(&text));
    }

    #[tokio::test]
    async fn test_non_json_output_falls_back_to_raw() {
        let fake = Arc::new(FakeProvider::answering("I cannot process this"));

        let record = extractor(&fake).extract(&text_of(150)).await.unwrap();

        assert_eq!(
            record,
            ExtractedRecord::Raw {
                raw: "I cannot process this".into()
            }
        );
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let fake = Arc::new(FakeProvider::new().with_scripted(Err(LlmError::Timeout)));

        let result = extractor(&fake).extract(&text_of(150)).await;

        assert!(matches!(result, Err(ExtractionError::Model(LlmError::Timeout))));
    }

    #[test]
    fn test_fenced_and_plain_json_parse_identically() {
        let fenced = parse_response("```json\n{\"name\":\"A\"}\n```");
        let plain = parse_response(r#"{"name":"A"}"#);

        assert_eq!(fenced, plain);
        assert_eq!(plain.as_profile().unwrap().name.as_deref(), Some("A"));
    }

    #[test]
    fn test_fences_removed_regardless_of_position() {
        assert_eq!(clean_response("  ```JSON {\"a\":1} ```  "), r#"{"a":1}"#);
        assert_eq!(clean_response("{\"a\":1}\n```"), r#"{"a":1}"#);
        assert_eq!(clean_response("```\n{\"a\":1}"), r#"{"a":1}"#);
    }

    #[test]
    fn test_top_level_array_falls_back_to_raw() {
        let record = parse_response("```json\n[1, 2]\n```");
        assert_eq!(record.raw(), Some("[1, 2]"));
    }

    #[test]
    fn test_prompt_contains_schema_and_directive() {
        let prompt = build_prompt("Jane Doe\nSenior Engineer");

        assert!(prompt.contains("\"experience\": [{\"role\": string"));
        assert!(prompt.contains("Return only the JSON object"));
        assert!(prompt.ends_with("Profile Text:\nJane Doe\nSenior Engineer"));
    }

    #[test]
    fn test_partially_conforming_object_is_kept() {
        let record = parse_response(r#"{"name":"A","skills":"Rust, Go","age":30}"#);
        let profile = record.as_profile().unwrap();

        assert_eq!(profile.skills, vec!["Rust", "Go"]);
        assert_eq!(profile.extra["age"], json!(30));
    }
}
