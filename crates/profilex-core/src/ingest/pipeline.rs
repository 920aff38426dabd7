use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::extractor::{ExtractionError, Extractor, ProfileExtractor};
use super::normalizer::{HtmlNormalizer, Normalizer};
use super::record::ExtractedRecord;
use crate::config::Settings;
use crate::error::FailureKind;
use crate::llm::{self, LlmError};
use crate::render::{self, RenderError, RenderedPage, Renderer};
use crate::sink::{JsonFileSink, RecordSink, SinkError};
use crate::target::{ProfileTarget, TargetError};

const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(45);

/// Where a request currently is. Stages only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Rendering,
    Normalizing,
    Extracting,
    Persisting,
    Done,
    /// A run that returned a [`PipelineError`]. The error's `stage` names the
    /// stage the run failed in.
    Failed,
}

impl PipelineStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Rendering => "rendering",
            Self::Normalizing => "normalizing",
            Self::Extracting => "extracting",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("Invalid identifier: {0}")]
    Target(#[from] TargetError),
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),
    #[error("Rendering timed out after {0:?}")]
    RenderTimeout(Duration),
    #[error("{0}")]
    Extraction(#[from] ExtractionError),
    #[error("Could not persist record: {0}")]
    Sink(#[from] SinkError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StageError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Target(_) | Self::Extraction(ExtractionError::InsufficientInput { .. }) => {
                FailureKind::BadInput
            }
            Self::Render(e) => {
                if e.is_timeout() {
                    FailureKind::Timeout
                } else {
                    FailureKind::ServiceUnavailable
                }
            }
            Self::RenderTimeout(_)
            | Self::Extraction(ExtractionError::Model(LlmError::Timeout)) => FailureKind::Timeout,
            Self::Extraction(ExtractionError::Model(_)) => FailureKind::ServiceUnavailable,
            Self::Sink(_) | Self::Internal(_) => FailureKind::Internal,
        }
    }
}

/// A failed run, now in [`PipelineStage::Failed`]: the stage it failed in,
/// why, and anything already computed.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: PipelineStage,
    #[source]
    pub source: StageError,
    /// Set when extraction succeeded but a later stage did not
    pub record: Option<ExtractedRecord>,
}

impl PipelineError {
    pub fn new(stage: PipelineStage, source: impl Into<StageError>) -> Self {
        Self {
            stage,
            source: source.into(),
            record: None,
        }
    }

    #[must_use]
    pub fn with_record(mut self, record: ExtractedRecord) -> Self {
        self.record = Some(record);
        self
    }

    pub fn kind(&self) -> FailureKind {
        self.source.kind()
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Renderer setup failed: {0}")]
    Render(#[from] RenderError),
    #[error("Model provider setup failed: {0}")]
    Provider(#[from] LlmError),
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub url: String,
    pub record: ExtractedRecord,
    pub sink_location: String,
    pub screenshot: Option<PathBuf>,
    pub captured_at: DateTime<Utc>,
    pub text_chars: usize,
}

/// Render → normalize → extract → persist, for one profile per call.
///
/// Holds only shared, immutable collaborators; concurrent `run` calls do not
/// contend on anything inside the pipeline.
pub struct ProfilePipeline {
    renderer: Arc<dyn Renderer>,
    normalizer: Arc<dyn Normalizer>,
    extractor: Arc<dyn Extractor>,
    sink: Arc<dyn RecordSink>,
    render_timeout: Duration,
}

impl ProfilePipeline {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        extractor: Arc<dyn Extractor>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            renderer,
            normalizer: Arc::new(HtmlNormalizer::default()),
            extractor,
            sink,
            render_timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }

    /// Wire up the production collaborators described by `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self, BuildError> {
        let renderer = render::create_renderer(&settings.render, &settings.screenshot_path())?;
        let provider = llm::create_provider(&settings.provider)?;
        let extractor = ProfileExtractor::new(provider);
        let sink = JsonFileSink::new(settings.record_path());

        Ok(Self::new(Arc::from(renderer), Arc::new(extractor), Arc::new(sink))
            .with_render_timeout(settings.render.timeout()))
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    #[must_use]
    pub fn with_normalizer(mut self, normalizer: Arc<dyn Normalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = extractor;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub const fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    pub fn renderer_name(&self) -> &'static str {
        self.renderer.name()
    }

    /// Run the whole pipeline for a username or profile URL.
    #[tracing::instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self, identifier: &str) -> Result<PipelineResult, PipelineError> {
        let run_id = Uuid::now_v7();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));

        let mut stage = PipelineStage::Idle;

        let target = ProfileTarget::resolve(identifier).map_err(|e| fail(stage, e))?;

        advance(&mut stage, PipelineStage::Rendering);
        let page = self.render(target.url()).await.map_err(|e| fail(stage, e))?;
        let RenderedPage {
            markup,
            screenshot,
            captured_at,
            ..
        } = page;

        advance(&mut stage, PipelineStage::Normalizing);
        let normalizer = Arc::clone(&self.normalizer);
        let text = tokio::task::spawn_blocking(move || normalizer.normalize(&markup))
            .await
            .map_err(|e| fail(stage, StageError::Internal(e.to_string())))?;
        let text_chars = text.chars().count();
        tracing::debug!(text_chars, "Normalized page text");

        advance(&mut stage, PipelineStage::Extracting);
        let record = self
            .extractor
            .extract(&text)
            .await
            .map_err(|e| fail(stage, e))?;

        advance(&mut stage, PipelineStage::Persisting);
        let sink_location = match self.sink.persist(&record).await {
            Ok(location) => location,
            Err(e) => return Err(fail(stage, e).with_record(record)),
        };

        advance(&mut stage, PipelineStage::Done);
        tracing::info!(
            url = target.url(),
            raw = record.is_raw(),
            location = %sink_location,
            "Profile extracted"
        );

        Ok(PipelineResult {
            run_id,
            url: target.into_url(),
            record,
            sink_location,
            screenshot,
            captured_at,
            text_chars,
        })
    }

    async fn render(&self, url: &str) -> Result<RenderedPage, StageError> {
        match tokio::time::timeout(self.render_timeout, self.renderer.render(url)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StageError::RenderTimeout(self.render_timeout)),
        }
    }
}

fn advance(stage: &mut PipelineStage, next: PipelineStage) {
    debug_assert!(next > *stage, "stage {stage} cannot move to {next}");
    tracing::debug!(from = %stage, to = %next, "Stage transition");
    *stage = next;
}

fn fail(stage: PipelineStage, source: impl Into<StageError>) -> PipelineError {
    let error = PipelineError::new(stage, source);
    let mut state = stage;
    advance(&mut state, PipelineStage::Failed);
    tracing::warn!(
        stage = %stage,
        kind = %error.kind(),
        error = %error.source,
        "Pipeline failed"
    );
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FakeProvider;
    use crate::render::StaticRenderer;
    use crate::sink::MemorySink;
    use serde_json::json;

    const JANE_RESPONSE: &str = r#"{"name":"Jane Doe","headline":"Senior Engineer","about":"","skills":[],"experience":[],"education":[]}"#;

    fn profile_page() -> String {
        format!(
            "<html><head><title>Jane Doe | Code360</title>\
             <script>window.__STATE__ = {{}};</script></head>\
             <body><h1>Jane Doe — Senior Engineer</h1><p>{}</p></body></html>",
            "Builds distributed systems and mentors engineers. ".repeat(4)
        )
    }

    struct Harness {
        pipeline: ProfilePipeline,
        renderer: Arc<StaticRenderer>,
        provider: Arc<FakeProvider>,
        sink: Arc<MemorySink>,
    }

    fn harness(renderer: StaticRenderer, provider: FakeProvider) -> Harness {
        let renderer = Arc::new(renderer);
        let provider = Arc::new(provider);
        let sink = Arc::new(MemorySink::new());
        let pipeline = ProfilePipeline::new(
            renderer.clone(),
            Arc::new(ProfileExtractor::new(provider.clone())),
            sink.clone(),
        );
        Harness {
            pipeline,
            renderer,
            provider,
            sink,
        }
    }

    #[derive(Debug)]
    struct BrokenSink;

    #[async_trait::async_trait]
    impl RecordSink for BrokenSink {
        async fn persist(&self, _record: &ExtractedRecord) -> crate::sink::SinkResult<String> {
            Err(SinkError::Io {
                path: PathBuf::from("/readonly/profile_data.json"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }
    }

    #[tokio::test]
    async fn test_end_to_end_profile() {
        let h = harness(
            StaticRenderer::new(profile_page()),
            FakeProvider::answering(JANE_RESPONSE),
        );

        let result = h.pipeline.run("jdoe123").await.unwrap();

        let expected: serde_json::Value = serde_json::from_str(JANE_RESPONSE).unwrap();
        assert_eq!(result.url, "https://www.naukri.com/code360/profile/jdoe123");
        assert_eq!(serde_json::to_value(&result.record).unwrap(), expected);
        assert_eq!(result.sink_location, "memory://records/0");

        let persisted = h.sink.last().unwrap();
        assert_eq!(persisted, result.record);
        assert_eq!(serde_json::to_value(&persisted).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_prompt_carries_visible_text_only() {
        let h = harness(
            StaticRenderer::new(profile_page()),
            FakeProvider::answering(JANE_RESPONSE),
        );

        h.pipeline.run("jdoe123").await.unwrap();

        let prompt = &h.provider.prompts()[0];
        assert!(prompt.contains("Jane Doe — Senior Engineer"));
        assert!(!prompt.contains("__STATE__"));
    }

    #[tokio::test]
    async fn test_full_url_reaches_renderer_unchanged() {
        let h = harness(
            StaticRenderer::new(profile_page()),
            FakeProvider::answering(JANE_RESPONSE),
        );
        let url = "https://www.naukri.com/code360/profile/jdoe123";

        h.pipeline.run(url).await.unwrap();

        assert_eq!(h.renderer.requested(), vec![url]);
    }

    #[tokio::test]
    async fn test_unparseable_output_is_still_a_success() {
        let h = harness(
            StaticRenderer::new(profile_page()),
            FakeProvider::answering("I cannot process this"),
        );

        let result = h.pipeline.run("jdoe123").await.unwrap();

        assert_eq!(
            serde_json::to_value(&result.record).unwrap(),
            json!({"raw": "I cannot process this"})
        );
        assert_eq!(h.sink.records().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_identifier_is_bad_input() {
        let h = harness(
            StaticRenderer::new(profile_page()),
            FakeProvider::answering(JANE_RESPONSE),
        );

        let err = h.pipeline.run("  ").await.unwrap_err();

        assert_eq!(err.stage, PipelineStage::Idle);
        assert_eq!(err.kind(), FailureKind::BadInput);
        assert!(h.renderer.requested().is_empty());
    }

    #[tokio::test]
    async fn test_schemeless_profile_url_is_bad_input() {
        let h = harness(
            StaticRenderer::new(profile_page()),
            FakeProvider::answering(JANE_RESPONSE),
        );

        let err = h
            .pipeline
            .run("naukri.com/code360/profile/jdoe123")
            .await
            .unwrap_err();

        assert_eq!(err.stage, PipelineStage::Idle);
        assert_eq!(err.kind(), FailureKind::BadInput);
        assert!(matches!(err.source, StageError::Target(TargetError::InvalidUrl(_))));
        assert!(h.renderer.requested().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_host_is_never_rendered() {
        let h = harness(
            StaticRenderer::new(profile_page()),
            FakeProvider::answering(JANE_RESPONSE),
        );

        let err = h
            .pipeline
            .run("http://169.254.169.254/?naukri.com")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::BadInput);
        assert!(matches!(err.source, StageError::Target(TargetError::ForeignHost(_))));
        assert!(h.renderer.requested().is_empty());
    }

    #[tokio::test]
    async fn test_render_failure_is_service_unavailable() {
        let h = harness(
            StaticRenderer::failing("chrome exited"),
            FakeProvider::answering(JANE_RESPONSE),
        );

        let err = h.pipeline.run("jdoe123").await.unwrap_err();

        assert_eq!(err.stage, PipelineStage::Rendering);
        assert_eq!(err.kind(), FailureKind::ServiceUnavailable);
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_render_times_out() {
        let h = harness(
            StaticRenderer::new(profile_page()).with_delay(Duration::from_secs(120)),
            FakeProvider::answering(JANE_RESPONSE),
        );
        let pipeline = h.pipeline.with_render_timeout(Duration::from_secs(30));

        let err = pipeline.run("jdoe123").await.unwrap_err();

        assert_eq!(err.stage, PipelineStage::Rendering);
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert!(matches!(err.source, StageError::RenderTimeout(_)));
    }

    #[tokio::test]
    async fn test_thin_page_is_bad_input_without_model_call() {
        let h = harness(
            StaticRenderer::new("<html><body><p>Profile not found</p></body></html>"),
            FakeProvider::answering(JANE_RESPONSE),
        );

        let err = h.pipeline.run("ghost").await.unwrap_err();

        assert_eq!(err.stage, PipelineStage::Extracting);
        assert_eq!(err.kind(), FailureKind::BadInput);
        assert_eq!(h.provider.call_count(), 0);
        assert!(h.sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_is_service_unavailable() {
        let h = harness(
            StaticRenderer::new(profile_page()),
            FakeProvider::new().with_scripted(Err(LlmError::ApiError {
                status: 401,
                message: "Invalid API Key".into(),
            })),
        );

        let err = h.pipeline.run("jdoe123").await.unwrap_err();

        assert_eq!(err.stage, PipelineStage::Extracting);
        assert_eq!(err.kind(), FailureKind::ServiceUnavailable);
    }

    #[tokio::test]
    async fn test_model_timeout_is_timeout() {
        let h = harness(
            StaticRenderer::new(profile_page()),
            FakeProvider::new().with_scripted(Err(LlmError::Timeout)),
        );

        let err = h.pipeline.run("jdoe123").await.unwrap_err();

        assert_eq!(err.kind(), FailureKind::Timeout);
    }

    #[tokio::test]
    async fn test_sink_failure_keeps_record() {
        let h = harness(
            StaticRenderer::new(profile_page()),
            FakeProvider::answering(JANE_RESPONSE),
        );
        let pipeline = h.pipeline.with_sink(Arc::new(BrokenSink));

        let err = pipeline.run("jdoe123").await.unwrap_err();

        assert_eq!(err.stage, PipelineStage::Persisting);
        assert_eq!(err.kind(), FailureKind::Internal);
        let record = err.record.expect("record should survive sink failure");
        assert_eq!(
            record.as_profile().and_then(|p| p.name.as_deref()),
            Some("Jane Doe")
        );
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_independent() {
        let h = harness(
            StaticRenderer::new(profile_page()),
            FakeProvider::answering(JANE_RESPONSE),
        );

        let (a, b) = tokio::join!(h.pipeline.run("alice"), h.pipeline.run("bob"));

        assert!(a.unwrap().url.ends_with("/alice"));
        assert!(b.unwrap().url.ends_with("/bob"));
        assert_eq!(h.sink.records().len(), 2);
        assert_eq!(h.provider.call_count(), 2);
    }

    #[test]
    fn test_stage_order() {
        assert!(PipelineStage::Idle < PipelineStage::Rendering);
        assert!(PipelineStage::Persisting < PipelineStage::Done);
        assert!(PipelineStage::Done.is_terminal());
        assert!(PipelineStage::Failed.is_terminal());
        assert!(!PipelineStage::Extracting.is_terminal());
    }

    #[test]
    fn test_failed_follows_every_running_stage() {
        for stage in [
            PipelineStage::Idle,
            PipelineStage::Rendering,
            PipelineStage::Normalizing,
            PipelineStage::Extracting,
            PipelineStage::Persisting,
        ] {
            assert!(!stage.is_terminal());
            assert!(PipelineStage::Failed > stage);
            let err = fail(stage, StageError::Internal("boom".into()));
            assert_eq!(err.stage, stage);
        }
    }

    #[test]
    fn test_error_display_names_stage() {
        let err = PipelineError::new(PipelineStage::Rendering, RenderError::Launch("boom".into()));
        assert_eq!(
            err.to_string(),
            "rendering failed: Render failed: Browser failed to launch: boom"
        );
    }
}
