#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod render;
pub mod sink;
pub mod target;

pub use config::{
    ApiKey, ConfigError, ProviderConfig, ProviderKind, RenderConfig, RendererKind, Settings,
};
pub use error::FailureKind;
pub use ingest::{
    BuildError, Education, Experience, ExtractedRecord, ExtractionError, Extractor,
    HtmlNormalizer, Normalizer, PipelineError, PipelineResult, PipelineStage, ProfileExtractor,
    ProfilePipeline, ProfileRecord, StageError,
};
pub use llm::{FakeProvider, GroqProvider, LlmError, LlmProvider, RetryPolicy, RetryingProvider};
pub use render::{
    ChromeRenderer, HttpRenderer, RenderError, RenderedPage, Renderer, StaticRenderer,
};
pub use sink::{JsonFileSink, MemorySink, RecordSink, SinkError};
pub use target::{ProfileTarget, TargetError};
