mod extractor;
mod normalizer;
mod pipeline;
mod record;

pub use extractor::{
    build_prompt, clean_response, parse_response, ExtractionError, ExtractionResult, Extractor,
    ProfileExtractor, MIN_TEXT_CHARS,
};
pub use normalizer::{normalize, HtmlNormalizer, Normalizer, SKIPPED_ELEMENTS};
pub use pipeline::{
    BuildError, PipelineError, PipelineResult, PipelineStage, ProfilePipeline, StageError,
};
pub use record::{Education, Experience, ExtractedRecord, ProfileRecord, UNCOERCED_KEY};
