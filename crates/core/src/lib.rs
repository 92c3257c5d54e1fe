pub mod config;
pub mod error;
pub mod expander;
pub mod fallback;
pub mod fda;
pub mod image;
pub mod json_object;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod progress;
pub mod prompts;
pub mod traits;
pub mod vision;

#[cfg(test)]
mod test_server;

pub use config::ServiceConfig;
pub use error::AnalysisError;
pub use expander::{expand, SYNONYMS};
pub use fallback::{degraded_record, parse_synthesis, OpenRouterClient, FALLBACK_WARNINGS};
pub use fda::{
    candidate_queries, clean_term, format_fda_record, lookup, AttemptOutcome, Endpoint, FdaQuery,
    LookupOutcome, OpenFdaClient, SearchField,
};
pub use image::ImageInput;
pub use models::{ExtractedInfo, Extraction, MedicineRecord, RecordSource, Synthesis};
pub use normalizer::normalize;
pub use orchestrator::{AnalysisCoordinator, AnalysisRequest};
pub use progress::{ChannelPresenter, PipelineStep, PresentationEvent, Presenter, ProgressEvent};
pub use traits::{DrugDatabase, FallbackSynthesizer, VisionExtractor};
pub use vision::{parse_extraction, GeminiVisionClient};
