use crate::fda::{AttemptOutcome, FdaQuery};
use crate::{AnalysisError, ExtractedInfo, Extraction, ImageInput, Synthesis};
use async_trait::async_trait;

#[async_trait]
pub trait VisionExtractor {
    async fn extract(&self, image: &ImageInput) -> Result<Extraction, AnalysisError>;
}

#[async_trait]
pub trait DrugDatabase {
    /// One lookup attempt; failures are reported in the outcome, never raised.
    async fn attempt(&self, query: &FdaQuery) -> AttemptOutcome;
}

#[async_trait]
pub trait FallbackSynthesizer {
    async fn synthesize(
        &self,
        info: &ExtractedInfo,
        image: &ImageInput,
    ) -> Result<Synthesis, AnalysisError>;
}
