use crate::expander::expand;
use crate::fda::{lookup, LookupOutcome};
use crate::progress::{PipelineStep, Presenter, ProgressEvent};
use crate::traits::{DrugDatabase, FallbackSynthesizer, VisionExtractor};
use crate::{AnalysisError, ImageInput, MedicineRecord};
use tokio::sync::Mutex;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Everything one analysis run needs; nothing is carried between runs.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub run_id: Uuid,
    pub image: Option<ImageInput>,
}

impl AnalysisRequest {
    pub fn new(image: Option<ImageInput>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            image,
        }
    }

    pub fn with_image(image: ImageInput) -> Self {
        Self::new(Some(image))
    }
}

pub struct AnalysisCoordinator<V, D, F>
where
    V: VisionExtractor,
    D: DrugDatabase,
    F: FallbackSynthesizer,
{
    vision: V,
    database: D,
    fallback: F,
    run_guard: Mutex<()>,
}

impl<V, D, F> AnalysisCoordinator<V, D, F>
where
    V: VisionExtractor + Send + Sync,
    D: DrugDatabase + Send + Sync,
    F: FallbackSynthesizer + Send + Sync,
{
    pub fn new(vision: V, database: D, fallback: F) -> Self {
        Self {
            vision,
            database,
            fallback,
            run_guard: Mutex::new(()),
        }
    }

    /// Runs image analysis, name generation, FDA search and, if needed, the AI fallback.
    ///
    /// The presenter sees exactly one `result` or one `error`. A second call while a
    /// run is in flight is rejected with [`AnalysisError::Busy`].
    pub async fn analyze<P>(
        &self,
        request: &AnalysisRequest,
        presenter: &P,
    ) -> Result<MedicineRecord, AnalysisError>
    where
        P: Presenter + ?Sized,
    {
        let Ok(_guard) = self.run_guard.try_lock() else {
            warn!(run_id = %request.run_id, "analysis rejected; another run is in flight");
            let error = AnalysisError::Busy;
            presenter.error(&error.to_string());
            return Err(error);
        };

        presenter.reset();
        let outcome = self.run(request, presenter).await;

        match &outcome {
            Ok(record) => presenter.result(record),
            Err(error) => {
                warn!(run_id = %request.run_id, %error, "analysis failed");
                presenter.error(&error.to_string());
            }
        }

        outcome
    }

    async fn run<P>(
        &self,
        request: &AnalysisRequest,
        presenter: &P,
    ) -> Result<MedicineRecord, AnalysisError>
    where
        P: Presenter + ?Sized,
    {
        let Some(image) = request.image.as_ref() else {
            return Err(AnalysisError::Precondition(
                "Please select an image file first".to_string(),
            ));
        };

        let span = info_span!(
            "analysis",
            run_id = %request.run_id,
            image_bytes = image.bytes().len(),
            image_sha256 = %image.fingerprint(),
        );

        self.stages(image, presenter).instrument(span).await
    }

    async fn stages<P>(
        &self,
        image: &ImageInput,
        presenter: &P,
    ) -> Result<MedicineRecord, AnalysisError>
    where
        P: Presenter + ?Sized,
    {
        presenter.progress(&ProgressEvent::started(
            PipelineStep::ImageAnalysis,
            "Analyzing image with AI...",
        ));
        let extraction = self.vision.extract(image).await?;
        if extraction.is_degraded() {
            info!("extraction degraded to raw text");
        }
        presenter.progress(&ProgressEvent::finished(
            PipelineStep::ImageAnalysis,
            "Image analysis complete",
        ));
        let extracted = extraction.into_info();

        presenter.progress(&ProgressEvent::started(
            PipelineStep::NameGeneration,
            "Generating search variations...",
        ));
        let terms = expand(&extracted);
        info!(?terms, "search terms generated");
        presenter.progress(&ProgressEvent::finished(
            PipelineStep::NameGeneration,
            "Search terms generated",
        ));

        presenter.progress(&ProgressEvent::started(
            PipelineStep::FdaSearch,
            "Searching FDA database...",
        ));
        let outcome = lookup(&self.database, &terms).await;
        let attempts = outcome.attempts();
        match outcome {
            LookupOutcome::Found { record, .. } => {
                presenter.progress(&ProgressEvent::finished(
                    PipelineStep::FdaSearch,
                    "Found in FDA database",
                ));
                return Ok(record);
            }
            LookupOutcome::NotFound { .. } => {
                info!(attempts, "no FDA match; falling back to AI synthesis");
                presenter.progress(&ProgressEvent::finished(
                    PipelineStep::FdaSearch,
                    "Not found in FDA database",
                ));
            }
        }

        presenter.progress(&ProgressEvent::started(
            PipelineStep::AiFallback,
            "Using AI fallback for analysis...",
        ));
        let synthesis = self.fallback.synthesize(&extracted, image).await?;
        if synthesis.is_degraded() {
            info!("fallback synthesis degraded to extracted fields");
        }
        presenter.progress(&ProgressEvent::finished(
            PipelineStep::AiFallback,
            "AI analysis complete",
        ));

        Ok(synthesis.into_record())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::parse_synthesis;
    use crate::fda::{AttemptOutcome, Endpoint, FdaQuery, SearchField};
    use crate::progress::{ChannelPresenter, PresentationEvent};
    use crate::{ExtractedInfo, Extraction, RecordSource, Synthesis};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
    use tokio::sync::Notify;

    enum VisionScript {
        Answer(Extraction),
        Status(u16),
    }

    struct FakeVision {
        script: VisionScript,
        gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    impl FakeVision {
        fn answering(info: ExtractedInfo) -> Self {
            Self {
                script: VisionScript::Answer(Extraction::Structured(info)),
                gate: None,
            }
        }
    }

    #[async_trait]
    impl VisionExtractor for FakeVision {
        async fn extract(&self, _image: &ImageInput) -> Result<Extraction, AnalysisError> {
            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            match &self.script {
                VisionScript::Answer(extraction) => Ok(extraction.clone()),
                VisionScript::Status(status) => Err(AnalysisError::ExternalService {
                    service: "Gemini".to_string(),
                    status: *status,
                }),
            }
        }
    }

    /// Hits only on the given (endpoint, field, term); records every query.
    #[derive(Default)]
    struct FakeDatabase {
        hit: Option<(Endpoint, SearchField, &'static str)>,
        seen: StdMutex<Vec<FdaQuery>>,
    }

    impl FakeDatabase {
        fn requests(&self) -> usize {
            self.seen.lock().expect("lock").len()
        }
    }

    #[async_trait]
    impl DrugDatabase for FakeDatabase {
        async fn attempt(&self, query: &FdaQuery) -> AttemptOutcome {
            self.seen.lock().expect("lock").push(query.clone());
            match self.hit {
                Some((endpoint, field, term))
                    if query.endpoint == endpoint && query.field == field && query.term == term =>
                {
                    AttemptOutcome::Hit(json!({
                        "openfda": {
                            "brand_name": ["Tylenol"],
                            "generic_name": ["ACETAMINOPHEN"],
                            "substance_name": ["ACETAMINOPHEN"]
                        },
                        "warnings": ["Liver warning"]
                    }))
                }
                _ => AttemptOutcome::Miss,
            }
        }
    }

    /// Feeds a canned model answer through the real response parser.
    struct FakeFallback {
        content: &'static str,
        calls: AtomicUsize,
    }

    impl FakeFallback {
        fn answering(content: &'static str) -> Self {
            Self {
                content,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FallbackSynthesizer for FakeFallback {
        async fn synthesize(
            &self,
            info: &ExtractedInfo,
            _image: &ImageInput,
        ) -> Result<Synthesis, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(parse_synthesis(self.content, info))
        }
    }

    fn image() -> ImageInput {
        ImageInput::new(b"fake jpeg".to_vec(), "image/jpeg").expect("valid image")
    }

    fn presenter() -> (ChannelPresenter, UnboundedReceiver<PresentationEvent>) {
        let (sender, receiver) = unbounded_channel();
        (ChannelPresenter::new(sender), receiver)
    }

    fn drain(receiver: &mut UnboundedReceiver<PresentationEvent>) -> Vec<PresentationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    fn progress_trail(events: &[PresentationEvent]) -> Vec<(&'static str, bool)> {
        events
            .iter()
            .filter_map(|event| match event {
                PresentationEvent::Progress(progress) => {
                    Some((progress.step.id(), progress.completed))
                }
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn tylenol_package_resolves_from_fda_label_generic_name() {
        let vision = FakeVision::answering(ExtractedInfo {
            brand_name: Some("Tylenol".to_string()),
            generic_name: Some("acetaminophen".to_string()),
            dosage: Some("500mg".to_string()),
            ..ExtractedInfo::default()
        });
        let database = FakeDatabase {
            hit: Some((Endpoint::Label, SearchField::GenericName, "acetaminophen")),
            ..FakeDatabase::default()
        };
        let coordinator =
            AnalysisCoordinator::new(vision, database, FakeFallback::answering("{}"));
        let (presenter, mut events) = presenter();

        let record = coordinator
            .analyze(&AnalysisRequest::with_image(image()), &presenter)
            .await
            .expect("analysis should succeed");

        assert_eq!(record.source, RecordSource::Fda);
        assert_eq!(record.generic_name.as_deref(), Some("ACETAMINOPHEN"));
        // label/brand_name x4 terms, then Tylenol, tylenol, acetaminophen under generic_name
        assert_eq!(coordinator.database.requests(), 7);
        assert_eq!(coordinator.fallback.calls.load(Ordering::SeqCst), 0);

        let events = drain(&mut events);
        assert_eq!(events.first(), Some(&PresentationEvent::Reset));
        assert_eq!(
            progress_trail(&events),
            vec![
                ("image_analysis", false),
                ("image_analysis", true),
                ("name_generation", false),
                ("name_generation", true),
                ("fda_search", false),
                ("fda_search", true),
            ]
        );
        assert_eq!(events.last(), Some(&PresentationEvent::Result(record)));
    }

    #[tokio::test]
    async fn unreadable_package_skips_lookup_and_uses_fallback() {
        let vision = FakeVision::answering(ExtractedInfo::from_raw_text("Unknown Pill XJ9"));
        let coordinator = AnalysisCoordinator::new(
            vision,
            FakeDatabase::default(),
            FakeFallback::answering(
                r#"{"brand_name": "XJ9", "warnings": ["Unverified product"], "source": "ai"}"#,
            ),
        );
        let (presenter, mut events) = presenter();

        let record = coordinator
            .analyze(&AnalysisRequest::with_image(image()), &presenter)
            .await
            .expect("analysis should succeed");

        assert_eq!(coordinator.database.requests(), 0);
        assert_eq!(coordinator.fallback.calls.load(Ordering::SeqCst), 1);
        assert_eq!(record.source, RecordSource::Ai);
        assert_eq!(record.brand_name.as_deref(), Some("XJ9"));

        let trail = progress_trail(&drain(&mut events));
        assert_eq!(
            trail[4..].to_vec(),
            vec![
                ("fda_search", false),
                ("fda_search", true),
                ("ai_fallback", false),
                ("ai_fallback", true),
            ]
        );
    }

    #[tokio::test]
    async fn unparsable_fallback_still_ends_with_a_record() {
        let vision = FakeVision::answering(ExtractedInfo {
            brand_name: Some("Dolo-650".to_string()),
            ..ExtractedInfo::default()
        });
        let coordinator = AnalysisCoordinator::new(
            vision,
            FakeDatabase::default(),
            FakeFallback::answering("I am not sure what this is."),
        );
        let (presenter, mut events) = presenter();

        let record = coordinator
            .analyze(&AnalysisRequest::with_image(image()), &presenter)
            .await
            .expect("degraded fallback is not an error");

        assert!(coordinator.database.requests() > 0);
        assert_eq!(record.source, RecordSource::AiFallback);
        assert!(!record.warnings.is_empty());
        assert_eq!(record.brand_name.as_deref(), Some("Dolo-650"));
        assert!(matches!(
            drain(&mut events).last(),
            Some(PresentationEvent::Result(_))
        ));
    }

    #[tokio::test]
    async fn missing_image_fails_before_any_request() {
        let coordinator = AnalysisCoordinator::new(
            FakeVision::answering(ExtractedInfo::default()),
            FakeDatabase::default(),
            FakeFallback::answering("{}"),
        );
        let (presenter, mut events) = presenter();

        let result = coordinator
            .analyze(&AnalysisRequest::new(None), &presenter)
            .await;

        assert!(matches!(result, Err(AnalysisError::Precondition(_))));
        assert_eq!(coordinator.database.requests(), 0);
        assert_eq!(
            drain(&mut events),
            vec![
                PresentationEvent::Reset,
                PresentationEvent::Error("Please select an image file first".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn vision_failure_aborts_with_single_error_and_no_result() {
        let vision = FakeVision {
            script: VisionScript::Status(503),
            gate: None,
        };
        let coordinator = AnalysisCoordinator::new(
            vision,
            FakeDatabase::default(),
            FakeFallback::answering("{}"),
        );
        let (presenter, mut events) = presenter();

        let result = coordinator
            .analyze(&AnalysisRequest::with_image(image()), &presenter)
            .await;

        assert!(matches!(
            result,
            Err(AnalysisError::ExternalService { status: 503, .. })
        ));
        assert_eq!(coordinator.fallback.calls.load(Ordering::SeqCst), 0);

        let events = drain(&mut events);
        let errors = events
            .iter()
            .filter(|event| matches!(event, PresentationEvent::Error(_)))
            .collect::<Vec<_>>();
        assert_eq!(errors, vec![&PresentationEvent::Error("Gemini API error: 503".to_string())]);
        assert!(!events
            .iter()
            .any(|event| matches!(event, PresentationEvent::Result(_))));
    }

    #[tokio::test]
    async fn concurrent_run_is_rejected_while_one_is_in_flight() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let vision = FakeVision {
            script: VisionScript::Answer(Extraction::Structured(ExtractedInfo::default())),
            gate: Some((entered.clone(), release.clone())),
        };
        let coordinator = AnalysisCoordinator::new(
            vision,
            FakeDatabase::default(),
            FakeFallback::answering("no json"),
        );
        let (first_presenter, _first_events) = presenter();
        let (second_presenter, mut second_events) = presenter();
        let first_request = AnalysisRequest::with_image(image());

        let first = coordinator.analyze(&first_request, &first_presenter);
        tokio::pin!(first);

        tokio::select! {
            biased;
            _ = &mut first => panic!("first run should be parked in extraction"),
            _ = entered.notified() => {}
        }

        let second = coordinator
            .analyze(&AnalysisRequest::with_image(image()), &second_presenter)
            .await;
        assert!(matches!(second, Err(AnalysisError::Busy)));
        assert_eq!(
            drain(&mut second_events),
            vec![PresentationEvent::Error("an analysis is already running".to_string())]
        );

        release.notify_one();
        let record = first.await.expect("first run completes");
        assert_eq!(record.source, RecordSource::AiFallback);
    }
}
