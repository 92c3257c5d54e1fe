use crate::MedicineRecord;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    ImageAnalysis,
    NameGeneration,
    FdaSearch,
    AiFallback,
}

impl PipelineStep {
    pub fn id(&self) -> &'static str {
        match self {
            Self::ImageAnalysis => "image_analysis",
            Self::NameGeneration => "name_generation",
            Self::FdaSearch => "fda_search",
            Self::AiFallback => "ai_fallback",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProgressEvent {
    pub step: PipelineStep,
    pub message: String,
    pub completed: bool,
}

impl ProgressEvent {
    pub fn started(step: PipelineStep, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
            completed: false,
        }
    }

    pub fn finished(step: PipelineStep, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
            completed: true,
        }
    }
}

/// Presentation collaborator notified by the pipeline.
///
/// `reset` clears whatever a previous run displayed. A run ends with exactly one
/// `result` or one `error`, never both.
pub trait Presenter {
    fn reset(&self);
    fn progress(&self, event: &ProgressEvent);
    fn result(&self, record: &MedicineRecord);
    fn error(&self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentationEvent {
    Reset,
    Progress(ProgressEvent),
    Result(MedicineRecord),
    Error(String),
}

/// Forwards every notification over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelPresenter {
    sender: UnboundedSender<PresentationEvent>,
}

impl ChannelPresenter {
    pub fn new(sender: UnboundedSender<PresentationEvent>) -> Self {
        Self { sender }
    }

    fn send(&self, event: PresentationEvent) {
        // A dropped receiver only means nobody is watching anymore.
        let _ = self.sender.send(event);
    }
}

impl Presenter for ChannelPresenter {
    fn reset(&self) {
        self.send(PresentationEvent::Reset);
    }

    fn progress(&self, event: &ProgressEvent) {
        self.send(PresentationEvent::Progress(event.clone()));
    }

    fn result(&self, record: &MedicineRecord) {
        self.send(PresentationEvent::Result(record.clone()));
    }

    fn error(&self, message: &str) {
        self.send(PresentationEvent::Error(message.to_string()));
    }
}
