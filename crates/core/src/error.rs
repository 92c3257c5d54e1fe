use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{service} API error: {status}")]
    ExternalService { service: String, status: u16 },

    #[error("unexpected response from {service}: {details}")]
    UnexpectedResponse { service: String, details: String },

    #[error("{0}")]
    Precondition(String),

    #[error("an analysis is already running")]
    Busy,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalysisError {
    pub fn external(service: &str, status: reqwest::StatusCode) -> Self {
        Self::ExternalService {
            service: service.to_string(),
            status: status.as_u16(),
        }
    }

    pub fn unexpected(service: &str, details: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            service: service.to_string(),
            details: details.into(),
        }
    }
}

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;
