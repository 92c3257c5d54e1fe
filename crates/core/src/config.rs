use crate::error::AnalysisError;
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_OPENFDA_ENDPOINT: &str = "https://api.fda.gov/drug";
pub const DEFAULT_OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_OPENROUTER_MODEL: &str = "mistralai/mistral-small-3.2-24b-instruct:free";
pub const DEFAULT_APP_TITLE: &str = "MediScan";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Endpoints, credentials and limits for the three external services.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub gemini_endpoint: String,
    pub gemini_model: String,
    pub gemini_api_key: Option<String>,
    pub openfda_endpoint: String,
    pub openfda_api_key: Option<String>,
    pub openrouter_endpoint: String,
    pub openrouter_model: String,
    pub openrouter_api_key: Option<String>,
    pub referer: Option<String>,
    pub app_title: String,
    pub request_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            gemini_endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_api_key: None,
            openfda_endpoint: DEFAULT_OPENFDA_ENDPOINT.to_string(),
            openfda_api_key: None,
            openrouter_endpoint: DEFAULT_OPENROUTER_ENDPOINT.to_string(),
            openrouter_model: DEFAULT_OPENROUTER_MODEL.to_string(),
            openrouter_api_key: None,
            referer: None,
            app_title: DEFAULT_APP_TITLE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ServiceConfig {
    pub fn http_client(&self) -> Result<Client, AnalysisError> {
        Ok(Client::builder().timeout(self.request_timeout).build()?)
    }
}

/// Treats unset and blank values alike.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

pub(crate) fn require_key(value: &Option<String>, name: &str) -> Result<String, AnalysisError> {
    non_blank(value.clone())
        .ok_or_else(|| AnalysisError::Config(format!("{name} API key is not configured")))
}
