use crate::config::{require_key, ServiceConfig};
use crate::json_object::first_json_object;
use crate::prompts::EXTRACTION_PROMPT;
use crate::traits::VisionExtractor;
use crate::{AnalysisError, ExtractedInfo, Extraction, ImageInput};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const SERVICE: &str = "Gemini";

#[derive(Debug, Clone, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Clone, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Debug, Clone, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

/// Reads identification fields off a package photo with a Gemini vision model.
pub struct GeminiVisionClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiVisionClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, AnalysisError> {
        Ok(Self {
            client: config.http_client()?,
            endpoint: config.gemini_endpoint.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            api_key: require_key(&config.gemini_api_key, SERVICE)?,
        })
    }

    fn url(&self) -> Result<url::Url, AnalysisError> {
        let base = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        Ok(url::Url::parse_with_params(&base, &[("key", self.api_key.as_str())])?)
    }
}

#[async_trait]
impl VisionExtractor for GeminiVisionClient {
    async fn extract(&self, image: &ImageInput) -> Result<Extraction, AnalysisError> {
        let payload = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: EXTRACTION_PROMPT,
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: image.mime_type(),
                            data: image.base64(),
                        },
                    },
                ],
            }],
        };

        let response = self.client.post(self.url()?).json(&payload).send().await?;

        if !response.status().is_success() {
            return Err(AnalysisError::external(SERVICE, response.status()));
        }

        let body = response.text().await?;
        let text = serde_json::from_str::<GenerateContentResponse>(&body)
            .map_err(|error| AnalysisError::unexpected(SERVICE, error.to_string()))?
            .first_text()
            .ok_or_else(|| AnalysisError::unexpected(SERVICE, "response has no candidate text"))?;

        debug!(model = %self.model, text_len = text.len(), "vision model answered");
        Ok(parse_extraction(&text))
    }
}

/// Pulls the first JSON object out of the model text; anything unusable degrades to the raw text.
pub fn parse_extraction(text: &str) -> Extraction {
    let parsed = first_json_object(text)
        .ok_or_else(|| "no JSON object found in response".to_string())
        .and_then(|json| {
            serde_json::from_str::<ExtractedInfo>(json).map_err(|error| error.to_string())
        });

    match parsed {
        Ok(info) => Extraction::Structured(info),
        Err(reason) => {
            warn!(%reason, "vision response was not structured; keeping raw text");
            Extraction::Degraded {
                raw_text: text.to_string(),
            }
        }
    }
}
