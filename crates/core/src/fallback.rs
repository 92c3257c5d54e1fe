use crate::config::{non_blank, require_key, ServiceConfig};
use crate::json_object::first_json_object;
use crate::models::RecordFields;
use crate::prompts::make_synthesis_prompt;
use crate::traits::FallbackSynthesizer;
use crate::{AnalysisError, ExtractedInfo, ImageInput, MedicineRecord, RecordSource, Synthesis};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const SERVICE: &str = "OpenRouter";

pub const FALLBACK_WARNINGS: [&str; 2] = [
    "Please consult a healthcare professional before use",
    "This information is extracted from the package image and may not be complete",
];

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn first_content(self) -> Option<String> {
        self.choices.into_iter().next()?.message?.content
    }
}

/// Second-opinion client: asks an OpenRouter chat model about the photo and extraction.
pub struct OpenRouterClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    referer: Option<String>,
    app_title: String,
}

impl OpenRouterClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, AnalysisError> {
        Ok(Self {
            client: config.http_client()?,
            endpoint: config.openrouter_endpoint.clone(),
            model: config.openrouter_model.clone(),
            api_key: require_key(&config.openrouter_api_key, SERVICE)?,
            referer: non_blank(config.referer.clone()),
            app_title: config.app_title.clone(),
        })
    }

    fn request_body<'a>(
        &'a self,
        info: &ExtractedInfo,
        image: &ImageInput,
    ) -> Result<ChatRequest<'a>, AnalysisError> {
        Ok(ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: make_synthesis_prompt(info)?,
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.data_uri(),
                        },
                    },
                ],
            }],
        })
    }
}

#[async_trait]
impl FallbackSynthesizer for OpenRouterClient {
    async fn synthesize(
        &self,
        info: &ExtractedInfo,
        image: &ImageInput,
    ) -> Result<Synthesis, AnalysisError> {
        let payload = self.request_body(info, image)?;

        let mut request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("X-Title", &self.app_title)
            .json(&payload);

        if let Some(referer) = &self.referer {
            request = request.header("HTTP-Referer", referer);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(AnalysisError::external(SERVICE, response.status()));
        }

        let body = response.text().await?;
        let content = serde_json::from_str::<ChatResponse>(&body)
            .map_err(|error| AnalysisError::unexpected(SERVICE, error.to_string()))?
            .first_content()
            .ok_or_else(|| AnalysisError::unexpected(SERVICE, "response has no message content"))?;

        debug!(model = %self.model, content_len = content.len(), "fallback model answered");
        Ok(parse_synthesis(&content, info))
    }
}

/// Reads the model's record, or assembles one from the extraction when the answer is unusable.
pub fn parse_synthesis(content: &str, info: &ExtractedInfo) -> Synthesis {
    let parsed = first_json_object(content)
        .ok_or_else(|| "no JSON object found in response".to_string())
        .and_then(|json| {
            serde_json::from_str::<RecordFields>(json).map_err(|error| error.to_string())
        });

    match parsed {
        Ok(fields) => Synthesis::Structured(fields.into_record(RecordSource::Ai)),
        Err(reason) => {
            warn!(%reason, "fallback response was not structured; using extracted fields");
            Synthesis::Degraded(degraded_record(info))
        }
    }
}

pub fn degraded_record(info: &ExtractedInfo) -> MedicineRecord {
    MedicineRecord {
        brand_name: info.brand_name.clone(),
        generic_name: info.generic_name.clone(),
        manufacturer: info.manufacturer.clone(),
        purpose: info.purpose.clone(),
        dosage: info.dosage.clone(),
        form: info.form.clone(),
        active_ingredients: info.active_ingredients.clone(),
        warnings: FALLBACK_WARNINGS.iter().map(|warning| warning.to_string()).collect(),
        source: RecordSource::AiFallback,
    }
}
