//! Remote model client.
//!
//! One request, one response: the image goes inline next to a fixed
//! instruction and the model's text comes back.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::encoder::ImageAsset;
use crate::error::AnalysisError;

/// Model every request is sent to.
pub const MODEL: &str = "gemini-2.5-flash";

/// Upper bound on the model's internal reasoning tokens.
pub const THINKING_BUDGET: u32 = 1024;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

pub const INSTRUCTION: &str = "Count the fingers visible in this image and describe the hand \
configuration (which fingers are extended or folded, the gesture, and the orientation of the \
hand). Answer in English first, then in Chinese.\n\
请数一数图片中可见的手指数量，并描述手的形态（哪些手指伸直或弯曲、手势以及手的朝向）。\
请先用英文回答，再用中文回答。";

/// Substituted when the service answers without any text.
pub const EMPTY_RESPONSE_TEXT: &str = "No analysis generated.";

/// Surfaced when a failure carries no message of its own.
pub const FAILURE_FALLBACK: &str = "Failed to analyze image. Please try again.";

/// Everything sent for one analysis. Only the image varies.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub image: Arc<ImageAsset>,
    pub instruction: &'static str,
    pub model: &'static str,
    pub thinking_budget: u32,
}

impl AnalysisRequest {
    pub fn new(image: Arc<ImageAsset>) -> Self {
        Self { image, instruction: INSTRUCTION, model: MODEL, thinking_budget: THINKING_BUDGET }
    }
}

/// The model's answer. Opaque text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    pub text: String,
}

impl AnalysisResult {
    /// Wrap service output, falling back when there is nothing to show.
    pub fn from_text(text: Option<String>) -> Self {
        match text {
            Some(text) if !text.is_empty() => Self { text },
            _ => Self { text: EMPTY_RESPONSE_TEXT.to_string() },
        }
    }
}

/// Render a failure as the message the user sees.
pub fn failure_message(err: &AnalysisError) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        FAILURE_FALLBACK.to_string()
    } else {
        message
    }
}

/// A vision-language model service.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Perform one request/response cycle. `Ok(None)` means the service
    /// replied without text.
    async fn generate(&self, request: &AnalysisRequest) -> Result<Option<String>, AnalysisError>;

    /// Provider name, for logs.
    fn name(&self) -> &str;
}

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    api_base: String,
}

impl GeminiClient {
    /// Create a client. A missing key is only reported when a request is made.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Point at a different endpoint root.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.api_base, model)
    }
}

#[async_trait]
impl AnalysisClient for GeminiClient {
    async fn generate(&self, request: &AnalysisRequest) -> Result<Option<String>, AnalysisError> {
        let api_key = self.api_key.as_deref().ok_or(AnalysisError::MissingApiKey)?;
        let payload = GenerateContentRequest::from(request);

        tracing::debug!(
            model = request.model,
            mime_type = request.image.mime_type(),
            payload_len = request.image.base64_payload().len(),
            "Sending request to Gemini"
        );

        let response = self
            .client
            .post(self.endpoint(request.model))
            .header("x-goog-api-key", api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(status = %status, "Gemini returned an error");
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .filter(|m| !m.trim().is_empty());
            return Err(match message {
                Some(message) => AnalysisError::Service(message),
                None => AnalysisError::Http { status: status.as_u16(), body },
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| AnalysisError::Service(format!("Invalid response from Gemini: {e}")))?;

        Ok(parsed.text())
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum Part<'a> {
    InlineData { mime_type: &'a str, data: &'a str },
    Text(&'a str),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    thinking_config: ThinkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

impl<'a> From<&'a AnalysisRequest> for GenerateContentRequest<'a> {
    fn from(request: &'a AnalysisRequest) -> Self {
        Self {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::InlineData {
                        mime_type: request.image.mime_type(),
                        data: request.image.base64_payload(),
                    },
                    Part::Text(request.instruction),
                ],
            }],
            generation_config: GenerationConfig {
                thinking_config: ThinkingConfig { thinking_budget: request.thinking_budget },
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

impl GenerateContentResponse {
    /// Concatenated non-thought text of the first candidate.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts
            .iter()
            .filter(|p| !p.thought)
            .filter_map(|p| p.text.as_deref())
            .collect();

        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}
