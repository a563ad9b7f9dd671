use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::{CapabilityError, ModelCapability, ModelPrompt};
use crate::config::ModelConfig;

const MAX_ERROR_MESSAGE_LEN: usize = 300;

/// Google Gemini `generateContent` client with JSON-constrained output.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'static str,
    response_schema: &'a serde_json::Value,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

impl GeminiClient {
    pub fn new(config: &ModelConfig) -> Result<Self, CapabilityError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| CapabilityError::NotConfigured(e.to_string()))?;

        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let endpoint = Url::parse(&base)
            .and_then(|url| url.join(&format!("models/{}:generateContent", config.model)))
            .map_err(|e| {
                CapabilityError::NotConfigured(format!("invalid base url {}: {e}", config.base_url))
            })?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
            timeout: config.timeout(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn build_request<'a>(prompt: &'a ModelPrompt) -> GenerateRequest<'a> {
        let mut parts = vec![Part::Text { text: &prompt.text }];
        if let Some(image) = &prompt.image {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.media_type(),
                    data: image.base64_data(),
                },
            });
        }

        GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: &prompt.output_schema,
                temperature: 0.2,
            },
        }
    }

    fn parse_response(body: &str) -> Result<serde_json::Value, CapabilityError> {
        let response: GenerateResponse = serde_json::from_str(body)
            .map_err(|e| CapabilityError::Malformed(format!("unreadable response envelope: {e}")))?;

        if let Some(reason) = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
        {
            return Err(CapabilityError::Malformed(format!("prompt blocked: {reason}")));
        }

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| CapabilityError::Malformed("response has no candidates".to_string()))?;

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(CapabilityError::Malformed(format!(
                "empty candidate (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        serde_json::from_str(&text)
            .map_err(|e| CapabilityError::Malformed(format!("candidate is not valid JSON: {e}")))
    }

    fn map_status(status: StatusCode, body: &str) -> CapabilityError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return CapabilityError::RateLimited;
        }
        let message = serde_json::from_str::<ApiErrorBody>(body)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| body.to_string());
        CapabilityError::Api {
            status: status.as_u16(),
            message: sanitize_api_error(&message),
        }
    }
}

#[async_trait]
impl ModelCapability for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &ModelPrompt) -> Result<serde_json::Value, CapabilityError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CapabilityError::NotConfigured("GEMINI_API_KEY is not set".to_string()))?;

        log::debug!("Sending prompt '{}' to {}", prompt.name, self.endpoint);

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("x-goog-api-key", api_key)
            .json(&Self::build_request(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CapabilityError::Timeout(self.timeout)
                } else {
                    CapabilityError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CapabilityError::Network(e.to_string()))?;

        if !status.is_success() {
            log::warn!("Gemini returned {} for prompt '{}'", status, prompt.name);
            return Err(Self::map_status(status, &body));
        }

        Self::parse_response(&body)
    }
}

/// Keeps provider error text out of user-facing messages when it may carry
/// credential or quota details.
fn sanitize_api_error(error: &str) -> String {
    let lower = error.to_lowercase();

    if lower.contains("api key")
        || lower.contains("apikey")
        || lower.contains("unauthorized")
        || lower.contains("permission denied")
    {
        return "authentication with the model API failed".to_string();
    }
    if lower.contains("quota") || lower.contains("resource_exhausted") {
        return "model API quota exhausted".to_string();
    }

    if error.len() > MAX_ERROR_MESSAGE_LEN {
        let mut end = MAX_ERROR_MESSAGE_LEN;
        while !error.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...(truncated)", &error[..end])
    } else {
        error.to_string()
    }
}
