//! Gemini `generateContent` REST client.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conversation::config::{ApiKey, ChatConfig};
use crate::conversation::errors::ChatResult;
use crate::llm::client::{GenerateRequest, ModelClient, ModelFuture, ModelVariant};
use crate::llm::error::ModelError;
use crate::llm::payload::InlinePayload;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// HTTP client for the generative-language API.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: Option<ApiKey>,
    text_model: String,
    vision_model: String,
}

impl GeminiClient {
    /// Build from configuration. A missing key is accepted here and reported per call.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the HTTP client cannot be built.
    pub fn new(config: &ChatConfig) -> ChatResult<Self> {
        config.validate()?;
        let http = Client::builder()
            .timeout(config.api.request_timeout)
            .connect_timeout(config.api.connect_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            api_key: config.api.api_key.clone(),
            text_model: config.model.text_model.clone(),
            vision_model: config.model.vision_model.clone(),
        })
    }

    /// Model name serving `variant`.
    #[must_use]
    pub fn model_for(&self, variant: ModelVariant) -> &str {
        match variant {
            ModelVariant::Text => &self.text_model,
            ModelVariant::Vision => &self.vision_model,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.base_url)
    }

    async fn send(&self, request: GenerateRequest) -> Result<String, ModelError> {
        let api_key = self.api_key.as_ref().ok_or(ModelError::MissingCredential)?;
        let model = self.model_for(request.variant);

        let mut parts = vec![Part::Text {
            text: request.prompt,
        }];
        if let Some(image) = request.image {
            parts.push(Part::InlineData { inline_data: image });
        }
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
        };

        debug!(model, variant = request.variant.as_str(), "sending generateContent");
        let response = self
            .http
            .post(self.endpoint(model))
            .header(API_KEY_HEADER, api_key.expose())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body_text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| ModelError::InvalidResponse(err.to_string()))?;
        extract_text(parsed)
    }
}

impl ModelClient for GeminiClient {
    fn generate(&self, request: GenerateRequest) -> ModelFuture<'_, Result<String, ModelError>> {
        Box::pin(self.send(request))
    }

    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlinePayload,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: GenerateContentResponse) -> Result<String, ModelError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ModelError::Blocked(reason));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(ModelError::EmptyResponse)?;

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

    if !text.is_empty() {
        return Ok(text);
    }

    match candidate.finish_reason.as_deref() {
        Some(reason @ ("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT")) => {
            Err(ModelError::Blocked(reason.to_string()))
        }
        _ => Err(ModelError::EmptyResponse),
    }
}

fn map_http_error(status: StatusCode, body: &str) -> ModelError {
    let message = serde_json::from_str::<ErrorWrapper>(body).map_or_else(
        |_| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("request failed")
                )
            } else {
                format!("HTTP {}: {trimmed}", status.as_u16())
            }
        },
        |wrapper| {
            let msg = wrapper
                .error
                .message
                .unwrap_or_else(|| body.to_string());
            match wrapper.error.status.filter(|s| !s.is_empty()) {
                Some(status_text) => format!("{status_text}: {msg}"),
                None => msg,
            }
        },
    );

    ModelError::Api {
        status: status.as_u16(),
        message,
    }
}
