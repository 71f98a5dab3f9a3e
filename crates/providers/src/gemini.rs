//! Google Gemini provider (Generative Language API).
//!
//! Streams `models/{model}:streamGenerateContent?alt=sse`. Each SSE event is
//! a full `GenerateContentResponse`; the text of its first candidate becomes
//! one fragment.

use async_trait::async_trait;
use futures::StreamExt;
use hrdesk_core::error::ProviderError;
use hrdesk_core::provider::*;
use serde::Deserialize;
use tracing::{debug, trace, warn};

use crate::sse::SseDecoder;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Finish reasons that mean the answer was cut off by the API.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: GEMINI_API_BASE.to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Point at a different endpoint (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, model
        )
    }

    /// Build the JSON request body for the Gemini API.
    fn build_request_body(request: &GenerationRequest) -> serde_json::Value {
        let contents: Vec<serde_json::Value> = request
            .turns
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    TurnRole::User => "user",
                    TurnRole::Model => "model",
                };
                serde_json::json!({
                    "role": role,
                    "parts": [{ "text": turn.text }]
                })
            })
            .collect();

        serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "temperature": request.temperature,
                "responseMimeType": request.response_mime_type,
            }
        })
    }
}

/// Interpret one SSE payload.
///
/// `Ok(None)` means the payload was not understood and should be skipped.
fn parse_event(data: &str) -> Result<Option<Fragment>, ProviderError> {
    let event: StreamEvent = match serde_json::from_str(data) {
        Ok(event) => event,
        Err(e) => {
            trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
            return Ok(None);
        }
    };

    if let Some(error) = event.error {
        return Err(ProviderError::StreamInterrupted(format!(
            "{} (code {})",
            error.message, error.code
        )));
    }

    if let Some(reason) = event.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ProviderError::StreamInterrupted(format!(
            "prompt blocked: {reason}"
        )));
    }

    let Some(candidate) = event.candidates.into_iter().next() else {
        return Ok(Some(Fragment::empty()));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if BLOCKING_FINISH_REASONS.contains(&reason) {
            return Err(ProviderError::StreamInterrupted(format!(
                "response blocked: {reason}"
            )));
        }
    }

    if text.is_empty() {
        Ok(Some(Fragment::empty()))
    } else {
        Ok(Some(Fragment::text(text)))
    }
}

/// Map a non-success HTTP status to a submission error.
pub(crate) fn status_error(status: u16, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited,
        401 | 403 => ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        400 if body.contains("API_KEY_INVALID") || body.contains("API key not valid") => {
            ProviderError::AuthenticationFailed("API key not valid".into())
        }
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn stream(&self, request: GenerationRequest) -> Result<FragmentStream, ProviderError> {
        let url = self.stream_url(&request.model);
        let body = Self::build_request_body(&request);

        debug!(
            model = %request.model,
            turns = request.turns.len(),
            temperature = request.temperature,
            "Gemini streaming request"
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Gemini returned error");
            return Err(status_error(status, error_body));
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);

        // Read the SSE byte stream on a separate task
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut decoder = SseDecoder::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for data in decoder.push(&bytes) {
                    if !forward(&tx, &data).await {
                        return;
                    }
                }
            }

            for data in decoder.finish() {
                if !forward(&tx, &data).await {
                    return;
                }
            }
            // Dropping `tx` ends the stream
        });

        Ok(FragmentStream::new(rx))
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

/// Send one parsed payload downstream. Returns `false` when streaming must stop.
async fn forward(
    tx: &tokio::sync::mpsc::Sender<Result<Fragment, ProviderError>>,
    data: &str,
) -> bool {
    match parse_event(data) {
        Ok(Some(fragment)) => tx.send(Ok(fragment)).await.is_ok(),
        Ok(None) => true,
        Err(e) => {
            let _ = tx.send(Err(e)).await;
            false
        }
    }
}

// --- Gemini API types (internal) ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamEvent {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
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
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}
