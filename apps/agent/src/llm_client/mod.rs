//! LLM Client: the single point of entry for all Gemini API calls in the agent.
//!
//! ARCHITECTURAL RULE: No other module may call the Gemini API directly.
//! All LLM interactions MUST go through this module.
//!
//! Model: gemini-1.5-flash (hardcoded, not configurable)

use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub mod sse;

use sse::SseDecoder;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
/// The model used for all LLM calls in the agent.
pub const MODEL: &str = "gemini-1.5-flash";
const REQUEST_TIMEOUT_SECS: u64 = 120;
const STREAM_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Prompt blocked by safety filter: {0}")]
    Blocked(String),

    #[error("LLM returned empty content")]
    EmptyContent,
}

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }

    /// System instructions carry no role.
    pub fn instruction(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    /// OpenAPI-subset schema the output must follow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

/// Only the strictest threshold is ever sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockLowAndAbove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

impl SafetySetting {
    /// The same threshold applied to every harm category.
    pub fn uniform(threshold: HarmBlockThreshold) -> Vec<SafetySetting> {
        [
            HarmCategory::Harassment,
            HarmCategory::HateSpeech,
            HarmCategory::SexuallyExplicit,
            HarmCategory::DangerousContent,
        ]
        .into_iter()
        .map(|category| SafetySetting {
            category,
            threshold,
        })
        .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

/// One streamed `GenerateContentResponse` chunk.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub prompt_token_count: Option<u32>,
    pub candidates_token_count: Option<u32>,
}

impl GenerateResponse {
    /// Concatenated text of every part of the first candidate.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// The single LLM client used by the agent.
/// Wraps the Gemini streaming API; one instance is shared by all requests.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
            api_key,
            base_url: GEMINI_API_BASE.to_string(),
        })
    }

    /// Points the client at a local stub server.
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Starts a streaming generation. Text deltas are produced by a background
    /// task and delivered in order; the channel closes when the stream ends.
    /// A chunk-level failure is delivered as the final item.
    pub async fn stream(
        &self,
        request: &GenerateRequest,
    ) -> Result<mpsc::Receiver<Result<String, LlmError>>, LlmError> {
        let url = format!(
            "{}/v1beta/models/{MODEL}:streamGenerateContent?alt=sse",
            self.base_url
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("LLM API returned {}: {}", status, body);
            let message = serde_json::from_str::<GeminiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut decoder = SseDecoder::new();

            while let Some(chunk) = bytes.next().await {
                let payloads = match chunk {
                    Ok(chunk) => decoder.push(&chunk),
                    Err(e) => {
                        let _ = tx.send(Err(LlmError::Http(e))).await;
                        return;
                    }
                };
                for payload in payloads {
                    if !forward_chunk(&payload, &tx).await {
                        return;
                    }
                }
            }

            if let Some(payload) = decoder.finish() {
                forward_chunk(&payload, &tx).await;
            }
        });

        Ok(rx)
    }

    /// Runs a streaming generation to completion and returns the concatenated text.
    pub async fn generate_text(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        let mut rx = self.stream(request).await?;

        let mut text = String::new();
        let mut chunks = 0usize;
        while let Some(delta) = rx.recv().await {
            text.push_str(&delta?);
            chunks += 1;
        }

        debug!("LLM stream finished: chunks={}, chars={}", chunks, text.len());

        if text.trim().is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(text)
    }
}

/// Decodes one SSE payload and forwards its text. Returns `false` once the
/// stream should stop (error sent or receiver gone).
async fn forward_chunk(payload: &str, tx: &mpsc::Sender<Result<String, LlmError>>) -> bool {
    let chunk: GenerateResponse = match serde_json::from_str(payload) {
        Ok(chunk) => chunk,
        Err(e) => {
            let _ = tx.send(Err(LlmError::Parse(e))).await;
            return false;
        }
    };

    if let Some(reason) = chunk
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.clone())
    {
        let _ = tx.send(Err(LlmError::Blocked(reason))).await;
        return false;
    }

    if let Some(usage) = &chunk.usage_metadata {
        debug!(
            "LLM usage: prompt_tokens={:?}, output_tokens={:?}",
            usage.prompt_token_count, usage.candidates_token_count
        );
    }
    if let Some(reason) = chunk.candidates.first().and_then(|c| c.finish_reason.as_deref()) {
        debug!("LLM stream finish_reason={reason}");
    }

    let text = chunk.text();
    if text.is_empty() {
        return true;
    }
    tx.send(Ok(text)).await.is_ok()
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{header, StatusCode},
        Router,
    };
    use serde_json::json;

    fn sample_request() -> GenerateRequest {
        GenerateRequest {
            contents: vec![
                Content::text("user", "I need a logo"),
                Content::text("model", "Sure, any style?"),
            ],
            system_instruction: Some(Content::instruction("You are a matcher.")),
            generation_config: GenerationConfig {
                temperature: 0.8,
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(json!({"type": "OBJECT"})),
            },
            safety_settings: SafetySetting::uniform(HarmBlockThreshold::BlockLowAndAbove),
        }
    }

    /// Serves `body` from the streaming endpoint and returns the base URL.
    async fn spawn_gemini(status: StatusCode, body: &'static str) -> String {
        let app = Router::new().fallback(move || async move {
            (status, [(header::CONTENT_TYPE, "text/event-stream")], body)
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client_for(base_url: String) -> LlmClient {
        LlmClient::new("test-key".to_string())
            .unwrap()
            .with_base_url(base_url)
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_request_serializes_to_api_shape() {
        let value = serde_json::to_value(sample_request()).unwrap();

        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][1]["role"], "model");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "I need a logo");
        assert!(value["systemInstruction"].get("role").is_none());
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "You are a matcher.");
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(value["generationConfig"]["responseSchema"]["type"], "OBJECT");
        assert!((value["generationConfig"]["temperature"].as_f64().unwrap() - 0.8).abs() < 1e-6);

        let safety = value["safetySettings"].as_array().unwrap();
        assert_eq!(safety.len(), 4);
        assert_eq!(safety[0]["category"], "HARM_CATEGORY_HARASSMENT");
        assert_eq!(safety[3]["category"], "HARM_CATEGORY_DANGEROUS_CONTENT");
        assert!(safety
            .iter()
            .all(|s| s["threshold"] == "BLOCK_LOW_AND_ABOVE"));
    }

    #[test]
    fn test_response_text_concatenates_parts() {
        let chunk: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "{\"recom"}, {"text": "mendations\""}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 4}
        }))
        .unwrap();

        assert_eq!(chunk.text(), "{\"recommendations\"");
    }

    #[test]
    fn test_response_without_candidates_has_no_text() {
        let chunk: GenerateResponse =
            serde_json::from_value(json!({"usageMetadata": {"promptTokenCount": 3}})).unwrap();
        assert_eq!(chunk.text(), "");
    }

    #[tokio::test]
    async fn test_generate_text_concatenates_stream() {
        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"{\\\"recommendations\\\":\"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\" []}\"}]},\"finishReason\":\"STOP\"}]}\r\n\r\n",
        );
        let client = client_for(spawn_gemini(StatusCode::OK, body).await);

        let text = client.generate_text(&sample_request()).await.unwrap();
        assert_eq!(text, "{\"recommendations\": []}");
    }

    #[tokio::test]
    async fn test_api_error_message_is_extracted() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        let client = client_for(spawn_gemini(StatusCode::BAD_REQUEST, body).await);

        let err = client.generate_text(&sample_request()).await.unwrap_err();
        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_reported() {
        let body = "data: {\"promptFeedback\":{\"blockReason\":\"SAFETY\"}}\n\n";
        let client = client_for(spawn_gemini(StatusCode::OK, body).await);

        let err = client.generate_text(&sample_request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Blocked(reason) if reason == "SAFETY"));
    }

    #[tokio::test]
    async fn test_empty_stream_is_empty_content() {
        let client = client_for(spawn_gemini(StatusCode::OK, "").await);

        let err = client.generate_text(&sample_request()).await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyContent));
    }

    #[tokio::test]
    async fn test_malformed_chunk_is_parse_error() {
        let client = client_for(spawn_gemini(StatusCode::OK, "data: {not json\n\n").await);

        let err = client.generate_text(&sample_request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }
}
