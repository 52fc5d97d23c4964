//! Recommendation Generator: turns a conversation plus the gig snapshot into a
//! schema-constrained model reply, and parses that reply.
//!
//! `AppState` holds an `Arc<dyn ReplyGenerator>`; production uses `GeminiRecommender`.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::gigs::models::Gig;
use crate::llm_client::{
    strip_json_fences, Content, GenerateRequest, GenerationConfig, HarmBlockThreshold, LlmClient,
    LlmError, SafetySetting,
};
use crate::recommendation::models::{ChatMessage, Recommendation};
use crate::recommendation::prompts::{
    recommendation_schema, RECOMMENDATION_SYSTEM, SELLER_PROFILES_LABEL, TEMPERATURE,
};

/// The model reply could not be read as a recommendations object.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("model reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model reply is not a JSON object")]
    NotAnObject,

    #[error("`recommendations` is not a list")]
    NotAList,
}

/// Produces the raw model reply for a conversation. Implement this to swap
/// model backends without touching the handler.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

/// Gemini-backed generator: fixed system instruction, JSON response schema,
/// temperature 0.8, low-and-above blocking on every harm category.
pub struct GeminiRecommender {
    llm: LlmClient,
}

impl GeminiRecommender {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    fn build_request(messages: &[ChatMessage]) -> GenerateRequest {
        let contents = messages
            .iter()
            .map(|msg| Content::text(msg.role.as_model_role(), msg.text.clone()))
            .collect();

        GenerateRequest {
            contents,
            system_instruction: Some(Content::instruction(RECOMMENDATION_SYSTEM)),
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(recommendation_schema()),
            },
            safety_settings: SafetySetting::uniform(HarmBlockThreshold::BlockLowAndAbove),
        }
    }
}

#[async_trait]
impl ReplyGenerator for GeminiRecommender {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let request = Self::build_request(messages);
        info!("Requesting recommendations ({} turns)", messages.len());
        self.llm.generate_text(&request).await
    }
}

/// Appends the gig snapshot to the conversation as a trailing user turn.
pub fn with_gig_snapshot(
    mut messages: Vec<ChatMessage>,
    gigs: &[Gig],
) -> Result<Vec<ChatMessage>, serde_json::Error> {
    let snapshot = serde_json::to_string(gigs)?;
    messages.push(ChatMessage::user(format!("{SELLER_PROFILES_LABEL}\n{snapshot}")));
    Ok(messages)
}

/// Reads the `recommendations` array out of a model reply. A reply without the
/// key counts as no recommendations. Entries are returned untouched.
pub fn parse_recommendations(reply: &str) -> Result<Vec<Recommendation>, ParseError> {
    let parsed: Value = serde_json::from_str(strip_json_fences(reply))?;
    let Value::Object(mut fields) = parsed else {
        return Err(ParseError::NotAnObject);
    };

    let recommendations = match fields.remove("recommendations") {
        Some(Value::Array(items)) => items,
        None | Some(Value::Null) => Vec::new(),
        Some(_) => return Err(ParseError::NotAList),
    };

    if recommendations.is_empty() {
        if let Some(message) = fields.get("message").and_then(Value::as_str) {
            debug!("Model found no suitable seller: {message}");
        }
    }

    Ok(recommendations)
}
