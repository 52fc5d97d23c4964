use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who authored a chat turn. The frontend labels the assistant "bot".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

impl Role {
    /// Role name in the Gemini API vocabulary.
    pub fn as_model_role(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Bot => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }
}

/// A single seller recommendation, relayed exactly as the model wrote it.
///
/// The shape is enforced by the response schema on the model side. Nothing
/// here checks fields, filters by `matchScore` or truncates to 3.
pub type Recommendation = Value;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub recommendations: Vec<Recommendation>,
}
