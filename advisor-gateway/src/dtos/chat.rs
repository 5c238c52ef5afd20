use serde::{Deserialize, Serialize};
use validator::Validate;

fn default_user_id() -> String {
    "web_user".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ChatRequest {
    /// Length is left to the token guard so over-long input gets a refusal.
    pub message: String,

    #[serde(default = "default_user_id")]
    #[validate(length(min = 1, max = 128, message = "user_id must be 1-128 characters"))]
    pub user_id: String,

    #[serde(default)]
    #[validate(length(min = 1, max = 128, message = "session_id must be 1-128 characters"))]
    pub session_id: Option<String>,

    /// Message carries text extracted from an uploaded document.
    #[serde(default)]
    pub is_document_upload: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub user_id: String,
    /// Set when a guardrail answered instead of the provider.
    pub blocked: bool,
}
