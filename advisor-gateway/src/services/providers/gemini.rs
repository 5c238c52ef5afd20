//! Gemini provider implementation.
//!
//! Implements text generation using Google's Gemini `generateContent` API.

use super::{FinishReason, GenerationParams, ProviderError, ProviderResponse, TextProvider};
use crate::config::ProviderConfig;
use crate::models::Role;
use crate::services::prompt::Prompt;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use service_core::observability::inject_trace_headers;
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Secret<String>,
    pub model: String,
    pub api_base: String,
    pub timeout: Duration,
}

impl From<&ProviderConfig> for GeminiConfig {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            timeout: config.timeout,
        }
    }
}

/// Gemini text provider.
pub struct GeminiTextProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiTextProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        if config.api_key.expose_secret().is_empty() {
            return Err(ProviderError::NotConfigured(
                "Gemini API key not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Build the API URL for the given method.
    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.config.api_base, self.config.model, method
        )
    }

    fn headers(&self, request_id: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        inject_trace_headers(&mut headers, request_id);
        if let Ok(value) = self.config.api_key.expose_secret().parse() {
            headers.insert(API_KEY_HEADER, value);
        }
        headers
    }
}

/// Translate a prompt into the Gemini request body.
fn build_request(prompt: &Prompt, params: &GenerationParams) -> GenerateContentRequest {
    let contents = prompt
        .turns
        .iter()
        .map(|turn| Content {
            role: Some(
                match turn.role {
                    Role::User => "user",
                    Role::Model => "model",
                }
                .to_string(),
            ),
            parts: vec![ContentPart {
                text: turn.text.clone(),
            }],
        })
        .collect();

    let system_instruction = if prompt.system_instruction.is_empty() {
        None
    } else {
        Some(Content {
            role: None,
            parts: vec![ContentPart {
                text: prompt.system_instruction.clone(),
            }],
        })
    };

    GenerateContentRequest {
        contents,
        system_instruction,
        generation_config: Some(GenerationConfig {
            temperature: params.temperature,
            top_p: params.top_p,
            max_output_tokens: params.max_tokens,
        }),
        safety_settings: Some(vec![SafetySetting {
            category: "HARM_CATEGORY_DANGEROUS_CONTENT".to_string(),
            threshold: "BLOCK_LOW_AND_ABOVE".to_string(),
        }]),
    }
}

/// Pull the reply text and usage out of a Gemini response.
fn parse_response(api_response: GenerateContentResponse) -> Result<ProviderResponse, ProviderError> {
    if let Some(feedback) = &api_response.prompt_feedback {
        if feedback.block_reason.is_some() {
            return Err(ProviderError::ContentFiltered);
        }
    }

    let candidate = api_response
        .candidates
        .first()
        .ok_or(ProviderError::EmptyResponse)?;

    let finish_reason = match candidate.finish_reason.as_deref() {
        Some("MAX_TOKENS") => FinishReason::Length,
        Some("SAFETY") | Some("PROHIBITED_CONTENT") | Some("BLOCKLIST") => {
            FinishReason::ContentFilter
        }
        _ => FinishReason::Complete,
    };

    if finish_reason == FinishReason::ContentFilter {
        return Err(ProviderError::ContentFiltered);
    }

    let text: String = candidate
        .content
        .as_ref()
        .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ProviderError::EmptyResponse);
    }

    let usage = api_response.usage_metadata.unwrap_or_default();

    Ok(ProviderResponse {
        text,
        input_tokens: usage.prompt_token_count.unwrap_or(0),
        output_tokens: usage.candidates_token_count.unwrap_or(0),
        finish_reason,
    })
}

fn map_send_error(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout.as_millis())
    } else {
        ProviderError::NetworkError(err.to_string())
    }
}

#[async_trait]
impl TextProvider for GeminiTextProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        let request = build_request(prompt, params);

        tracing::debug!(
            model = %self.config.model,
            prompt_chars = prompt.char_len(),
            turns = prompt.turns.len(),
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(self.api_url("generateContent"))
            .headers(self.headers(prompt.request_id.as_deref()))
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.config.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }
            if status.as_u16() == 400 {
                return Err(ProviderError::InvalidRequest(error_text));
            }

            return Err(ProviderError::ApiError(format!(
                "Gemini API error {}: {}",
                status, error_text
            )));
        }

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        parse_response(api_response)
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let url = format!("{}/models/{}", self.config.api_base, self.config.model);

        let response = self
            .client
            .get(&url)
            .headers(self.headers(None))
            .send()
            .await
            .map_err(|e| map_send_error(e, self.config.timeout))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::ApiError(format!(
                "Health check failed: {}",
                response.status()
            )))
        }
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    safety_settings: Option<Vec<SafetySetting>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SafetySetting {
    category: String,
    threshold: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
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
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<i32>,
    candidates_token_count: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::prompt::PromptTurn;
    use serde_json::json;

    fn prompt() -> Prompt {
        Prompt {
            system_instruction: "Advise BU students.".to_string(),
            turns: vec![
                PromptTurn {
                    role: Role::User,
                    text: "Hi".to_string(),
                },
                PromptTurn {
                    role: Role::Model,
                    text: "Hello!".to_string(),
                },
                PromptTurn {
                    role: Role::User,
                    text: "Which CS courses first?".to_string(),
                },
            ],
            request_id: None,
        }
    }

    #[test]
    fn headers_carry_key_and_request_id() {
        let provider = GeminiTextProvider::new(GeminiConfig {
            api_key: Secret::new("test-key".to_string()),
            model: "gemini-2.0-flash".to_string(),
            api_base: "http://localhost".to_string(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();

        let headers = provider.headers(Some("req-7"));
        assert_eq!(headers[API_KEY_HEADER], "test-key");
        assert_eq!(headers["x-request-id"], "req-7");
        assert!(provider.headers(None).get("x-request-id").is_none());
    }

    #[test]
    fn request_body_uses_gemini_field_names() {
        let params = GenerationParams {
            temperature: Some(0.25),
            top_p: Some(0.8),
            max_tokens: Some(750),
        };
        let body = serde_json::to_value(build_request(&prompt(), &params)).unwrap();

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Advise BU students.");
        assert!(body["systemInstruction"].get("role").is_none());
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][2]["parts"][0]["text"], "Which CS courses first?");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 750);
        assert_eq!(body["safetySettings"][0]["threshold"], "BLOCK_LOW_AND_ABOVE");
    }

    #[test]
    fn response_parts_are_joined() {
        let raw = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Consider "}, {"text": "CAS Data Science."}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 42, "candidatesTokenCount": 7}
        });
        let parsed = parse_response(serde_json::from_value(raw).unwrap()).unwrap();

        assert_eq!(parsed.text, "Consider CAS Data Science.");
        assert_eq!(parsed.input_tokens, 42);
        assert_eq!(parsed.output_tokens, 7);
        assert_eq!(parsed.finish_reason, FinishReason::Complete);
    }

    #[test]
    fn safety_stop_is_content_filtered() {
        let raw = json!({"candidates": [{"finishReason": "SAFETY"}]});
        let err = parse_response(serde_json::from_value(raw).unwrap()).unwrap_err();
        assert!(matches!(err, ProviderError::ContentFiltered));

        let raw = json!({"promptFeedback": {"blockReason": "OTHER"}});
        let err = parse_response(serde_json::from_value(raw).unwrap()).unwrap_err();
        assert!(matches!(err, ProviderError::ContentFiltered));
    }

    #[test]
    fn missing_candidates_is_empty_response() {
        let err = parse_response(serde_json::from_value(json!({})).unwrap()).unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse));
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let result = GeminiTextProvider::new(GeminiConfig {
            api_key: Secret::new(String::new()),
            model: "gemini-2.0-flash".into(),
            api_base: "http://localhost".into(),
            timeout: Duration::from_secs(1),
        });
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }
}
