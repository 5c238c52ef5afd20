//! Mock provider implementation for local runs and testing.

use super::{FinishReason, GenerationParams, ProviderError, ProviderResponse, TextProvider};
use crate::services::prompt::Prompt;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// How the mock answers.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Reply with `Mock response for: <query>`.
    Echo,
    /// Always reply with this text.
    Reply(String),
    /// Always fail with an API error carrying this message.
    Fail(String),
    /// Sleep, then reply with this text.
    Delay(Duration, String),
    /// Fail when the query contains this marker, echo otherwise.
    FailIfContains(String),
}

/// Mock text provider for testing.
pub struct MockTextProvider {
    behavior: MockBehavior,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<Prompt>>,
}

impl MockTextProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// Number of `generate` calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The prompt of the most recent `generate` call.
    pub fn last_prompt(&self) -> Option<Prompt> {
        self.last_prompt.lock().ok().and_then(|prompt| prompt.clone())
    }
}

impl Default for MockTextProvider {
    fn default() -> Self {
        Self::new(MockBehavior::Echo)
    }
}

fn reply(text: String, prompt: &Prompt) -> ProviderResponse {
    ProviderResponse {
        output_tokens: text.len() as i32 / 4,
        text,
        input_tokens: prompt.char_len() as i32 / 4,
        finish_reason: FinishReason::Complete,
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        _params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_prompt.lock() {
            *last = Some(prompt.clone());
        }

        let echo = || reply(format!("Mock response for: {}", prompt.query()), prompt);
        match &self.behavior {
            MockBehavior::Echo => Ok(echo()),
            MockBehavior::Reply(text) => Ok(reply(text.clone(), prompt)),
            MockBehavior::Fail(message) => Err(ProviderError::ApiError(message.clone())),
            MockBehavior::Delay(delay, text) => {
                tokio::time::sleep(*delay).await;
                Ok(reply(text.clone(), prompt))
            }
            MockBehavior::FailIfContains(marker) if prompt.query().contains(marker.as_str()) => {
                Err(ProviderError::ApiError(format!("refusing query containing {}", marker)))
            }
            MockBehavior::FailIfContains(_) => Ok(echo()),
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        match &self.behavior {
            MockBehavior::Fail(message) => Err(ProviderError::NotConfigured(message.clone())),
            _ => Ok(()),
        }
    }
}
