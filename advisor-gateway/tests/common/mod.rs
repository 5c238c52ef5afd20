//! Test helper module for advisor-gateway integration tests.
//!
//! Spawns the gateway on a random port around a provider chosen by the test.

#![allow(dead_code)]

use advisor_gateway::config::{
    FrontendConfig, GatewayConfig, GuardrailConfig, ObservabilityConfig, PromptConfig,
    ProviderConfig, ProviderKind, SessionConfig, DEFAULT_GEMINI_API_BASE,
};
use advisor_gateway::services::providers::mock::{MockBehavior, MockTextProvider};
use advisor_gateway::services::providers::TextProvider;
use advisor_gateway::startup::Application;
use reqwest::Client;
use secrecy::Secret;
use service_core::config::Config;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration with no environment lookups, listening on a random port.
pub fn test_config() -> GatewayConfig {
    GatewayConfig {
        common: Config {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        provider: ProviderConfig {
            kind: ProviderKind::Mock,
            api_key: Secret::new(String::new()),
            model: "gemini-2.0-flash".to_string(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            timeout: Duration::from_secs(5),
        },
        prompt: PromptConfig::default(),
        guardrails: GuardrailConfig::default(),
        sessions: SessionConfig::default(),
        frontend: FrontendConfig {
            static_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("static"),
        },
        observability: ObservabilityConfig {
            log_level: "info".to_string(),
            otlp_endpoint: None,
        },
    }
}

pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub provider: Arc<MockTextProvider>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(MockBehavior::Echo, test_config()).await
    }

    pub async fn spawn_with_behavior(behavior: MockBehavior) -> Self {
        Self::spawn_with(behavior, test_config()).await
    }

    pub async fn spawn_with(behavior: MockBehavior, config: GatewayConfig) -> Self {
        let provider = Arc::new(MockTextProvider::new(behavior));
        let dyn_provider: Arc<dyn TextProvider> = provider.clone();

        let app = Application::build_with_provider(config, dyn_provider)
            .await
            .expect("Failed to build application");
        let address = format!("http://127.0.0.1:{}", app.port());

        tokio::spawn(async move {
            let _ = app.run_until_stopped().await;
        });

        Self {
            address,
            client: Client::new(),
            provider,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn post_chat(&self, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url("/chat"))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }
}
