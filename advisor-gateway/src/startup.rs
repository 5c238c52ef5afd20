//! Application startup and lifecycle management.
//!
//! Serves the advisor API and the static front end from a single HTTP
//! listener.

use crate::config::{GatewayConfig, ProviderKind};
use crate::handlers::{
    chat, delete_session, health_check, list_sessions, metrics, readiness_check, upload_document,
};
use crate::middleware::metrics_middleware;
use crate::services::documents::MAX_UPLOAD_BYTES;
use crate::services::providers::gemini::{GeminiConfig, GeminiTextProvider};
use crate::services::providers::mock::MockTextProvider;
use crate::services::providers::{GenerationParams, TextProvider};
use crate::services::{Guardrails, PromptBuilder, SessionStore};
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{delete, get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{request_id_middleware, security_headers_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Multipart framing allowance on top of the file itself.
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub provider: Arc<dyn TextProvider>,
    pub sessions: SessionStore,
    pub guardrails: Arc<Guardrails>,
    pub prompt_builder: Arc<PromptBuilder>,
    pub generation_params: GenerationParams,
}

impl AppState {
    pub fn new(config: GatewayConfig, provider: Arc<dyn TextProvider>) -> Self {
        Self {
            sessions: SessionStore::from_config(&config.prompt, &config.sessions),
            guardrails: Arc::new(Guardrails::from_config(&config.guardrails)),
            prompt_builder: Arc::new(PromptBuilder::from_config(&config.prompt)),
            generation_params: GenerationParams::from(&config.prompt),
            provider,
            config: Arc::new(config),
        }
    }
}

/// Create the provider selected by configuration.
pub fn build_provider(config: &GatewayConfig) -> Result<Arc<dyn TextProvider>, AppError> {
    let provider: Arc<dyn TextProvider> = match config.provider.kind {
        ProviderKind::Gemini => Arc::new(
            GeminiTextProvider::new(GeminiConfig::from(&config.provider))
                .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?,
        ),
        ProviderKind::Mock => Arc::new(MockTextProvider::default()),
    };

    tracing::info!(
        provider = provider.name(),
        model = %config.provider.model,
        timeout_secs = config.provider.timeout.as_secs(),
        "Initialized text provider"
    );

    Ok(provider)
}

pub fn build_router(state: AppState) -> Router {
    let static_dir = state.config.frontend.static_dir.clone();

    Router::new()
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .route("/chat", post(chat))
        .route("/sessions", get(list_sessions))
        .route("/session/:user_id/:session_id", delete(delete_session))
        .route(
            "/upload-document",
            post(upload_document).layer(DefaultBodyLimit::max(
                MAX_UPLOAD_BYTES + UPLOAD_OVERHEAD_BYTES,
            )),
        )
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the provider named in the configuration.
    pub async fn build(config: GatewayConfig) -> Result<Self, AppError> {
        let provider = build_provider(&config)?;
        Self::build_with_provider(config, provider).await
    }

    /// Build the application around an already constructed provider.
    pub async fn build_with_provider(
        config: GatewayConfig,
        provider: Arc<dyn TextProvider>,
    ) -> Result<Self, AppError> {
        // port 0 = random port for testing
        let addr: SocketAddr = config.common.address().parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Invalid listen address {}: {}",
                config.common.address(),
                e
            ))
        })?;

        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port,
            static_dir = %config.frontend.static_dir.display(),
            "Advisor gateway listening"
        );

        let router = build_router(AppState::new(config, provider));

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
