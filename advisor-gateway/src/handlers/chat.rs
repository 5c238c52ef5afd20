use crate::dtos::{ChatRequest, ChatResponse};
use crate::models::generate_session_id;
use crate::services::metrics::{record_guardrail_block, record_provider_call, record_tokens};
use crate::services::providers::{ProviderError, ProviderResponse};
use crate::services::{GuardOutcome, Prompt};
use crate::startup::AppState;
use axum::{extract::State, http::HeaderMap, Json};
use service_core::error::AppError;
use service_core::observability::extract_request_id;
use std::time::Instant;
use validator::Validate;

/// Answer one advisor query.
///
/// POST /chat
#[tracing::instrument(
    skip(state, headers, req),
    fields(
        user_id = %req.user_id,
        is_document_upload = req.is_document_upload
    )
)]
pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    req.validate()?;

    let query = req.message.trim();
    if query.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Message must not be empty"
        )));
    }

    let session_id = req
        .session_id
        .clone()
        .unwrap_or_else(|| generate_session_id(&req.user_id));

    if let GuardOutcome::Block { guard, message } =
        state.guardrails.check(query, req.is_document_upload)
    {
        record_guardrail_block(guard);
        tracing::info!(guard, session_id = %session_id, "Query refused by guardrail");
        return Ok(Json(ChatResponse {
            response: message,
            session_id,
            user_id: req.user_id,
            blocked: true,
        }));
    }

    let history = state.sessions.history(&req.user_id, &session_id);
    let prompt = state
        .prompt_builder
        .build(history.as_deref().unwrap_or_default(), query)
        .with_request_id(extract_request_id(&headers));

    let reply = generate_reply(&state, &prompt).await?;

    // Only answered exchanges create or extend a session
    match history {
        Some(_) => {
            if !state
                .sessions
                .append_exchange(&req.user_id, &session_id, query, &reply.text)
            {
                tracing::info!(
                    session_id = %session_id,
                    "Session deleted during request, exchange not recorded"
                );
            }
        }
        None => state
            .sessions
            .start_with_exchange(&req.user_id, &session_id, query, &reply.text),
    }

    Ok(Json(ChatResponse {
        response: reply.text,
        session_id,
        user_id: req.user_id,
        blocked: false,
    }))
}

/// Single provider call, bounded by the configured timeout.
async fn generate_reply(state: &AppState, prompt: &Prompt) -> Result<ProviderResponse, ProviderError> {
    let provider = state.provider.name();
    let timeout = state.config.provider.timeout;
    let start = Instant::now();

    let result = match tokio::time::timeout(
        timeout,
        state.provider.generate(prompt, &state.generation_params),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(timeout.as_millis())),
    };

    let elapsed = start.elapsed().as_secs_f64();
    match &result {
        Ok(response) => {
            record_provider_call(provider, "success", elapsed);
            record_tokens(provider, response.input_tokens, response.output_tokens);
            tracing::info!(
                provider,
                input_tokens = response.input_tokens,
                output_tokens = response.output_tokens,
                finish_reason = ?response.finish_reason,
                latency_ms = (elapsed * 1000.0) as u64,
                "Provider replied"
            );
        }
        Err(e) => {
            record_provider_call(provider, e.kind(), elapsed);
            tracing::error!(provider, error = %e, "Provider call failed");
        }
    }

    result
}
