use crate::dtos::{MessageResponse, SessionListResponse};
use crate::models::session_key;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    Json,
};

/// GET /sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionListResponse> {
    let sessions = state.sessions.list_keys();
    Json(SessionListResponse {
        active_sessions: sessions.len(),
        sessions,
    })
}

/// DELETE /session/:user_id/:session_id
#[tracing::instrument(skip(state))]
pub async fn delete_session(
    State(state): State<AppState>,
    Path((user_id, session_id)): Path<(String, String)>,
) -> Json<MessageResponse> {
    let message = if state.sessions.remove(&user_id, &session_id) {
        format!("Session {} deleted", session_key(&user_id, &session_id))
    } else {
        "Session not found".to_string()
    };
    Json(MessageResponse { message })
}
