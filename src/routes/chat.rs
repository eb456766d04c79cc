//! Chat endpoints

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Json, Response},
};
use futures::StreamExt;
use serde::Deserialize;
use tracing::error;

use crate::conversation::SessionKey;
use crate::core::{ChatError, ChatTurn};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct StreamChatRequest {
    pub text: String,
    /// Memory and history partition; the configured default when absent
    #[serde(default)]
    pub session_key: Option<String>,
}

fn session_key(key: String) -> Result<SessionKey, ChatError> {
    SessionKey::new(key)
        .ok_or_else(|| ChatError::InvalidRequest("session key must not be empty".into()))
}

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<String, ChatError> {
    state.chat_engine.chat(&request.text).await
}

/// Relays reply chunks as they arrive. A failure cuts the body short.
pub async fn stream_chat(
    State(state): State<AppState>,
    Json(request): Json<StreamChatRequest>,
) -> Result<Response, ChatError> {
    let session = match request.session_key {
        Some(key) => session_key(key)?,
        None => state.default_session.clone(),
    };

    let chunks = state
        .chat_engine
        .chat_stream(session, request.text)
        .map(|chunk| {
            if let Err(ref e) = chunk {
                error!(error = %e, "chat stream aborted");
            }
            chunk
        });

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(chunks),
    )
        .into_response())
}

pub async fn chat_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ChatTurn>>, ChatError> {
    let session = session_key(user_id)?;
    Ok(Json(state.chat_engine.history(&session).await?))
}
