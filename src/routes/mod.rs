//! API routes

mod chat;
mod media;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tracing::error;

use crate::conversation::SessionKey;
use crate::core::{ChatEngine, ChatError};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub chat_engine: Arc<ChatEngine>,
    /// Used by streaming requests that carry no session key
    pub default_session: SessionKey,
}

impl AppState {
    pub fn new(chat_engine: Arc<ChatEngine>, default_session: SessionKey) -> Self {
        Self {
            chat_engine,
            default_session,
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = match &self {
            ChatError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ChatError::Provider(_) => StatusCode::BAD_GATEWAY,
            ChatError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        (status, self.to_string()).into_response()
    }
}

/// View name of the chat page
async fn index() -> &'static str {
    "chat"
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/chat", post(chat::chat))
        .route("/chat/stream", post(chat::stream_chat))
        .route("/chat/history/:user_id", post(chat::chat_history))
        .route("/embeddings", post(media::embeddings))
        .route("/images", post(media::images))
        .route("/audio/speech", post(media::speech))
        .route("/audio/transcriptions", post(media::transcription))
}
