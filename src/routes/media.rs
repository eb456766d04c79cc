//! Embedding, image and audio endpoints
//!
//! Straight pass-throughs to the model gateway.

use axum::{
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;

use crate::core::ChatError;
use crate::providers::AudioFile;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct EmbeddingRequest {
    pub texts: Vec<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub text: String,
    #[serde(default = "default_image_count")]
    pub count: u32,
    #[serde(default = "default_image_side")]
    pub height: u32,
    #[serde(default = "default_image_side")]
    pub width: u32,
}

fn default_image_count() -> u32 {
    1
}

fn default_image_side() -> u32 {
    1024
}

#[derive(Debug, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
}

fn audio_content_type(format: &str) -> &'static str {
    match format {
        "opus" => "audio/opus",
        "aac" => "audio/aac",
        "flac" => "audio/flac",
        "wav" => "audio/wav",
        "pcm" => "audio/pcm",
        _ => "audio/mpeg",
    }
}

pub async fn embeddings(
    State(state): State<AppState>,
    Json(request): Json<EmbeddingRequest>,
) -> Result<Json<Vec<Vec<f32>>>, ChatError> {
    let vectors = state
        .chat_engine
        .gateway()
        .generate_embedding(&request.texts, request.model.as_deref())
        .await?;
    Ok(Json(vectors))
}

pub async fn images(
    State(state): State<AppState>,
    Json(request): Json<ImageRequest>,
) -> Result<Json<Vec<String>>, ChatError> {
    let urls = state
        .chat_engine
        .gateway()
        .generate_image(&request.text, request.count, request.height, request.width)
        .await?;
    Ok(Json(urls))
}

pub async fn speech(
    State(state): State<AppState>,
    Json(request): Json<SpeechRequest>,
) -> Result<Response, ChatError> {
    let gateway = state.chat_engine.gateway();
    let audio = gateway.tts(&request.text).await?;
    let content_type = audio_content_type(&gateway.options().speech.format);

    Ok(([(header::CONTENT_TYPE, content_type)], audio).into_response())
}

/// Expects the audio clip in a multipart field named `file`
pub async fn transcription(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<String, ChatError> {
    let invalid =
        |e: axum::extract::multipart::MultipartError| ChatError::InvalidRequest(e.to_string());

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("audio.mp3").to_string();
        let bytes = field.bytes().await.map_err(invalid)?;
        let audio = AudioFile {
            filename,
            bytes: bytes.to_vec(),
        };
        return Ok(state.chat_engine.gateway().stt(audio).await?);
    }

    Err(ChatError::InvalidRequest("missing multipart field 'file'".into()))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::providers::scripted::ScriptedProvider;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn multipart_request(field: &str, filename: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--XBOUNDARY\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             {content}\r\n\
             --XBOUNDARY--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri("/audio/transcriptions")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
            .body(Body::from(body))
            .unwrap()
    }

    #[test]
    fn test_audio_content_type() {
        assert_eq!(audio_content_type("mp3"), "audio/mpeg");
        assert_eq!(audio_content_type("wav"), "audio/wav");
    }

    #[tokio::test]
    async fn test_embeddings_one_vector_per_text() {
        let app = app(ScriptedProvider::default()).await;

        let response = app
            .oneshot(post_json("/embeddings", r#"{"texts":["a","abcd"]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "[[1.0],[4.0]]");
    }

    #[tokio::test]
    async fn test_images_return_urls() {
        let app = app(ScriptedProvider::default()).await;

        let response = app
            .oneshot(post_json(
                "/images",
                r#"{"text":"cat","count":2,"height":512,"width":768}"#,
            ))
            .await
            .unwrap();

        let urls: Vec<String> = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(urls.len(), 2);
        assert!(urls[0].contains("/hd/768x512/"));
    }

    #[tokio::test]
    async fn test_speech_returns_mpeg() {
        let app = app(ScriptedProvider::default()).await;

        let response = app
            .oneshot(post_json("/audio/speech", r#"{"text":"abc"}"#))
            .await
            .unwrap();

        assert_eq!(response.headers()["content-type"], "audio/mpeg");
        assert_eq!(body_bytes(response).await, b"abc".to_vec());
    }

    #[tokio::test]
    async fn test_transcription_reads_file_field() {
        let app = app(ScriptedProvider::default()).await;

        let response = app
            .oneshot(multipart_request("file", "clip.mp3", "abcd"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ko:clip.mp3:4");
    }

    #[tokio::test]
    async fn test_transcription_without_file_is_bad_request() {
        let app = app(ScriptedProvider::default()).await;

        let response = app
            .oneshot(multipart_request("audio", "clip.mp3", "abcd"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
