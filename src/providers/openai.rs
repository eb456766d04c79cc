//! OpenAI provider
//!
//! Talks to the OpenAI REST API, or to any server that mirrors it:
//! - `/chat/completions` (plain and server-sent-event streaming)
//! - `/embeddings`
//! - `/images/generations`
//! - `/audio/speech`
//! - `/audio/transcriptions`

use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::{Stream, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use crate::config::{ChatOptions, ImageOptions, SpeechOptions, TranscriptionOptions};
use crate::conversation::Message;

use super::{AudioFile, ChunkStream, ImageSpec, ModelProvider, ProviderError};

/// OpenAI chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }
    }
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

impl ChatCompletionRequest {
    fn new(messages: &[Message], options: &ChatOptions, stream: bool) -> Self {
        Self {
            model: options.model.clone(),
            messages: messages.iter().map(ChatMessage::from).collect(),
            temperature: options.temperature,
            stream,
        }
    }
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// One `data:` payload of a streamed completion
#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: String,
    quality: &'a str,
    response_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranscriptionJson {
    text: String,
}

/// Error response from API
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// OpenAI provider configuration
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API (e.g., https://api.openai.com/v1)
    pub base_url: String,
    /// API key (optional for local servers)
    pub api_key: Option<String>,
    /// Optional organization ID
    pub organization: Option<String>,
    /// Deadline for a whole non-streaming call, and the longest a streamed
    /// reply may go quiet between chunks, in seconds
    pub timeout_secs: u64,
}

/// OpenAI API provider
pub struct OpenAIProvider {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig) -> Result<Self, ProviderError> {
        // Streams are bounded by idle time between chunks, not total time
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;

        Ok(Self { config, client })
    }

    /// POST with a deadline covering the whole response
    fn post(&self, path: &str) -> RequestBuilder {
        self.post_streaming(path)
            .timeout(Duration::from_secs(self.config.timeout_secs))
    }

    /// POST bounded only by the connect and idle-read timeouts
    fn post_streaming(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let mut req_builder = self.client.post(url);

        if let Some(ref api_key) = self.config.api_key {
            req_builder = req_builder.bearer_auth(api_key);
        }

        if let Some(ref org) = self.config.organization {
            req_builder = req_builder.header("OpenAI-Organization", org);
        }

        req_builder
    }
}

/// Turn a non-2xx response into a `ProviderError::Api`
async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(error_resp) => error_resp.error.message,
        Err(_) => body,
    };

    Err(ProviderError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    let body = check_status(response).await?.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        ProviderError::InvalidResponse(format!("Failed to parse response: {} - Body: {}", e, body))
    })
}

fn parse_chunk(payload: &str) -> Result<Option<String>, ProviderError> {
    let chunk: ChatCompletionChunk = serde_json::from_str(payload)
        .map_err(|e| ProviderError::Stream(format!("Malformed chunk: {} - Data: {}", e, payload)))?;

    if let Some(error) = chunk.error {
        return Err(ProviderError::Stream(error.message));
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content))
}

/// Map an SSE body of chat completion chunks to their text deltas.
///
/// Ends at `[DONE]` or when the body ends, whichever comes first.
fn decode_chat_stream<S, B>(body: S) -> ChunkStream
where
    S: Stream<Item = Result<B, ProviderError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    Box::pin(try_stream! {
        let mut events = Box::pin(body.eventsource());

        while let Some(event) = events.next().await {
            let event = event.map_err(|e| match e {
                EventStreamError::Transport(e) => e,
                other => ProviderError::Stream(other.to_string()),
            })?;
            if event.data == "[DONE]" {
                break;
            }
            if event.data.is_empty() {
                continue;
            }
            yield parse_chunk(&event.data)?;
        }
    })
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<Option<String>, ProviderError> {
        let request = ChatCompletionRequest::new(messages, options, false);
        let response = self.post("/chat/completions").json(&request).send().await?;
        let completion: ChatCompletionResponse = read_json(response).await?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?;

        Ok(choice.message.content)
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<ChunkStream, ProviderError> {
        let request = ChatCompletionRequest::new(messages, options, true);
        let response = self
            .post_streaming("/chat/completions")
            .header("Accept", "text/event-stream")
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ProviderError::from));
        Ok(decode_chat_stream(body))
    }

    async fn embed(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>, ProviderError> {
        let request = EmbeddingRequest { model, input: texts };
        let response = self.post("/embeddings").json(&request).send().await?;
        let mut embeddings: EmbeddingResponse = read_json(response).await?;

        if embeddings.data.len() != texts.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embeddings.data.len()
            )));
        }

        embeddings.data.sort_by_key(|d| d.index);
        Ok(embeddings.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn generate_images(
        &self,
        prompt: &str,
        spec: ImageSpec,
        options: &ImageOptions,
    ) -> Result<Vec<String>, ProviderError> {
        let request = ImageRequest {
            model: &options.model,
            prompt,
            n: spec.count,
            size: format!("{}x{}", spec.width, spec.height),
            quality: &options.quality,
            response_format: "url",
        };
        let response = self.post("/images/generations").json(&request).send().await?;
        let images: ImageResponse = read_json(response).await?;

        images
            .data
            .into_iter()
            .map(|image| {
                image
                    .url
                    .ok_or_else(|| ProviderError::InvalidResponse("Image without URL".to_string()))
            })
            .collect()
    }

    async fn speech(&self, text: &str, options: &SpeechOptions) -> Result<Vec<u8>, ProviderError> {
        let request = SpeechRequest {
            model: &options.model,
            input: text,
            voice: &options.voice,
            speed: options.speed,
            response_format: &options.format,
        };
        let response = self.post("/audio/speech").json(&request).send().await?;
        let audio = check_status(response).await?.bytes().await?;

        Ok(audio.to_vec())
    }

    async fn transcribe(
        &self,
        audio: AudioFile,
        options: &TranscriptionOptions,
    ) -> Result<String, ProviderError> {
        let file = Part::bytes(audio.bytes).file_name(audio.filename);
        let form = Form::new()
            .part("file", file)
            .text("model", options.model.clone())
            .text("language", options.language.clone())
            .text("temperature", options.temperature.to_string())
            .text("response_format", options.format.clone())
            .text("prompt", options.prompt.clone());

        let response = self.post("/audio/transcriptions").multipart(form).send().await?;
        let body = check_status(response).await?.text().await?;

        // Subtitle and text formats come back as the raw document
        match options.format.as_str() {
            "json" | "verbose_json" => serde_json::from_str::<TranscriptionJson>(&body)
                .map(|t| t.text)
                .map_err(|e| {
                    ProviderError::InvalidResponse(format!("Failed to parse transcript: {}", e))
                }),
            _ => Ok(body),
        }
    }
}
