//! AI provider integrations

mod openai;
#[cfg(test)]
pub mod scripted;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::config::{ChatOptions, ImageOptions, SpeechOptions, TranscriptionOptions};
use crate::conversation::Message;

pub use openai::{OpenAIConfig, OpenAIProvider};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Stream error: {0}")]
    Stream(String),
}

/// Raw streamed deltas. `None` marks a chunk that carried no text.
pub type ChunkStream = BoxStream<'static, Result<Option<String>, ProviderError>>;

/// Caller-supplied image constraints, passed through verbatim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSpec {
    pub count: u32,
    pub height: u32,
    pub width: u32,
}

/// An uploaded audio clip to transcribe
#[derive(Debug, Clone)]
pub struct AudioFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// A hosted model service
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;

    /// First result of a chat completion; `None` when it carried no text
    async fn chat(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<Option<String>, ProviderError>;

    async fn chat_stream(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<ChunkStream, ProviderError>;

    /// One vector per input, in input order
    async fn embed(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// URLs of the generated images
    async fn generate_images(
        &self,
        prompt: &str,
        spec: ImageSpec,
        options: &ImageOptions,
    ) -> Result<Vec<String>, ProviderError>;

    async fn speech(&self, text: &str, options: &SpeechOptions) -> Result<Vec<u8>, ProviderError>;

    async fn transcribe(
        &self,
        audio: AudioFile,
        options: &TranscriptionOptions,
    ) -> Result<String, ProviderError>;
}
