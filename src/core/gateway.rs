//! Model gateway
//!
//! Translates plain inputs into provider calls with the configured model
//! options, and provider responses back into plain values. No retries and
//! no validation beyond what the provider enforces.

use std::sync::Arc;

use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::debug;

use crate::config::ModelOptions;
use crate::conversation::Message;
use crate::providers::{AudioFile, ImageSpec, ModelProvider, ProviderError};

/// Streamed reply text, in provider order. Ends on completion; an `Err`
/// item is terminal. Dropping the stream cancels the upstream request.
pub type TextStream = BoxStream<'static, Result<String, ProviderError>>;

pub struct ModelGateway {
    provider: Arc<dyn ModelProvider>,
    options: ModelOptions,
}

impl ModelGateway {
    pub fn new(provider: Arc<dyn ModelProvider>, options: ModelOptions) -> Self {
        Self { provider, options }
    }

    pub fn options(&self) -> &ModelOptions {
        &self.options
    }

    /// Single-shot completion: empty system prompt, the user text and an
    /// empty assistant turn.
    pub async fn generate(&self, text: &str) -> Result<String, ProviderError> {
        let messages = [
            Message::system(""),
            Message::user(text),
            Message::assistant(""),
        ];

        debug!(provider = self.provider.name(), model = %self.options.chat.model, "chat call");
        let reply = self.provider.chat(&messages, &self.options.chat).await?;
        Ok(reply.unwrap_or_default())
    }

    pub fn generate_stream(&self, text: &str) -> TextStream {
        self.stream_messages(vec![Message::user(text)])
    }

    /// Stream a reply to `messages`. The request is sent on first poll, and
    /// chunks without text are dropped.
    pub fn stream_messages(&self, messages: Vec<Message>) -> TextStream {
        let provider = Arc::clone(&self.provider);
        let options = self.options.chat.clone();

        Box::pin(try_stream! {
            debug!(
                provider = provider.name(),
                model = %options.model,
                messages = messages.len(),
                "chat stream"
            );
            let mut upstream = provider.chat_stream(&messages, &options).await?;

            while let Some(chunk) = upstream.next().await {
                if let Some(text) = chunk? {
                    if !text.is_empty() {
                        yield text;
                    }
                }
            }
        })
    }

    /// One vector per text, in input order. `model` falls back to the
    /// configured embedding model.
    pub async fn generate_embedding(
        &self,
        texts: &[String],
        model: Option<&str>,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        let model = model.unwrap_or(&self.options.embedding.model);
        debug!(model, count = texts.len(), "embedding call");
        self.provider.embed(texts, model).await
    }

    pub async fn generate_image(
        &self,
        text: &str,
        count: u32,
        height: u32,
        width: u32,
    ) -> Result<Vec<String>, ProviderError> {
        let spec = ImageSpec {
            count,
            height,
            width,
        };
        debug!(count, height, width, quality = %self.options.image.quality, "image call");
        self.provider
            .generate_images(text, spec, &self.options.image)
            .await
    }

    /// Synthesized speech, encoded per the speech options (mp3 by default)
    pub async fn tts(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        debug!(model = %self.options.speech.model, chars = text.len(), "speech call");
        self.provider.speech(text, &self.options.speech).await
    }

    /// Transcript in the configured language and subtitle format
    pub async fn stt(&self, audio: AudioFile) -> Result<String, ProviderError> {
        debug!(
            filename = %audio.filename,
            bytes = audio.bytes.len(),
            language = %self.options.transcription.language,
            "transcription call"
        );
        self.provider
            .transcribe(audio, &self.options.transcription)
            .await
    }
}
