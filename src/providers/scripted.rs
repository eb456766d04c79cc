//! In-process provider with canned answers, for tests

use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use crate::config::{ChatOptions, ImageOptions, SpeechOptions, TranscriptionOptions};
use crate::conversation::Message;

use super::{AudioFile, ChunkStream, ImageSpec, ModelProvider, ProviderError};

/// One scripted streaming event
#[derive(Debug, Clone)]
pub enum Chunk {
    Text(&'static str),
    Empty,
    Fail(&'static str),
}

/// Replays fixed replies and records every prompt it was sent
#[derive(Default)]
pub struct ScriptedProvider {
    reply: Option<String>,
    chunks: Vec<Chunk>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            ..Self::default()
        }
    }

    pub fn streaming(chunks: Vec<Chunk>) -> Self {
        Self {
            chunks,
            ..Self::default()
        }
    }

    /// Every message list passed to `chat` or `chat_stream`, in call order
    pub fn prompts(&self) -> Vec<Vec<Message>> {
        self.prompts.lock().unwrap().clone()
    }

    fn record(&self, messages: &[Message]) {
        self.prompts.lock().unwrap().push(messages.to_vec());
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(
        &self,
        messages: &[Message],
        _options: &ChatOptions,
    ) -> Result<Option<String>, ProviderError> {
        self.record(messages);
        Ok(self.reply.clone())
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        _options: &ChatOptions,
    ) -> Result<ChunkStream, ProviderError> {
        self.record(messages);
        let items: Vec<_> = self
            .chunks
            .iter()
            .map(|chunk| match chunk {
                Chunk::Text(text) => Ok(Some(text.to_string())),
                Chunk::Empty => Ok(None),
                Chunk::Fail(reason) => Err(ProviderError::Stream(reason.to_string())),
            })
            .collect();
        Ok(Box::pin(stream::iter(items)))
    }

    async fn embed(&self, texts: &[String], _model: &str) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
    }

    async fn generate_images(
        &self,
        prompt: &str,
        spec: ImageSpec,
        options: &ImageOptions,
    ) -> Result<Vec<String>, ProviderError> {
        Ok((0..spec.count)
            .map(|i| {
                format!(
                    "https://images.test/{}/{}x{}/{}/{}",
                    options.quality, spec.width, spec.height, i, prompt.len()
                )
            })
            .collect())
    }

    async fn speech(&self, text: &str, _options: &SpeechOptions) -> Result<Vec<u8>, ProviderError> {
        Ok(text.as_bytes().to_vec())
    }

    async fn transcribe(
        &self,
        audio: AudioFile,
        options: &TranscriptionOptions,
    ) -> Result<String, ProviderError> {
        Ok(format!(
            "{}:{}:{}",
            options.language,
            audio.filename,
            audio.bytes.len()
        ))
    }
}
