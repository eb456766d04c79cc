//! Model options loaded from a TOML file
//!
//! Every setting has a default, so an empty file (or no file at all) yields
//! the stock configuration:
//!
//! ```toml
//! [chat]
//! model = "gpt-4.1-mini"
//! temperature = 0.7
//!
//! [memory]
//! max_messages = 10
//!
//! [transcription]
//! language = "ko"
//! format = "vtt"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root model configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelOptions {
    #[serde(default)]
    pub chat: ChatOptions,

    #[serde(default)]
    pub memory: MemoryOptions,

    #[serde(default)]
    pub embedding: EmbeddingOptions,

    #[serde(default)]
    pub image: ImageOptions,

    #[serde(default)]
    pub speech: SpeechOptions,

    #[serde(default)]
    pub transcription: TranscriptionOptions,

    #[serde(default)]
    pub http: HttpOptions,
}

impl ModelOptions {
    /// Load options from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load options from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let options: ModelOptions = toml::from_str(content)?;
        options.validate()?;
        Ok(options)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.memory.max_messages == 0 {
            return Err(ConfigError::Validation(
                "memory.max_messages must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.chat.temperature) {
            return Err(ConfigError::Validation(format!(
                "chat.temperature {} is outside 0.0..=2.0",
                self.chat.temperature
            )));
        }
        Ok(())
    }
}

/// Chat completion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOptions {
    #[serde(default = "default_chat_model")]
    pub model: String,

    #[serde(default = "default_chat_temperature")]
    pub temperature: f32,
}

fn default_chat_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_chat_temperature() -> f32 {
    0.7
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            temperature: default_chat_temperature(),
        }
    }
}

/// Rolling memory window settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryOptions {
    /// Messages kept per session before the oldest is dropped
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
}

fn default_max_messages() -> usize {
    10
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
        }
    }
}

/// Embedding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingOptions {
    /// Used when a request does not name a model
    #[serde(default = "default_embedding_model")]
    pub model: String,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

impl Default for EmbeddingOptions {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
        }
    }
}

/// Image generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageOptions {
    #[serde(default = "default_image_model")]
    pub model: String,

    #[serde(default = "default_image_quality")]
    pub quality: String,
}

fn default_image_model() -> String {
    "dall-e-3".to_string()
}

fn default_image_quality() -> String {
    "hd".to_string()
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            model: default_image_model(),
            quality: default_image_quality(),
        }
    }
}

/// Text-to-speech settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechOptions {
    #[serde(default = "default_speech_model")]
    pub model: String,

    #[serde(default = "default_speech_voice")]
    pub voice: String,

    #[serde(default = "default_speech_speed")]
    pub speed: f32,

    /// Audio container: "mp3", "opus", "aac", "flac", "wav" or "pcm"
    #[serde(default = "default_speech_format")]
    pub format: String,
}

fn default_speech_model() -> String {
    "tts-1".to_string()
}

fn default_speech_voice() -> String {
    "alloy".to_string()
}

fn default_speech_speed() -> f32 {
    1.0
}

fn default_speech_format() -> String {
    "mp3".to_string()
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            model: default_speech_model(),
            voice: default_speech_voice(),
            speed: default_speech_speed(),
            format: default_speech_format(),
        }
    }
}

/// Speech-to-text settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionOptions {
    #[serde(default = "default_transcription_model")]
    pub model: String,

    /// ISO-639-1 language of the audio
    #[serde(default = "default_transcription_language")]
    pub language: String,

    #[serde(default)]
    pub temperature: f32,

    /// Response format: "json", "text", "srt", "verbose_json" or "vtt"
    #[serde(default = "default_transcription_format")]
    pub format: String,

    /// Style hint passed to the transcription model
    #[serde(default = "default_transcription_prompt")]
    pub prompt: String,
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_transcription_language() -> String {
    "ko".to_string()
}

fn default_transcription_format() -> String {
    "vtt".to_string()
}

fn default_transcription_prompt() -> String {
    "Ask not this, but ask that".to_string()
}

impl Default for TranscriptionOptions {
    fn default() -> Self {
        Self {
            model: default_transcription_model(),
            language: default_transcription_language(),
            temperature: 0.0,
            format: default_transcription_format(),
            prompt: default_transcription_prompt(),
        }
    }
}

/// Outbound HTTP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpOptions {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}
