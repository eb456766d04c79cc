//! Application configuration

pub mod models;

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use models::{
    ChatOptions, ConfigError, EmbeddingOptions, ImageOptions, ModelOptions, SpeechOptions,
    TranscriptionOptions,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_organization: Option<String>,
    pub data_dir: PathBuf,
    /// Optional TOML file with model options
    pub models_path: Option<PathBuf>,
    /// Session key used when a streaming request names none
    pub default_session_key: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            openai_organization: env::var("OPENAI_ORGANIZATION").ok(),
            data_dir: env::var("CHATGATE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            models_path: env::var("CHATGATE_MODELS").ok().map(PathBuf::from),
            default_session_key: env::var("CHATGATE_SESSION_KEY")
                .unwrap_or_else(|_| "default".into()),
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("chatgate.db")
    }

    /// Model options from `models_path`, or the defaults when unset
    pub fn load_models(&self) -> Result<ModelOptions, ConfigError> {
        match &self.models_path {
            Some(path) => ModelOptions::from_file(path),
            None => Ok(ModelOptions::default()),
        }
    }
}
