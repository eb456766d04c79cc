//! chatgate - chat and media facade over OpenAI-compatible APIs
//!
//! Forwards text to a hosted model's chat, embedding, image, speech and
//! transcription endpoints. Streamed chats keep a rolling memory window per
//! session and an append-only history of every turn in SQLite.

pub mod config;
pub mod conversation;
pub mod core;
pub mod providers;
pub mod routes;
