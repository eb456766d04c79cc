//! Chat turns and the repositories that persist them

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversation::{Message, Role, SessionKey};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// A persisted chat message. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: i64,
    pub session_key: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A chat turn that has not been written yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewChatTurn {
    pub session_key: SessionKey,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl NewChatTurn {
    /// Stamped with the current time
    pub fn new(session_key: SessionKey, role: Role, content: impl Into<String>) -> Self {
        Self {
            session_key,
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Append-only audit log of every chat turn
#[async_trait]
pub trait ChatHistoryRepository: Send + Sync {
    /// Insert all turns in one batch
    async fn save(&self, turns: &[NewChatTurn]) -> Result<(), PersistenceError>;

    /// Every turn of a session, oldest first
    async fn find_ordered(&self, session: &SessionKey) -> Result<Vec<ChatTurn>, PersistenceError>;
}

/// Storage for each session's rolling message window
#[async_trait]
pub trait ChatMemoryRepository: Send + Sync {
    async fn find(&self, session: &SessionKey) -> Result<Vec<Message>, PersistenceError>;

    /// Replace the stored window with `messages`
    async fn save_all(
        &self,
        session: &SessionKey,
        messages: &[Message],
    ) -> Result<(), PersistenceError>;
}
