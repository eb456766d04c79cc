//! Chat history and memory window storage using SQLite

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::conversation::{Message, Role, SessionKey};

use super::history::{
    ChatHistoryRepository, ChatMemoryRepository, ChatTurn, NewChatTurn, PersistenceError,
};

/// SQLite store backing both the history log and the memory windows
pub struct MemoryStore {
    pool: SqlitePool,
}

impl MemoryStore {
    /// Open (or create) the SQLite database at `db_path`
    pub async fn new(db_path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create an in-memory store for testing
    pub async fn new_in_memory() -> Result<Self, PersistenceError> {
        // A single connection that never recycles, or the database vanishes
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_key TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_chat_turns_session
            ON chat_turns(session_key, created_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_memory (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_key TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_chat_memory_session
            ON chat_memory(session_key, id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn parse_role(role: &str) -> Result<Role, PersistenceError> {
    role.parse().map_err(PersistenceError::Corrupt)
}

/// Fixed-width UTC timestamps, so text order is time order
fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(at: &str) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PersistenceError::Corrupt(format!("bad timestamp '{}': {}", at, e)))
}

fn turn_from_row(row: (i64, String, String, String, String)) -> Result<ChatTurn, PersistenceError> {
    let (id, session_key, role, content, created_at) = row;
    Ok(ChatTurn {
        id,
        session_key,
        role: parse_role(&role)?,
        content,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait]
impl ChatHistoryRepository for MemoryStore {
    async fn save(&self, turns: &[NewChatTurn]) -> Result<(), PersistenceError> {
        if turns.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        let mut floor: Option<DateTime<Utc>> = None;
        for turn in turns {
            // A batch never sorts out of its own order, even if the clock stepped back
            let created_at = match floor {
                Some(floor) if turn.created_at < floor => floor,
                _ => turn.created_at,
            };
            floor = Some(created_at);

            sqlx::query(
                r#"
                INSERT INTO chat_turns (session_key, role, content, created_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(turn.session_key.as_str())
            .bind(turn.role.as_str())
            .bind(&turn.content)
            .bind(format_timestamp(&created_at))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(count = turns.len(), "saved chat turns");
        Ok(())
    }

    async fn find_ordered(&self, session: &SessionKey) -> Result<Vec<ChatTurn>, PersistenceError> {
        let rows: Vec<(i64, String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT id, session_key, role, content, created_at
            FROM chat_turns
            WHERE session_key = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(session.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(turn_from_row).collect()
    }
}

#[async_trait]
impl ChatMemoryRepository for MemoryStore {
    async fn find(&self, session: &SessionKey) -> Result<Vec<Message>, PersistenceError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT role, content
            FROM chat_memory
            WHERE session_key = ?
            ORDER BY id ASC
            "#,
        )
        .bind(session.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(role, content)| -> Result<Message, PersistenceError> {
                Ok(Message {
                    role: parse_role(&role)?,
                    content,
                })
            })
            .collect()
    }

    async fn save_all(
        &self,
        session: &SessionKey,
        messages: &[Message],
    ) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chat_memory WHERE session_key = ?")
            .bind(session.as_str())
            .execute(&mut *tx)
            .await?;

        for message in messages {
            sqlx::query(
                r#"
                INSERT INTO chat_memory (session_key, role, content)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(session.as_str())
            .bind(message.role.as_str())
            .bind(&message.content)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(k: &str) -> SessionKey {
        SessionKey::new(k).unwrap()
    }

    #[tokio::test]
    async fn test_history_round_trip() {
        let store = MemoryStore::new_in_memory().await.unwrap();
        let session = key("alice_1");

        store
            .save(&[
                NewChatTurn::new(session.clone(), Role::User, "Hello"),
                NewChatTurn::new(session.clone(), Role::Assistant, "Hi there!"),
            ])
            .await
            .unwrap();

        let turns = store.find_ordered(&session).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].content, "Hello");
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].content, "Hi there!");
        assert_eq!(turns[0].session_key, "alice_1");
        assert!(turns[0].created_at <= turns[1].created_at);
    }

    #[tokio::test]
    async fn test_find_ordered_sorts_by_creation_time() {
        let store = MemoryStore::new_in_memory().await.unwrap();
        let session = key("s");

        let earlier = NewChatTurn::new(session.clone(), Role::User, "first");
        let mut later = NewChatTurn::new(session.clone(), Role::Assistant, "second");
        later.created_at = earlier.created_at + chrono::Duration::seconds(5);

        // Written out of order
        store.save(&[later]).await.unwrap();
        store.save(&[earlier]).await.unwrap();

        let contents: Vec<_> = store
            .find_ordered(&session)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.content)
            .collect();
        assert_eq!(contents, ["first", "second"]);
    }

    #[tokio::test]
    async fn test_batch_keeps_its_order_when_clock_steps_back() {
        let store = MemoryStore::new_in_memory().await.unwrap();
        let session = key("s");

        let user = NewChatTurn::new(session.clone(), Role::User, "question");
        let mut assistant = NewChatTurn::new(session.clone(), Role::Assistant, "answer");
        assistant.created_at = user.created_at - chrono::Duration::seconds(30);

        store.save(&[user, assistant]).await.unwrap();

        let turns = store.find_ordered(&session).await.unwrap();
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[0].created_at, turns[1].created_at);
    }

    #[tokio::test]
    async fn test_find_ordered_is_idempotent() {
        let store = MemoryStore::new_in_memory().await.unwrap();
        let session = key("s");
        store
            .save(&[NewChatTurn::new(session.clone(), Role::User, "Hello")])
            .await
            .unwrap();

        let first = store.find_ordered(&session).await.unwrap();
        let second = store.find_ordered(&session).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = MemoryStore::new_in_memory().await.unwrap();
        store
            .save(&[NewChatTurn::new(key("a"), Role::User, "from a")])
            .await
            .unwrap();
        store
            .save(&[NewChatTurn::new(key("b"), Role::User, "from b")])
            .await
            .unwrap();
        store
            .save_all(&key("a"), &[Message::user("window a")])
            .await
            .unwrap();

        let turns = store.find_ordered(&key("b")).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "from b");
        assert!(store.find(&key("b")).await.unwrap().is_empty());
        assert!(store.find_ordered(&key("c")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_all_replaces_window() {
        let store = MemoryStore::new_in_memory().await.unwrap();
        let session = key("s");

        store
            .save_all(&session, &[Message::user("one"), Message::assistant("two")])
            .await
            .unwrap();
        store
            .save_all(&session, &[Message::assistant("two"), Message::user("three")])
            .await
            .unwrap();

        let window = store.find(&session).await.unwrap();
        assert_eq!(window, vec![Message::assistant("two"), Message::user("three")]);
    }

    #[tokio::test]
    async fn test_unknown_role_is_corrupt() {
        let store = MemoryStore::new_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO chat_memory (session_key, role, content) VALUES ('s', 'tool', 'x')",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let result = store.find(&key("s")).await;
        assert!(matches!(result, Err(PersistenceError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chatgate.db");
        let session = key("s");

        {
            let store = MemoryStore::new(&path).await.unwrap();
            store
                .save(&[NewChatTurn::new(session.clone(), Role::User, "persisted")])
                .await
                .unwrap();
        }

        let store = MemoryStore::new(&path).await.unwrap();
        let turns = store.find_ordered(&session).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "persisted");
    }
}
