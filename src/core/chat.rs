//! Chat engine with memory and durable history
//!
//! A streamed exchange:
//! 1. Loads the session's memory window and appends the user message
//! 2. Streams the model's reply to the whole window, forwarding each chunk
//! 3. On normal completion, appends the reply to the window, saves it, and
//!    writes the user/assistant turn pair to the history log
//!
//! If the upstream stream fails, the error is the last item the caller sees
//! and step 3 is skipped. Chunks already forwarded stay delivered.

use std::sync::Arc;

use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::conversation::{Message, MessageWindow, Role, SessionKey};
use crate::providers::ProviderError;

use super::gateway::ModelGateway;
use super::history::{
    ChatHistoryRepository, ChatMemoryRepository, ChatTurn, NewChatTurn, PersistenceError,
};

/// Reply chunks of one exchange. An `Err` item is terminal.
pub type ReplyStream = BoxStream<'static, Result<String, ChatError>>;

/// Errors from the chat engine
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// The core chat engine
pub struct ChatEngine {
    gateway: Arc<ModelGateway>,
    memory: Arc<dyn ChatMemoryRepository>,
    history: Arc<dyn ChatHistoryRepository>,
    window_size: usize,
}

impl ChatEngine {
    pub fn new(
        gateway: Arc<ModelGateway>,
        memory: Arc<dyn ChatMemoryRepository>,
        history: Arc<dyn ChatHistoryRepository>,
    ) -> Self {
        let window_size = gateway.options().memory.max_messages;
        Self {
            gateway,
            memory,
            history,
            window_size,
        }
    }

    pub fn gateway(&self) -> &ModelGateway {
        &self.gateway
    }

    /// Stateless single-shot chat; nothing is remembered or logged
    pub async fn chat(&self, text: &str) -> Result<String, ChatError> {
        Ok(self.gateway.generate(text).await?)
    }

    /// Stream a reply to `text` in the context of `session`'s memory window.
    ///
    /// Nothing happens until the stream is polled. Dropping it before the
    /// end cancels the upstream call and skips the history write.
    pub fn chat_stream(&self, session: SessionKey, text: String) -> ReplyStream {
        let gateway = Arc::clone(&self.gateway);
        let memory = Arc::clone(&self.memory);
        let history = Arc::clone(&self.history);
        let window_size = self.window_size;
        let exchange = Uuid::new_v4();

        Box::pin(try_stream! {
            info!(%exchange, %session, "chat exchange started");
            let user_turn = NewChatTurn::new(session.clone(), Role::User, &text);

            let stored = memory.find(&session).await?;
            let mut window = MessageWindow::from_messages(window_size, stored);
            window.push(Message::user(&text));
            memory.save_all(&session, window.messages()).await?;

            let mut reply = String::new();
            let mut upstream = gateway.stream_messages(window.messages().to_vec());
            while let Some(chunk) = upstream.next().await {
                let chunk = chunk.map_err(|e| {
                    warn!(
                        %exchange,
                        %session,
                        error = %e,
                        "upstream stream failed, exchange not recorded"
                    );
                    e
                })?;
                reply.push_str(&chunk);
                yield chunk;
            }

            window.push(Message::assistant(&reply));
            memory.save_all(&session, window.messages()).await?;

            let assistant_turn = NewChatTurn::new(session.clone(), Role::Assistant, &reply);
            history.save(&[user_turn, assistant_turn]).await?;

            info!(%exchange, %session, chars = reply.len(), "chat exchange recorded");
        })
    }

    /// Every recorded turn of `session`, oldest first
    pub async fn history(&self, session: &SessionKey) -> Result<Vec<ChatTurn>, ChatError> {
        Ok(self.history.find_ordered(session).await?)
    }
}
