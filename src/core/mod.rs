//! Core chat components
//!
//! The model gateway, the streaming chat engine and the stores behind it.

mod chat;
mod gateway;
mod history;
mod memory;

pub use chat::{ChatEngine, ChatError, ReplyStream};
pub use gateway::{ModelGateway, TextStream};
pub use history::{
    ChatHistoryRepository, ChatMemoryRepository, ChatTurn, NewChatTurn, PersistenceError,
};
pub use memory::MemoryStore;
