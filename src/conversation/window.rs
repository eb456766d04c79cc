//! Bounded rolling context for a session

use super::{Message, Role};

/// The last `capacity` messages of a session, oldest first.
///
/// System messages are kept in preference to conversation messages: when the
/// window overflows, the oldest user/assistant message goes first. A newly
/// added system message replaces any earlier one.
#[derive(Debug, Clone)]
pub struct MessageWindow {
    capacity: usize,
    messages: Vec<Message>,
}

impl MessageWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            messages: Vec::new(),
        }
    }

    /// Rebuild a window from stored messages, trimming anything past capacity.
    pub fn from_messages(capacity: usize, messages: Vec<Message>) -> Self {
        let mut window = Self::new(capacity);
        window.messages = messages;
        window.evict();
        window
    }

    pub fn push(&mut self, message: Message) {
        if message.role == Role::System {
            self.messages.retain(|m| m.role != Role::System);
        }
        self.messages.push(message);
        self.evict();
    }

    fn evict(&mut self) {
        while self.messages.len() > self.capacity {
            let oldest = self
                .messages
                .iter()
                .position(|m| m.role != Role::System)
                .unwrap_or(0);
            self.messages.remove(oldest);
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

}
