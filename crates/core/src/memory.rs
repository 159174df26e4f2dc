//! Chat memory trait: conversation-scoped message history.
//!
//! A `ChatMemory` stores the ordered messages of each conversation so that
//! later calls with the same [`ConversationId`] can replay them. Backends
//! live in `spindle-memory`.

use async_trait::async_trait;

use crate::error::MemoryError;
use crate::message::{ConversationId, Message};

/// Conversation id used when a call carries none.
pub const DEFAULT_CONVERSATION_ID: &str = "default";

/// The core ChatMemory trait.
#[async_trait]
pub trait ChatMemory: Send + Sync {
    /// A human-readable name for this backend (e.g., "in_memory", "file").
    fn name(&self) -> &str;

    /// Append messages to the end of a conversation, preserving their order.
    async fn append(&self, conversation: &ConversationId, messages: Vec<Message>) -> Result<(), MemoryError>;

    /// Load a conversation's history, oldest first.
    async fn load(&self, conversation: &ConversationId) -> Result<Vec<Message>, MemoryError>;

    /// Forget a conversation.
    async fn clear(&self, conversation: &ConversationId) -> Result<(), MemoryError>;

    /// Every conversation that currently has history.
    async fn conversation_ids(&self) -> Result<Vec<ConversationId>, MemoryError>;

    /// Load only the `limit` most recent messages.
    async fn load_last(&self, conversation: &ConversationId, limit: usize) -> Result<Vec<Message>, MemoryError> {
        let mut history = self.load(conversation).await?;
        if history.len() > limit {
            history.drain(..history.len() - limit);
        }
        Ok(history)
    }
}
