//! In-memory chat memory: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use spindle_core::error::MemoryError;
use spindle_core::memory::ChatMemory;
use spindle_core::message::{ConversationId, Message};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Conversation histories keyed by id, behind a single async lock.
///
/// Concurrent appends to the same conversation are serialized by the write
/// lock, so each caller's batch lands contiguously and in order.
#[derive(Clone, Default)]
pub struct InMemoryChatMemory {
    conversations: Arc<RwLock<HashMap<ConversationId, Vec<Message>>>>,
}

impl InMemoryChatMemory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatMemory for InMemoryChatMemory {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(&self, conversation: &ConversationId, messages: Vec<Message>) -> Result<(), MemoryError> {
        if messages.is_empty() {
            return Ok(());
        }
        self.conversations
            .write()
            .await
            .entry(conversation.clone())
            .or_default()
            .extend(messages);
        Ok(())
    }

    async fn load(&self, conversation: &ConversationId) -> Result<Vec<Message>, MemoryError> {
        Ok(self
            .conversations
            .read()
            .await
            .get(conversation)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear(&self, conversation: &ConversationId) -> Result<(), MemoryError> {
        self.conversations.write().await.remove(conversation);
        Ok(())
    }

    async fn conversation_ids(&self) -> Result<Vec<ConversationId>, MemoryError> {
        let mut ids: Vec<_> = self.conversations.read().await.keys().cloned().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(ids)
    }
}
