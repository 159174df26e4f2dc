//! Conversation memory advisor.
//!
//! Pre-call: loads the conversation's history and inserts it after the
//! system messages, before the new turn. Post-call: appends the turn's user
//! messages and the final assistant message, but only for a terminal
//! response. Tool-call rounds and failures commit nothing. A failed commit
//! fails the call on both the blocking and the streamed path.

use std::sync::Arc;

use async_trait::async_trait;
use spindle_core::advisor::{Advisor, CallChain, StreamChain};
use spindle_core::memory::{ChatMemory, DEFAULT_CONVERSATION_ID};
use spindle_core::message::{ConversationId, Message, Role};
use spindle_core::provider::ChunkStream;
use spindle_core::request::{ChatRequest, ChatResponse};
use spindle_core::{Error, Result};
use tracing::{debug, warn};

use crate::aggregate::aggregate;

pub const DEFAULT_MEMORY_ORDER: i32 = -1000;

pub struct MessageChatMemoryAdvisor {
    memory: Arc<dyn ChatMemory>,
    order: i32,
    default_conversation_id: ConversationId,
    history_limit: Option<usize>,
}

impl MessageChatMemoryAdvisor {
    pub fn new(memory: Arc<dyn ChatMemory>) -> Self {
        Self {
            memory,
            order: DEFAULT_MEMORY_ORDER,
            default_conversation_id: ConversationId::from(DEFAULT_CONVERSATION_ID),
            history_limit: None,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Id used for requests that carry none.
    pub fn with_default_conversation_id(mut self, id: impl Into<ConversationId>) -> Self {
        self.default_conversation_id = id.into();
        self
    }

    /// Replay only the `limit` most recent messages.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    fn conversation_id(&self, request: &ChatRequest) -> ConversationId {
        request
            .conversation_id
            .clone()
            .unwrap_or_else(|| self.default_conversation_id.clone())
    }

    /// Returns the request with history injected and the turn to commit.
    async fn before(&self, request: ChatRequest) -> Result<(ConversationId, ChatRequest, Vec<Message>)> {
        let id = self.conversation_id(&request);
        let history = match self.history_limit {
            Some(limit) => self.memory.load_last(&id, limit).await,
            None => self.memory.load(&id).await,
        }
        .map_err(|e| Error::aborted(self.name(), e.to_string()))?;

        let turn: Vec<Message> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .cloned()
            .collect();

        debug!(conversation_id = %id, history = history.len(), "Injecting conversation history");
        let mut messages = Vec::with_capacity(history.len() + request.messages.len());
        let (system, rest): (Vec<Message>, Vec<Message>) = request
            .messages
            .iter()
            .cloned()
            .partition(|m| m.role == Role::System);
        messages.extend(system);
        messages.extend(history);
        messages.extend(rest);

        Ok((id, request.with_messages(messages), turn))
    }
}

#[async_trait]
impl Advisor for MessageChatMemoryAdvisor {
    fn name(&self) -> &str {
        "MessageChatMemoryAdvisor"
    }

    fn order(&self) -> i32 {
        self.order
    }

    async fn advise_call(&self, request: ChatRequest, next: CallChain<'_>) -> Result<ChatResponse> {
        let (id, request, mut turn) = self.before(request).await?;
        let response = next.next_call(request).await?;

        if !response.is_tool_call() {
            turn.push(response.message.clone());
            self.memory.append(&id, turn).await?;
        }
        Ok(response)
    }

    async fn advise_stream(&self, request: ChatRequest, next: StreamChain<'_>) -> Result<ChunkStream> {
        let (id, request, turn) = self.before(request).await?;
        let stream = next.next_stream(request.clone()).await?;
        let memory = self.memory.clone();

        Ok(aggregate(&request, stream, move |response| async move {
            if response.is_tool_call() {
                return Ok(());
            }
            let mut committed = turn;
            committed.push(response.message);
            memory.append(&id, committed).await.map_err(|e| {
                warn!(conversation_id = %id, error = %e, "Failed to commit streamed turn");
                Error::Memory(e)
            })
        }))
    }
}
