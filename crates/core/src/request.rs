//! Request and response values that flow through the advisor chain.
//!
//! A [`ChatRequest`] is built once per logical call and then transformed by
//! value: each advisor stage consumes the request it receives and forwards a
//! new one. A [`ChatResponse`] is either terminal (final content) or a
//! tool-call response (the assistant message carries tool calls).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::message::{ConversationId, Message, MessageToolCall, Role};
use crate::provider::{
    ChatOptions, FinishReason, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition,
    Usage, default_temperature,
};

/// A logical request as seen by advisors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Scopes message history; advisors must never change it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,

    /// Ordered messages (system, history, user turn, tool rounds)
    pub messages: Vec<Message>,

    /// Resolved model options for this call
    #[serde(default)]
    pub options: ChatOptions,

    /// Tools the model may call this round
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Shared advisor context, carried into the response
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_conversation_id(mut self, id: Option<ConversationId>) -> Self {
        self.conversation_id = id;
        self
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Replace the message list, keeping everything else.
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Text of the last user message, if any.
    pub fn user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    /// Rewrite the last user message with `f`. No-op if there is no user message.
    pub fn map_user_text(mut self, f: impl FnOnce(&str) -> String) -> Self {
        if let Some(pos) = self.messages.iter().rposition(|m| m.role == Role::User) {
            let rewritten = f(&self.messages[pos].content);
            self.messages[pos] = self.messages[pos].with_content(rewritten);
        }
        self
    }

    /// Build the wire request for a provider.
    pub fn to_provider_request(&self, default_model: &str, stream: bool) -> ProviderRequest {
        ProviderRequest {
            model: self
                .options
                .model
                .clone()
                .unwrap_or_else(|| default_model.to_string()),
            messages: self.messages.clone(),
            temperature: self.options.temperature.unwrap_or_else(default_temperature),
            max_tokens: self.options.max_tokens,
            top_p: self.options.top_p,
            tools: self.tools.clone(),
            stream,
            stop: self.options.stop.clone(),
            response_format: self.options.response_format.clone(),
        }
    }
}

/// A response as seen by advisors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The assistant message (text and/or tool calls)
    pub message: Message,

    pub usage: Option<Usage>,

    pub model: String,

    #[serde(default)]
    pub finish_reason: FinishReason,

    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Advisor context carried over from the request
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
}

impl ChatResponse {
    pub fn from_provider(response: ProviderResponse, context: Map<String, Value>) -> Self {
        Self {
            message: response.message,
            usage: response.usage,
            model: response.model,
            finish_reason: response.finish_reason,
            metadata: response.metadata,
            context,
        }
    }

    /// A terminal text response not produced by a model (e.g. a guard refusal).
    pub fn text(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            message: Message::assistant(content),
            usage: None,
            model: model.into(),
            finish_reason: FinishReason::Stop,
            metadata: Map::new(),
            context: Map::new(),
        }
    }

    /// Whether the model is asking for a tool round rather than answering.
    pub fn is_tool_call(&self) -> bool {
        self.message.has_tool_calls()
    }

    pub fn content(&self) -> &str {
        &self.message.content
    }

    pub fn tool_calls(&self) -> &[MessageToolCall] {
        &self.message.tool_calls
    }
}

/// Folds an ordered sequence of fragments into one logical response.
///
/// Text deltas are concatenated in arrival order, tool calls are collected,
/// and the last reported usage / finish reason wins.
#[derive(Debug, Default)]
pub struct FragmentAggregator {
    model: String,
    content: String,
    tool_calls: Vec<MessageToolCall>,
    usage: Option<Usage>,
    finish_reason: Option<FinishReason>,
    fragments: usize,
}

impl FragmentAggregator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn push(&mut self, chunk: &StreamChunk) {
        self.fragments += 1;
        if let Some(text) = &chunk.content {
            self.content.push_str(text);
        }
        self.tool_calls.extend(chunk.tool_calls.iter().cloned());
        if chunk.usage.is_some() {
            self.usage = chunk.usage;
        }
        if chunk.finish_reason.is_some() {
            self.finish_reason = chunk.finish_reason;
        }
    }

    /// Number of fragments seen so far.
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn finish(self, context: Map<String, Value>) -> ChatResponse {
        let finish_reason = self.finish_reason.unwrap_or(if self.tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        });
        ChatResponse {
            message: Message::assistant_tool_calls(self.content, self.tool_calls),
            usage: self.usage,
            model: self.model,
            finish_reason,
            metadata: Map::new(),
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_user_text_rewrites_only_last_user_message() {
        let request = ChatRequest::new(vec![
            Message::system("rules"),
            Message::user("first"),
            Message::assistant("ok"),
            Message::user("second"),
        ]);
        let rewritten = request.map_user_text(|t| format!("{t}!"));
        assert_eq!(rewritten.messages[1].content, "first");
        assert_eq!(rewritten.messages[3].content, "second!");
    }

    #[test]
    fn provider_request_falls_back_to_default_model() {
        let request = ChatRequest::new(vec![Message::user("hi")]);
        let wire = request.to_provider_request("gpt-4o-mini", false);
        assert_eq!(wire.model, "gpt-4o-mini");
        assert!((wire.temperature - 0.7).abs() < f32::EPSILON);

        let request = request.with_options(ChatOptions::default().model("gpt-5").temperature(1.0));
        let wire = request.to_provider_request("gpt-4o-mini", true);
        assert_eq!(wire.model, "gpt-5");
        assert!(wire.stream);
    }

    #[test]
    fn aggregator_concatenates_in_order() {
        let mut agg = FragmentAggregator::new("mock");
        agg.push(&StreamChunk::text("Hel"));
        agg.push(&StreamChunk::text("lo"));
        agg.push(&StreamChunk {
            done: true,
            usage: Some(Usage { prompt_tokens: 3, completion_tokens: 2, total_tokens: 5 }),
            ..StreamChunk::default()
        });
        assert_eq!(agg.fragments(), 3);
        let response = agg.finish(Map::new());
        assert_eq!(response.content(), "Hello");
        assert_eq!(response.usage.unwrap().total_tokens, 5);
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert!(!response.is_tool_call());
    }

    #[test]
    fn aggregator_infers_tool_call_finish() {
        let mut agg = FragmentAggregator::new("mock");
        agg.push(&StreamChunk {
            tool_calls: vec![MessageToolCall {
                id: "call_1".into(),
                name: "create_task".into(),
                arguments: "{}".into(),
            }],
            done: true,
            ..StreamChunk::default()
        });
        let response = agg.finish(Map::new());
        assert!(response.is_tool_call());
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
    }
}
