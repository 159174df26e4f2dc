//! Per-call prompt builder.

use std::collections::HashMap;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use spindle_advisors::AdvisorChain;
use spindle_core::advisor::Advisor;
use spindle_core::message::{ConversationId, Message};
use spindle_core::provider::ChatOptions;
use spindle_core::request::{ChatRequest, ChatResponse};
use spindle_core::template::render;
use spindle_core::tool::{Tool, ToolRegistry};
use spindle_core::{Error, Result};
use tokio_util::sync::CancellationToken;

use crate::client::ChatClient;
use crate::loop_runner::{FORMAT_INSTRUCTIONS, TextStream, ToolLoop};
use crate::structured::JsonOutputConverter;

/// One logical call, built fluently and consumed by a terminal method.
///
/// ```ignore
/// let plan: Itinerary = client
///     .prompt()
///     .user("Plan a trip to {city}")
///     .param("city", "Paris")
///     .entity()
///     .await?;
/// ```
#[must_use = "a prompt does nothing until call, content, entity or stream is used"]
pub struct Prompt {
    client: ChatClient,
    system: Option<String>,
    user: Option<String>,
    params: HashMap<String, String>,
    messages: Vec<Message>,
    conversation_id: Option<ConversationId>,
    options: ChatOptions,
    tools: ToolRegistry,
    advisors: AdvisorChain,
    cancel: Option<CancellationToken>,
    format_instructions: Option<String>,
}

impl Prompt {
    pub(crate) fn new(client: ChatClient) -> Self {
        Self {
            client,
            system: None,
            user: None,
            params: HashMap::new(),
            messages: Vec::new(),
            conversation_id: None,
            options: ChatOptions::default(),
            tools: ToolRegistry::new(),
            advisors: AdvisorChain::new(),
            cancel: None,
            format_instructions: None,
        }
    }

    /// Overrides the client's default system prompt.
    pub fn system(mut self, text: impl Into<String>) -> Self {
        self.system = Some(text.into());
        self
    }

    pub fn user(mut self, text: impl Into<String>) -> Self {
        self.user = Some(text.into());
        self
    }

    /// Value for a `{key}` placeholder in the system or user text.
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    /// Extra messages placed after the system prompt and before the user text.
    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn conversation_id(mut self, id: impl Into<ConversationId>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    /// Per-call options; set values win over the client defaults.
    pub fn options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = self.tools.merged(&tools);
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn advisor(mut self, advisor: Arc<dyn Advisor>) -> Self {
        self.advisors.register(advisor);
        self
    }

    pub fn advisors(mut self, advisors: AdvisorChain) -> Self {
        self.advisors = self.advisors.merged(&advisors);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Run to a terminal response.
    pub async fn call(self) -> Result<ChatResponse> {
        let (request, tool_loop) = self.build()?;
        tool_loop.call(request).await
    }

    /// Run and return only the response text.
    pub async fn content(self) -> Result<String> {
        Ok(self.call().await?.message.content)
    }

    /// Run and parse the response text into `T`.
    pub async fn entity<T>(mut self) -> Result<T>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let converter = JsonOutputConverter::<T>::new();
        self.format_instructions = Some(converter.format_instructions());
        if self.options.response_format.is_none() {
            self.options.response_format = converter.response_format();
        }
        let response = self.call().await?;
        converter.parse(response.content())
    }

    /// Run lazily, yielding text fragments as they arrive.
    ///
    /// Build failures surface as the stream's first and only item.
    pub fn stream(self) -> TextStream {
        match self.build() {
            Ok((request, tool_loop)) => tool_loop.stream(request),
            Err(e) => Box::pin(futures::stream::once(async move { Err(e) })),
        }
    }

    fn build(self) -> Result<(ChatRequest, ToolLoop)> {
        let defaults = self.client.defaults();

        let mut messages = Vec::with_capacity(self.messages.len() + 2);
        if let Some(system) = self.system.as_deref().or(defaults.system_prompt.as_deref()) {
            messages.push(Message::system(render(system, &self.params)));
        }
        messages.extend(self.messages);

        let user = self.user.as_deref().map(|text| render(text, &self.params));
        // Instructions ride in the context so advisors see only the caller's text
        let (user, format) = match (user, self.format_instructions) {
            (None, Some(format)) => (Some(format), None),
            (user, format) => (user, format),
        };
        if let Some(user) = user {
            messages.push(Message::user(user));
        }

        if messages.is_empty() {
            return Err(Error::Config {
                message: "prompt has no messages".into(),
            });
        }

        let tools = defaults.tools.merged(&self.tools);
        let advisors = defaults.advisors.merged(&self.advisors);
        let mut request = ChatRequest::new(messages)
            .with_conversation_id(self.conversation_id)
            .with_options(self.options.merged_over(&defaults.options))
            .with_tools(tools.definitions());
        if let Some(format) = format {
            request = request.with_context(FORMAT_INSTRUCTIONS, Value::String(format));
        }

        let mut tool_loop = self.client.tool_loop().with_advisors(advisors).with_tools(tools);
        if let Some(cancel) = self.cancel {
            tool_loop = tool_loop.with_cancel_token(cancel);
        }
        Ok((request, tool_loop))
    }
}
