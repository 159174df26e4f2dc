//! Tool trait, registry and dispatcher.
//!
//! Tools are named, schema-described functions the model may ask to run.
//! The registry maps names to tools; the dispatcher executes a requested
//! call and always hands back a [`ToolResult`]: a missing tool or a failing
//! handler becomes an error-tagged result the model can react to, never an
//! error that aborts the interaction.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::{BoxFuture, join_all};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::message::MessageToolCall;
use crate::provider::ToolDefinition;

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Decode the JSON-string arguments carried in an assistant message.
    pub fn from_message(call: &MessageToolCall) -> Result<Self, ToolError> {
        let arguments = if call.arguments.trim().is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&call.arguments)
                .map_err(|e| ToolError::InvalidArguments(format!("{}: {e}", call.name)))?
        };
        Ok(Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
        })
    }
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content (what the model sees)
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    /// A successful result carrying structured data, rendered as JSON for the model.
    pub fn json(data: serde_json::Value) -> Self {
        Self {
            call_id: String::new(),
            success: true,
            output: data.to_string(),
            data: Some(data),
        }
    }

    /// An error-tagged result.
    pub fn error(call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            success: false,
            output: message.into(),
            data: None,
        }
    }

    pub fn is_error(&self) -> bool {
        !self.success
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "create_task").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

type Handler =
    Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, Result<serde_json::Value, ToolError>> + Send + Sync>;

/// A tool built from a name, a schema and an async closure.
pub struct FnTool {
    name: String,
    description: String,
    schema: serde_json::Value,
    handler: Handler,
}

impl FnTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: serde_json::Value,
        handler: F,
    ) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.schema.clone()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let value = (self.handler)(arguments).await?;
        Ok(ToolResult::json(value))
    }
}

/// A registry of available tools.
///
/// Cloning is cheap (tools are shared behind `Arc`), which lets the
/// orchestrator merge per-call tools over its defaults.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            debug!(tool = %name, "Replaced previously registered tool");
        }
    }

    /// Register a closure-backed tool under `name`.
    pub fn register_fn<F, Fut>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        schema: serde_json::Value,
        handler: F,
    ) where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, ToolError>> + Send + 'static,
    {
        self.register(Arc::new(FnTool::new(name, description, schema, handler)));
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// A copy of this registry with `other`'s tools layered on top.
    pub fn merged(&self, other: &ToolRegistry) -> ToolRegistry {
        let mut merged = self.clone();
        for tool in other.tools.values() {
            merged.register(tool.clone());
        }
        merged
    }

    /// Tool definitions sorted by name (stable across calls).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute one tool call. Never fails: problems become error results.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!(tool = %call.name, "Model requested an unknown tool");
            return ToolResult::error(
                &call.id,
                format!("Error: {}", ToolError::NotFound(call.name.clone())),
            );
        };

        let start = Instant::now();
        let result = tool.execute(call.arguments.clone()).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(mut result) => {
                debug!(tool = %call.name, success = result.success, duration_ms, "Tool executed");
                result.call_id = call.id.clone();
                result
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, duration_ms, "Tool execution failed");
                ToolResult::error(&call.id, format!("Error: {e}"))
            }
        }
    }

    /// Dispatch a tool call exactly as it appears in an assistant message.
    pub async fn dispatch_message(&self, call: &MessageToolCall) -> ToolResult {
        match ToolCall::from_message(call) {
            Ok(call) => self.dispatch(&call).await,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Undecodable tool arguments");
                ToolResult::error(&call.id, format!("Error: {e}"))
            }
        }
    }

    /// Dispatch one round of calls concurrently.
    ///
    /// Results come back in the order of `calls`, after every call finished.
    pub async fn dispatch_all(&self, calls: &[MessageToolCall]) -> Vec<ToolResult> {
        join_all(calls.iter().map(|call| self.dispatch_message(call))).await
    }
}
