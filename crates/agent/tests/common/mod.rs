//! Scripted providers and helpers shared by the pipeline tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use spindle_core::error::ProviderError;
use spindle_core::message::{Message, MessageToolCall};
use spindle_core::provider::{
    ChunkStream, FinishReason, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage,
};

/// One scripted model turn.
#[derive(Clone)]
pub enum Scripted {
    Response(ProviderResponse),
    /// Streamed as-is; folded into one response for `complete`.
    Fragments(Vec<StreamChunk>),
    /// Streams the fragments, then fails.
    FragmentsThenError(Vec<StreamChunk>, ProviderError),
    Fail(ProviderError),
}

/// A provider that replays a script, one entry per invocation, and records
/// every request it receives.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ProviderRequest>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        })
    }

    /// Every invocation sleeps for `delay` before answering.
    pub fn slow(delay: Duration, script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    async fn next(&self, request: ProviderRequest) -> Scripted {
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
            Scripted::Fail(ProviderError::ApiError {
                status_code: 500,
                message: "script exhausted".into(),
            })
        })
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match self.next(request).await {
            Scripted::Response(response) => Ok(response),
            Scripted::Fragments(chunks) => Ok(fold(chunks)),
            Scripted::FragmentsThenError(_, error) | Scripted::Fail(error) => Err(error),
        }
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkStream, ProviderError> {
        match self.next(request).await {
            Scripted::Response(response) => Ok(Box::pin(futures::stream::iter([Ok::<_, ProviderError>(
                StreamChunk::from_response(response),
            )]))),
            Scripted::Fragments(chunks) => Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok::<_, ProviderError>)))),
            Scripted::FragmentsThenError(chunks, error) => Ok(Box::pin(futures::stream::iter(
                chunks.into_iter().map(Ok).chain([Err(error)]),
            ))),
            Scripted::Fail(error) => Err(error),
        }
    }
}

fn fold(chunks: Vec<StreamChunk>) -> ProviderResponse {
    let mut content = String::new();
    let mut tool_calls = Vec::new();
    let mut usage = None;
    for chunk in chunks {
        content.push_str(chunk.content.as_deref().unwrap_or_default());
        tool_calls.extend(chunk.tool_calls);
        usage = chunk.usage.or(usage);
    }
    let finish_reason = if tool_calls.is_empty() {
        FinishReason::Stop
    } else {
        FinishReason::ToolCalls
    };
    ProviderResponse {
        message: Message::assistant_tool_calls(content, tool_calls),
        usage,
        model: "mock-model".into(),
        finish_reason,
        metadata: serde_json::Map::new(),
    }
}

fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

/// A terminal text answer.
pub fn text(content: &str) -> Scripted {
    Scripted::Response(ProviderResponse {
        message: Message::assistant(content),
        usage: usage(),
        model: "mock-model".into(),
        finish_reason: FinishReason::Stop,
        metadata: serde_json::Map::new(),
    })
}

/// A tool-call response.
pub fn tool_calls(calls: Vec<MessageToolCall>) -> Scripted {
    Scripted::Response(ProviderResponse {
        message: Message::assistant_tool_calls("", calls),
        usage: usage(),
        model: "mock-model".into(),
        finish_reason: FinishReason::ToolCalls,
        metadata: serde_json::Map::new(),
    })
}

/// Streamed text fragments followed by a done marker.
pub fn fragments(parts: &[&str]) -> Scripted {
    let mut chunks: Vec<StreamChunk> = parts.iter().map(|p| StreamChunk::text(*p)).collect();
    chunks.push(StreamChunk {
        done: true,
        usage: usage(),
        ..StreamChunk::default()
    });
    Scripted::Fragments(chunks)
}

/// A streamed tool-call round: optional leading text, then the assembled calls.
pub fn streamed_tool_calls(lead: &str, calls: Vec<MessageToolCall>) -> Scripted {
    Scripted::Fragments(vec![
        StreamChunk::text(lead),
        StreamChunk {
            tool_calls: calls,
            done: true,
            finish_reason: Some(FinishReason::ToolCalls),
            ..StreamChunk::default()
        },
    ])
}

pub fn call(name: &str, args: serde_json::Value) -> MessageToolCall {
    call_with_id(&format!("call_{name}"), name, args)
}

pub fn call_with_id(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

pub fn create_task(title: &str, assignee: &str) -> MessageToolCall {
    call(
        "create_task",
        serde_json::json!({ "title": title, "description": "", "assignee": assignee }),
    )
}
