//! Scripted terminals and recording advisors for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use spindle_core::advisor::{Advisor, CallChain, CallHandler, StreamChain, StreamHandler};
use spindle_core::error::ProviderError;
use spindle_core::message::MessageToolCall;
use spindle_core::provider::{ChunkStream, StreamChunk};
use spindle_core::request::{ChatRequest, ChatResponse, FragmentAggregator};
use spindle_core::{Error, Result};

#[derive(Clone, Default)]
pub struct Recording(Arc<Mutex<Vec<String>>>);

impl Recording {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub struct RecordingAdvisor {
    name: String,
    order: i32,
    log: Recording,
    fail: bool,
}

impl RecordingAdvisor {
    pub fn new(name: &str, order: i32, log: &Recording) -> Self {
        Self { name: name.into(), order, log: log.clone(), fail: false }
    }

    pub fn failing(name: &str, order: i32, log: &Recording) -> Self {
        Self { fail: true, ..Self::new(name, order, log) }
    }
}

#[async_trait]
impl Advisor for RecordingAdvisor {
    fn name(&self) -> &str {
        &self.name
    }

    fn order(&self) -> i32 {
        self.order
    }

    async fn advise_call(&self, request: ChatRequest, next: CallChain<'_>) -> Result<ChatResponse> {
        self.log.push(format!("{}:pre", self.name));
        if self.fail {
            return Err(Error::aborted(&self.name, "boom"));
        }
        let response = next.next_call(request).await?;
        self.log.push(format!("{}:post", self.name));
        Ok(response)
    }

    async fn advise_stream(&self, request: ChatRequest, next: StreamChain<'_>) -> Result<ChunkStream> {
        self.log.push(format!("{}:stream", self.name));
        next.next_stream(request).await
    }
}

pub struct ShortCircuit {
    pub order: i32,
}

#[async_trait]
impl Advisor for ShortCircuit {
    fn name(&self) -> &str {
        "short_circuit"
    }

    fn order(&self) -> i32 {
        self.order
    }

    async fn advise_call(&self, _request: ChatRequest, _next: CallChain<'_>) -> Result<ChatResponse> {
        Ok(ChatResponse::text("short-circuited", "none"))
    }
}

/// Terminal that replays a fixed fragment script and records what it saw.
pub struct ScriptedTerminal {
    script: Vec<std::result::Result<StreamChunk, ProviderError>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<ChatRequest>>,
}

impl ScriptedTerminal {
    pub fn new(script: Vec<std::result::Result<StreamChunk, ProviderError>>) -> Self {
        Self { script, calls: AtomicUsize::new(0), seen: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<ChatRequest> {
        self.seen.lock().unwrap().clone()
    }

    fn record(&self, request: &ChatRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());
    }
}

#[async_trait]
impl CallHandler for ScriptedTerminal {
    async fn call(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.record(&request);
        let mut aggregator = FragmentAggregator::new("scripted");
        for item in &self.script {
            aggregator.push(item.as_ref().map_err(|e| Error::Provider(e.clone()))?);
        }
        Ok(aggregator.finish(request.context))
    }
}

#[async_trait]
impl StreamHandler for ScriptedTerminal {
    async fn stream(&self, request: ChatRequest) -> Result<ChunkStream> {
        self.record(&request);
        Ok(Box::pin(futures::stream::iter(self.script.clone())))
    }
}

/// One final fragment carrying `text`.
pub fn text_handler(text: &str) -> ScriptedTerminal {
    ScriptedTerminal::new(vec![Ok(StreamChunk { done: true, ..StreamChunk::text(text) })])
}

/// Several text fragments, the last one marked done.
pub fn fragments_handler(parts: &[&str]) -> ScriptedTerminal {
    let last = parts.len().saturating_sub(1);
    ScriptedTerminal::new(
        parts
            .iter()
            .enumerate()
            .map(|(i, p)| Ok(StreamChunk { done: i == last, ..StreamChunk::text(*p) }))
            .collect(),
    )
}

/// A response that asks for one tool call.
pub fn tool_call_handler(tool: &str) -> ScriptedTerminal {
    ScriptedTerminal::new(vec![Ok(StreamChunk {
        tool_calls: vec![MessageToolCall {
            id: "call_1".into(),
            name: tool.into(),
            arguments: "{}".into(),
        }],
        done: true,
        ..StreamChunk::default()
    })])
}
