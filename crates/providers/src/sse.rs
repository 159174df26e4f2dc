//! Server-sent events decoding for streamed chat completions.
//!
//! Bytes arrive in arbitrary slices; complete lines are decoded into
//! fragments. Text deltas are emitted as they arrive. Tool-call deltas are
//! accumulated by index and emitted, fully assembled, in the final fragment
//! together with usage and the finish reason.

use std::collections::BTreeMap;

use serde::Deserialize;
use spindle_core::message::MessageToolCall;
use spindle_core::provider::{FinishReason, StreamChunk, Usage};
use tracing::trace;

use crate::openai_compat::ApiUsage;

#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
    tool_calls: BTreeMap<u32, ToolCallAccumulator>,
    usage: Option<Usage>,
    finish_reason: Option<FinishReason>,
    finished: bool,
}

impl SseDecoder {
    /// Feed raw bytes; returns the fragments completed by them.
    pub(crate) fn feed(&mut self, bytes: &[u8]) -> Vec<StreamChunk> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();
        while !self.finished {
            let Some(end) = self.buffer.iter().position(|&b| b == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(chunk) = self.decode_line(line.trim_end_matches(['\n', '\r'])) {
                out.push(chunk);
            }
        }
        out
    }

    /// `[DONE]` was seen; later bytes are ignored.
    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    /// The closing fragment, emitted at `[DONE]` or when the body ends.
    pub(crate) fn finish(&mut self) -> StreamChunk {
        let tool_calls: Vec<MessageToolCall> = std::mem::take(&mut self.tool_calls)
            .into_values()
            .map(ToolCallAccumulator::into_tool_call)
            .collect();
        let finish_reason = self.finish_reason.take().or(if tool_calls.is_empty() {
            None
        } else {
            Some(FinishReason::ToolCalls)
        });
        StreamChunk {
            content: None,
            tool_calls,
            done: true,
            usage: self.usage.take(),
            finish_reason,
        }
    }

    fn decode_line(&mut self, line: &str) -> Option<StreamChunk> {
        // Blank separators and `: keep-alive` comments
        if line.is_empty() || line.starts_with(':') {
            return None;
        }
        let data = line.strip_prefix("data:")?.trim();
        if data == "[DONE]" {
            self.finished = true;
            return None;
        }

        let event: StreamResponse = match serde_json::from_str(data) {
            Ok(event) => event,
            Err(e) => {
                trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
                return None;
            }
        };

        if let Some(usage) = event.usage {
            self.usage = Some(usage.into());
        }
        let choice = event.choices.into_iter().next()?;
        if let Some(reason) = choice.finish_reason.as_deref() {
            self.finish_reason = Some(FinishReason::parse(reason));
        }
        for delta in choice.delta.tool_calls.unwrap_or_default() {
            let acc = self.tool_calls.entry(delta.index).or_default();
            if let Some(id) = delta.id {
                acc.id = id;
            }
            if let Some(function) = delta.function {
                if let Some(name) = function.name {
                    acc.name = name;
                }
                if let Some(arguments) = function.arguments {
                    acc.arguments.push_str(&arguments);
                }
            }
        }
        choice
            .delta
            .content
            .filter(|c| !c.is_empty())
            .map(StreamChunk::text)
    }
}

/// A single SSE `data: {...}` payload.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// Arrives incrementally across chunks; only the first carries the id.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn into_tool_call(self) -> MessageToolCall {
        MessageToolCall {
            id: self.id,
            name: self.name,
            arguments: self.arguments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: &[StreamChunk]) -> Vec<&str> {
        chunks.iter().filter_map(|c| c.content.as_deref()).collect()
    }

    #[test]
    fn content_deltas_become_fragments() {
        let mut decoder = SseDecoder::default();
        let chunks = decoder.feed(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"},\"finish_reason\":null}]}\n\n\
              data: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":null}]}\n\n",
        );
        assert_eq!(texts(&chunks), ["Hel", "lo"]);
        assert!(!decoder.is_finished());
    }

    #[test]
    fn lines_split_across_reads_are_reassembled() {
        let mut decoder = SseDecoder::default();
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"héllo\"}}]}\n".as_bytes();
        // Split inside the multi-byte character
        let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;
        assert!(decoder.feed(&line[..split]).is_empty());
        let chunks = decoder.feed(&line[split..]);
        assert_eq!(texts(&chunks), ["héllo"]);
    }

    #[test]
    fn comments_blank_lines_and_garbage_are_skipped() {
        let mut decoder = SseDecoder::default();
        let chunks = decoder.feed(b": keep-alive\r\n\r\nevent: ping\ndata: not json\n");
        assert!(chunks.is_empty());
    }

    #[test]
    fn tool_call_deltas_are_assembled_by_index() {
        let mut decoder = SseDecoder::default();
        decoder.feed(
            br#"data: {"choices":[{"delta":{"tool_calls":[{"index":1,"id":"call_b","function":{"name":"assign_task","arguments":""}},{"index":0,"id":"call_a","function":{"name":"create_task","arguments":"{\"title\""}}]}}]}
data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":":\"x\"}"}},{"index":1,"function":{"arguments":"{}"}}]}}]}
data: {"choices":[{"delta":{},"finish_reason":"tool_calls"}]}
"#,
        );
        let last = decoder.finish();
        assert!(last.done);
        assert_eq!(last.finish_reason, Some(FinishReason::ToolCalls));
        assert_eq!(last.tool_calls.len(), 2);
        assert_eq!(last.tool_calls[0].id, "call_a");
        assert_eq!(last.tool_calls[0].arguments, r#"{"title":"x"}"#);
        assert_eq!(last.tool_calls[1].name, "assign_task");
    }

    #[test]
    fn done_marker_stops_decoding_and_keeps_usage() {
        let mut decoder = SseDecoder::default();
        let chunks = decoder.feed(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"ok\"},\"finish_reason\":\"stop\"}]}\n\
              data: {\"choices\":[],\"usage\":{\"prompt_tokens\":10,\"completion_tokens\":5,\"total_tokens\":15}}\n\
              data: [DONE]\n\
              data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n",
        );
        assert_eq!(texts(&chunks), ["ok"]);
        assert!(decoder.is_finished());

        let last = decoder.finish();
        assert_eq!(last.usage.unwrap().total_tokens, 15);
        assert_eq!(last.finish_reason, Some(FinishReason::Stop));
        assert!(last.tool_calls.is_empty());
    }
}
