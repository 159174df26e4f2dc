//! The tool-calling loop.
//!
//! An explicit, iterative state machine with a round counter:
//! `Calling → (ToolRound → Calling)* → Terminal | Failed`.
//!
//! Every round re-runs the whole advisor chain on the loop's *base request*
//! (what the caller built plus the messages of completed tool rounds), so
//! per-round advisor transformations such as history injection never
//! accumulate across rounds.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde_json::Value;
use spindle_advisors::AdvisorChain;
use spindle_core::advisor::{CallHandler, StreamHandler};
use spindle_core::event::{EventBus, PipelineEvent};
use spindle_core::message::Message;
use spindle_core::provider::{ChunkStream, Provider, ProviderRequest, Usage};
use spindle_core::request::{ChatRequest, ChatResponse, FragmentAggregator};
use spindle_core::tool::ToolRegistry;
use spindle_core::{Error, Result};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Text fragments of a streamed call, in arrival order.
pub type TextStream = BoxStream<'static, Result<String>>;

/// Context key for output-format instructions appended to the user turn
/// just before the provider call.
pub(crate) const FORMAT_INSTRUCTIONS: &str = "format_instructions";

/// The innermost stage of every chain: one provider invocation.
struct ProviderTerminal {
    provider: Arc<dyn Provider>,
    default_model: String,
}

impl ProviderTerminal {
    fn wire_request(&self, mut request: ChatRequest, stream: bool) -> (ProviderRequest, ChatRequest) {
        if let Some(Value::String(format)) = request.context.remove(FORMAT_INSTRUCTIONS) {
            request = request.map_user_text(|text| format!("{text}\n\n{format}"));
        }
        (request.to_provider_request(&self.default_model, stream), request)
    }
}

#[async_trait]
impl CallHandler for ProviderTerminal {
    async fn call(&self, request: ChatRequest) -> Result<ChatResponse> {
        let (wire, request) = self.wire_request(request, false);
        let response = self.provider.complete(wire).await?;
        Ok(ChatResponse::from_provider(response, request.context))
    }
}

#[async_trait]
impl StreamHandler for ProviderTerminal {
    async fn stream(&self, request: ChatRequest) -> Result<ChunkStream> {
        let (wire, _) = self.wire_request(request, true);
        Ok(self.provider.stream(wire).await?)
    }
}

/// Drives one logical call through zero or more tool rounds.
#[derive(Clone)]
pub struct ToolLoop {
    provider: Arc<dyn Provider>,
    default_model: String,
    advisors: AdvisorChain,
    tools: ToolRegistry,
    max_rounds: u32,
    timeout: Duration,
    cancel: CancellationToken,
    events: Option<Arc<EventBus>>,
}

impl ToolLoop {
    pub fn new(provider: Arc<dyn Provider>, default_model: impl Into<String>) -> Self {
        Self {
            provider,
            default_model: default_model.into(),
            advisors: AdvisorChain::new(),
            tools: ToolRegistry::new(),
            max_rounds: 10,
            timeout: Duration::from_secs(120),
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    pub fn with_advisors(mut self, advisors: AdvisorChain) -> Self {
        self.advisors = advisors;
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Maximum tool rounds; one more tool-call response fails the call.
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Deadline for the whole logical call, tool rounds included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, events: Option<Arc<EventBus>>) -> Self {
        self.events = events;
        self
    }

    fn terminal(&self) -> ProviderTerminal {
        ProviderTerminal {
            provider: self.provider.clone(),
            default_model: self.default_model.clone(),
        }
    }

    /// Run to a terminal response.
    pub async fn call(&self, request: ChatRequest) -> Result<ChatResponse> {
        info!(
            conversation_id = ?request.conversation_id,
            advisors = self.advisors.len(),
            tools = request.tools.len(),
            "Starting call"
        );
        let deadline = Instant::now() + self.timeout;
        let outcome = self.guarded(deadline, self.run_rounds(request)).await;
        if let Err(e) = &outcome {
            self.report(e);
        }
        outcome
    }

    async fn run_rounds(&self, request: ChatRequest) -> Result<ChatResponse> {
        let terminal = self.terminal();
        let mut base = request;
        let mut rounds = 0u32;
        let mut usage: Option<Usage> = None;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            debug!(round = rounds, messages = base.messages.len(), "Calling model");

            let response = self.advisors.run_call(base.clone(), &terminal).await?;
            usage = add_usage(usage, response.usage);

            if !response.is_tool_call() {
                return Ok(self.finish(response, rounds, usage, &base, false));
            }
            rounds += 1;
            self.check_ceiling(rounds)?;
            base = self.tool_round(base, &response, rounds).await;
        }
    }

    /// Run lazily, forwarding text fragments as they arrive.
    ///
    /// Nothing happens until the stream is polled. Dropping the stream stops
    /// consumption and no further rounds are attempted.
    pub fn stream(self, request: ChatRequest) -> TextStream {
        let deadline = Instant::now() + self.timeout;

        Box::pin(async_stream::stream! {
            info!(conversation_id = ?request.conversation_id, "Starting streamed call");
            let terminal = self.terminal();
            let model = request.options.model.clone().unwrap_or_else(|| self.default_model.clone());
            let mut base = request;
            let mut rounds = 0u32;
            let mut usage: Option<Usage> = None;

            loop {
                debug!(round = rounds, messages = base.messages.len(), "Streaming from model");
                let mut fragments = match self
                    .guarded(deadline, self.advisors.run_stream(base.clone(), &terminal))
                    .await
                {
                    Ok(fragments) => fragments,
                    Err(e) => {
                        self.report(&e);
                        yield Err(e);
                        return;
                    }
                };

                let mut aggregator = FragmentAggregator::new(model.clone());
                loop {
                    match self.guarded(deadline, async { Ok(fragments.next().await) }).await {
                        Ok(Some(Ok(chunk))) => {
                            aggregator.push(&chunk);
                            if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
                                yield Ok(text);
                            }
                        }
                        Ok(Some(Err(e))) => {
                            let e = Error::Provider(e);
                            self.report(&e);
                            yield Err(e);
                            return;
                        }
                        Ok(None) => break,
                        Err(e) => {
                            self.report(&e);
                            yield Err(e);
                            return;
                        }
                    }
                }
                drop(fragments);

                let mut context = base.context.clone();
                context.remove(FORMAT_INSTRUCTIONS);
                let response = aggregator.finish(context);
                usage = add_usage(usage, response.usage);
                if !response.is_tool_call() {
                    self.finish(response, rounds, usage, &base, true);
                    return;
                }

                rounds += 1;
                if let Err(e) = self.check_ceiling(rounds) {
                    self.report(&e);
                    yield Err(e);
                    return;
                }
                base = match self
                    .guarded(deadline, async { Ok(self.tool_round(base, &response, rounds).await) })
                    .await
                {
                    Ok(next) => next,
                    Err(e) => {
                        self.report(&e);
                        yield Err(e);
                        return;
                    }
                };
            }
        })
    }

    /// Race `fut` against cancellation and the call deadline.
    async fn guarded<T>(&self, deadline: Instant, fut: impl Future<Output = Result<T>>) -> Result<T> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            outcome = tokio::time::timeout_at(deadline, fut) => outcome.unwrap_or(Err(Error::CallTimedOut {
                timeout_secs: self.timeout.as_secs(),
            })),
        }
    }

    fn check_ceiling(&self, rounds: u32) -> Result<()> {
        if rounds > self.max_rounds {
            warn!(max_rounds = self.max_rounds, "Tool round ceiling exceeded");
            return Err(Error::ToolRoundLimitExceeded {
                max_rounds: self.max_rounds,
            });
        }
        Ok(())
    }

    /// Dispatch every requested call and append the round to the base request.
    async fn tool_round(&self, mut base: ChatRequest, response: &ChatResponse, round: u32) -> ChatRequest {
        let calls = response.tool_calls().to_vec();
        debug!(round, calls = calls.len(), "Dispatching tool round");

        let results = self.tools.dispatch_all(&calls).await;
        for (call, result) in calls.iter().zip(&results) {
            self.publish(PipelineEvent::ToolExecuted {
                tool_name: call.name.clone(),
                success: result.success,
                timestamp: Utc::now(),
            });
        }

        base.messages.push(Message::assistant_tool_calls(response.content(), calls));
        base.messages.extend(
            results
                .into_iter()
                .map(|result| Message::tool_result(result.call_id, result.output)),
        );

        self.publish(PipelineEvent::ToolRoundCompleted {
            round,
            calls: response.tool_calls().len(),
            timestamp: Utc::now(),
        });
        base
    }

    fn finish(
        &self,
        mut response: ChatResponse,
        rounds: u32,
        usage: Option<Usage>,
        base: &ChatRequest,
        streamed: bool,
    ) -> ChatResponse {
        response.usage = usage;
        response
            .metadata
            .insert("tool_rounds".into(), serde_json::json!(rounds));
        info!(
            conversation_id = ?base.conversation_id,
            rounds,
            tokens = usage.map(|u| u.total_tokens).unwrap_or(0),
            "Call finished"
        );
        self.publish(PipelineEvent::ResponseGenerated {
            conversation_id: base.conversation_id.as_ref().map(|id| id.to_string()),
            model: response.model.clone(),
            tokens_used: usage.map(|u| u.total_tokens).unwrap_or(0),
            tool_rounds: rounds,
            streamed,
            timestamp: Utc::now(),
        });
        response
    }

    fn report(&self, error: &Error) {
        warn!(error = %error, "Call failed");
        self.publish(PipelineEvent::ErrorOccurred {
            context: "tool_loop".into(),
            error_message: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn publish(&self, event: PipelineEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

fn add_usage(total: Option<Usage>, round: Option<Usage>) -> Option<Usage> {
    match (total, round) {
        (Some(total), Some(round)) => Some(total.add(round)),
        (total, round) => total.or(round),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_is_summed_across_rounds() {
        let a = Usage { prompt_tokens: 1, completion_tokens: 2, total_tokens: 3 };
        let b = Usage { prompt_tokens: 10, completion_tokens: 20, total_tokens: 30 };
        assert_eq!(add_usage(None, None), None);
        assert_eq!(add_usage(Some(a), None), Some(a));
        assert_eq!(add_usage(None, Some(b)), Some(b));
        assert_eq!(add_usage(Some(a), Some(b)).unwrap().total_tokens, 33);
    }
}
