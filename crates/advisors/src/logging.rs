//! Request/response logging advisor.

use std::sync::Arc;

use async_trait::async_trait;
use spindle_core::Result;
use spindle_core::advisor::{Advisor, CallChain, StreamChain};
use spindle_core::provider::ChunkStream;
use spindle_core::request::{ChatRequest, ChatResponse};
use tracing::debug;

use crate::aggregate::aggregate;

type Formatter<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Logs every request and (aggregated) response through `tracing` at `debug`.
#[derive(Clone)]
pub struct SimpleLoggerAdvisor {
    order: i32,
    request_to_string: Formatter<ChatRequest>,
    response_to_string: Formatter<ChatResponse>,
}

fn default_request_to_string(request: &ChatRequest) -> String {
    serde_json::to_string(request).unwrap_or_else(|e| format!("<unserializable request: {e}>"))
}

fn default_response_to_string(response: &ChatResponse) -> String {
    serde_json::to_string_pretty(response).unwrap_or_else(|e| format!("<unserializable response: {e}>"))
}

impl Default for SimpleLoggerAdvisor {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SimpleLoggerAdvisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> SimpleLoggerAdvisorBuilder {
        SimpleLoggerAdvisorBuilder::default()
    }

    fn log_request(&self, request: &ChatRequest) {
        debug!(advisor = "SimpleLoggerAdvisor", "request: {}", (self.request_to_string)(request));
    }
}

#[async_trait]
impl Advisor for SimpleLoggerAdvisor {
    fn name(&self) -> &str {
        "SimpleLoggerAdvisor"
    }

    fn order(&self) -> i32 {
        self.order
    }

    async fn advise_call(&self, request: ChatRequest, next: CallChain<'_>) -> Result<ChatResponse> {
        self.log_request(&request);
        let response = next.next_call(request).await?;
        debug!(advisor = "SimpleLoggerAdvisor", "response: {}", (self.response_to_string)(&response));
        Ok(response)
    }

    async fn advise_stream(&self, request: ChatRequest, next: StreamChain<'_>) -> Result<ChunkStream> {
        self.log_request(&request);
        let stream = next.next_stream(request.clone()).await?;
        let format = self.response_to_string.clone();
        Ok(aggregate(&request, stream, move |response| {
            debug!(advisor = "SimpleLoggerAdvisor", "response: {}", format(&response));
            futures::future::ready(Ok(()))
        }))
    }
}

#[derive(Default)]
pub struct SimpleLoggerAdvisorBuilder {
    order: i32,
    request_to_string: Option<Formatter<ChatRequest>>,
    response_to_string: Option<Formatter<ChatResponse>>,
}

impl SimpleLoggerAdvisorBuilder {
    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn request_to_string(mut self, f: impl Fn(&ChatRequest) -> String + Send + Sync + 'static) -> Self {
        self.request_to_string = Some(Arc::new(f));
        self
    }

    pub fn response_to_string(mut self, f: impl Fn(&ChatResponse) -> String + Send + Sync + 'static) -> Self {
        self.response_to_string = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> SimpleLoggerAdvisor {
        SimpleLoggerAdvisor {
            order: self.order,
            request_to_string: self
                .request_to_string
                .unwrap_or_else(|| Arc::new(default_request_to_string)),
            response_to_string: self
                .response_to_string
                .unwrap_or_else(|| Arc::new(default_response_to_string)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::AdvisorChain;
    use crate::test_support::fragments_handler;
    use futures::StreamExt;
    use spindle_core::message::Message;
    use std::sync::Mutex;

    #[tokio::test]
    async fn formatters_see_request_and_aggregated_response() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let (req_log, resp_log) = (seen.clone(), seen.clone());
        let advisor = SimpleLoggerAdvisor::builder()
            .order(7)
            .request_to_string(move |r| {
                let line = format!("req:{}", r.user_text().unwrap_or_default());
                req_log.lock().unwrap().push(line.clone());
                line
            })
            .response_to_string(move |r| {
                let line = format!("resp:{}", r.content());
                resp_log.lock().unwrap().push(line.clone());
                line
            })
            .build();
        assert_eq!(advisor.order(), 7);

        let chain = AdvisorChain::new().with(Arc::new(advisor));
        let terminal = fragments_handler(&["Hel", "lo"]);

        chain
            .run_call(ChatRequest::new(vec![Message::user("ping")]), &terminal)
            .await
            .unwrap();

        let texts: Vec<_> = chain
            .run_stream(ChatRequest::new(vec![Message::user("pong")]), &terminal)
            .await
            .unwrap()
            .map(|c| c.unwrap().content.unwrap_or_default())
            .collect()
            .await;
        assert_eq!(texts, vec!["Hel", "lo"]);

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["req:ping", "resp:Hello", "req:pong", "resp:Hello"]
        );
    }

    #[test]
    fn default_formatters_emit_json() {
        let request = ChatRequest::new(vec![Message::user("hi")]);
        assert!(default_request_to_string(&request).contains("\"hi\""));
        let response = ChatResponse::text("there", "m");
        assert!(default_response_to_string(&response).contains("there"));
    }
}
