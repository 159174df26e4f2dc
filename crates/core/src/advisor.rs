//! Advisor trait: ordered interceptors around every model interaction.
//!
//! Advisors compose as nested scopes (onion middleware): each one receives
//! the request plus a continuation representing the rest of the chain,
//! including the terminal provider call. An advisor may forward the request
//! unchanged, forward a modified copy, short-circuit with its own response,
//! or post-process what the continuation returns.
//!
//! ```text
//!  order -10        order 0         order 10        terminal
//!  ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//!  │ before   │───▶│ before   │───▶│ before   │───▶│ provider │
//!  │ after  ◀─│────│ after  ◀─│────│ after  ◀─│────│          │
//!  └──────────┘    └──────────┘    └──────────┘    └──────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::provider::ChunkStream;
use crate::request::{ChatRequest, ChatResponse};

/// The innermost blocking stage of a chain (usually the provider call).
#[async_trait]
pub trait CallHandler: Send + Sync {
    async fn call(&self, request: ChatRequest) -> Result<ChatResponse>;
}

/// The innermost streaming stage of a chain.
#[async_trait]
pub trait StreamHandler: Send + Sync {
    async fn stream(&self, request: ChatRequest) -> Result<ChunkStream>;
}

/// An ordered interceptor.
///
/// Both `advise_*` methods default to forwarding unchanged, so an advisor
/// that has nothing to do for streaming calls only overrides `advise_call`.
///
/// Streaming advisors that need the complete response must aggregate the
/// fragments, run their post-call logic once after the final fragment and
/// re-emit the original fragments unchanged.
#[async_trait]
pub trait Advisor: Send + Sync {
    /// Name used in logs and [`crate::Error::ChainAborted`].
    fn name(&self) -> &str;

    /// Lower runs first on the way in and last on the way out.
    fn order(&self) -> i32 {
        0
    }

    async fn advise_call(&self, request: ChatRequest, next: CallChain<'_>) -> Result<ChatResponse> {
        next.next_call(request).await
    }

    async fn advise_stream(&self, request: ChatRequest, next: StreamChain<'_>) -> Result<ChunkStream> {
        next.next_stream(request).await
    }
}

/// Continuation for the blocking path: the advisors still to run plus the terminal.
#[derive(Clone, Copy)]
pub struct CallChain<'a> {
    advisors: &'a [Arc<dyn Advisor>],
    terminal: &'a dyn CallHandler,
}

impl<'a> CallChain<'a> {
    /// `advisors` must already be in execution order.
    pub fn new(advisors: &'a [Arc<dyn Advisor>], terminal: &'a dyn CallHandler) -> Self {
        Self { advisors, terminal }
    }

    /// Run the rest of the chain.
    pub async fn next_call(self, request: ChatRequest) -> Result<ChatResponse> {
        match self.advisors.split_first() {
            Some((head, rest)) => {
                head.advise_call(request, CallChain::new(rest, self.terminal))
                    .await
            }
            None => self.terminal.call(request).await,
        }
    }

    /// Advisors left before the terminal.
    pub fn remaining(&self) -> usize {
        self.advisors.len()
    }
}

/// Continuation for the streaming path.
#[derive(Clone, Copy)]
pub struct StreamChain<'a> {
    advisors: &'a [Arc<dyn Advisor>],
    terminal: &'a dyn StreamHandler,
}

impl<'a> StreamChain<'a> {
    pub fn new(advisors: &'a [Arc<dyn Advisor>], terminal: &'a dyn StreamHandler) -> Self {
        Self { advisors, terminal }
    }

    pub async fn next_stream(self, request: ChatRequest) -> Result<ChunkStream> {
        match self.advisors.split_first() {
            Some((head, rest)) => {
                head.advise_stream(request, StreamChain::new(rest, self.terminal))
                    .await
            }
            None => self.terminal.stream(request).await,
        }
    }

    pub fn remaining(&self) -> usize {
        self.advisors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use std::sync::Mutex;

    struct Echo;

    #[async_trait]
    impl CallHandler for Echo {
        async fn call(&self, request: ChatRequest) -> Result<ChatResponse> {
            let text = request.user_text().unwrap_or_default().to_string();
            Ok(ChatResponse::text(text, "echo"))
        }
    }

    struct Suffix {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Advisor for Suffix {
        fn name(&self) -> &str {
            self.tag
        }

        async fn advise_call(&self, request: ChatRequest, next: CallChain<'_>) -> Result<ChatResponse> {
            self.log.lock().unwrap().push(format!("{}:before", self.tag));
            let request = request.map_user_text(|t| format!("{t}+{}", self.tag));
            let response = next.next_call(request).await?;
            self.log.lock().unwrap().push(format!("{}:after", self.tag));
            Ok(response)
        }
    }

    struct Passive;

    impl Advisor for Passive {
        fn name(&self) -> &str {
            "passive"
        }
    }

    #[tokio::test]
    async fn chain_nests_advisors() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let advisors: Vec<Arc<dyn Advisor>> = vec![
            Arc::new(Suffix { tag: "a", log: log.clone() }),
            Arc::new(Suffix { tag: "b", log: log.clone() }),
        ];
        let chain = CallChain::new(&advisors, &Echo);
        assert_eq!(chain.remaining(), 2);

        let response = chain.next_call(ChatRequest::new(vec![Message::user("x")])).await.unwrap();
        assert_eq!(response.content(), "x+a+b");
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:before", "b:before", "b:after", "a:after"]
        );
    }

    #[tokio::test]
    async fn default_methods_forward_unchanged() {
        let advisors: Vec<Arc<dyn Advisor>> = vec![Arc::new(Passive)];
        let response = CallChain::new(&advisors, &Echo)
            .next_call(ChatRequest::new(vec![Message::user("same")]))
            .await
            .unwrap();
        assert_eq!(response.content(), "same");
    }
}
