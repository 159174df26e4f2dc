//! Ordered advisor chains.
//!
//! A chain is an explicit list sorted ascending by order, stable on ties, plus
//! the composition in [`spindle_core::advisor`]. The orchestrator builds one
//! per call by layering per-call advisors over the client's defaults.

use std::sync::Arc;

use spindle_core::Result;
use spindle_core::advisor::{Advisor, CallChain, CallHandler, StreamChain, StreamHandler};
use spindle_core::provider::ChunkStream;
use spindle_core::request::{ChatRequest, ChatResponse};
use tracing::{debug, warn};

#[derive(Clone, Default)]
pub struct AdvisorChain {
    advisors: Vec<Arc<dyn Advisor>>,
    orders: Vec<i32>,
}

impl AdvisorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at the advisor's own order.
    pub fn register(&mut self, advisor: Arc<dyn Advisor>) {
        let order = advisor.order();
        self.register_with_order(advisor, order);
    }

    /// Insert at `order`, after any advisor already registered at the same order.
    pub fn register_with_order(&mut self, advisor: Arc<dyn Advisor>, order: i32) {
        if self.advisors.iter().any(|a| a.name() == advisor.name()) {
            warn!(advisor = %advisor.name(), "Advisor registered twice; both will run");
        }
        let position = self.orders.partition_point(|&o| o <= order);
        debug!(advisor = %advisor.name(), order, position, "Advisor registered");
        self.advisors.insert(position, advisor);
        self.orders.insert(position, order);
    }

    pub fn with(mut self, advisor: Arc<dyn Advisor>) -> Self {
        self.register(advisor);
        self
    }

    /// A copy of this chain with `other`'s advisors merged in by order.
    pub fn merged(&self, other: &AdvisorChain) -> AdvisorChain {
        let mut merged = self.clone();
        for (advisor, &order) in other.advisors.iter().zip(&other.orders) {
            merged.register_with_order(advisor.clone(), order);
        }
        merged
    }

    /// Advisor names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.advisors.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.advisors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.advisors.is_empty()
    }

    /// Run the blocking path: pre-call ascending, `terminal`, post-call descending.
    pub async fn run_call(&self, request: ChatRequest, terminal: &dyn CallHandler) -> Result<ChatResponse> {
        CallChain::new(&self.advisors, terminal).next_call(request).await
    }

    /// Run the streaming path with the same ordering.
    pub async fn run_stream(
        &self,
        request: ChatRequest,
        terminal: &dyn StreamHandler,
    ) -> Result<ChunkStream> {
        StreamChain::new(&self.advisors, terminal).next_stream(request).await
    }
}

impl std::fmt::Debug for AdvisorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.names().iter().zip(&self.orders))
            .finish()
    }
}
