//! The chat client: the entry point of the Spindle pipeline.
//!
//! A logical call goes through these states:
//!
//! 1. **Building**: the prompt is assembled into a `ChatRequest`
//!    (system + user text with `{param}` substitution, merged options,
//!    tools and advisors)
//! 2. **Calling**: the advisor chain runs around one provider call
//! 3. **ToolRound**: the model asked for tools: dispatch them, append the
//!    results and go back to **Calling**
//! 4. **Terminal**: the model answered; the caller gets the response,
//!    its text, a parsed entity, or a stream of text fragments
//!
//! Any error (chain abort, backend failure, round ceiling, timeout,
//! cancellation, parse failure) ends the call in **Failed**.

pub mod client;
pub mod evaluation;
pub mod loop_runner;
pub mod prompt;
pub mod structured;

pub use client::{ChatClient, ChatClientBuilder};
pub use evaluation::{EvaluationRequest, EvaluationResponse, FactCheckingEvaluator, RelevancyEvaluator};
pub use loop_runner::{TextStream, ToolLoop};
pub use prompt::Prompt;
pub use structured::JsonOutputConverter;
pub use tokio_util::sync::CancellationToken;
