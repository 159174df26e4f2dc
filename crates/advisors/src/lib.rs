//! # Spindle Advisors
//!
//! Assembles ordered advisor chains and ships the built-in advisors:
//!
//! - [`SimpleLoggerAdvisor`]: request/response logging at `debug`
//! - [`MessageChatMemoryAdvisor`]: conversation history injection and commit
//! - [`QuestionAnswerAdvisor`]: retrieval augmentation of the user turn
//! - [`SafeGuardAdvisor`]: prompt-injection stripping and refusal on sensitive words
//!
//! Advisors that need the complete streamed response wrap the downstream
//! stream with [`aggregate`].

pub mod aggregate;
pub mod chain;
pub mod guard;
pub mod logging;
pub mod memory;
pub mod retrieval;

#[cfg(test)]
pub(crate) mod test_support;

pub use aggregate::aggregate;
pub use chain::AdvisorChain;
pub use guard::SafeGuardAdvisor;
pub use logging::SimpleLoggerAdvisor;
pub use memory::MessageChatMemoryAdvisor;
pub use retrieval::{
    Document, DocumentRetriever, InMemoryDocumentStore, QA_RETRIEVED_DOCUMENTS, QuestionAnswerAdvisor,
};
