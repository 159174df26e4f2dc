//! Error types for the Spindle domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant; pipeline-level failures
//! (chain aborts, round limits, parse failures) live on the top-level enum.

use thiserror::Error;

/// The top-level error type for all Spindle operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Advisor chain ---
    #[error("Advisor chain aborted by '{advisor}': {reason}")]
    ChainAborted { advisor: String, reason: String },

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool loop ---
    #[error("Tool round limit exceeded: the model requested more than {max_rounds} tool rounds")]
    ToolRoundLimitExceeded { max_rounds: u32 },

    // --- Structured output ---
    #[error("Failed to parse structured output as {target}: {reason}")]
    StructuredOutputParse { target: String, reason: String },

    // --- Lifecycle ---
    #[error("Call timed out after {timeout_secs}s")]
    CallTimedOut { timeout_secs: u64 },

    #[error("Call was cancelled")]
    Cancelled,

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a [`Error::ChainAborted`] for the named advisor.
    pub fn aborted(advisor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ChainAborted {
            advisor: advisor.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    /// An advisor's end-of-stream work failed after the last fragment.
    #[error("Stream completion failed: {0}")]
    Completion(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupted record: {0}")]
    Corrupted(String),
}

/// Errors raised *inside* a tool handler.
///
/// The dispatcher never lets these escape: they are converted into an
/// error-tagged [`crate::tool::ToolResult`] and handed back to the model.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}
