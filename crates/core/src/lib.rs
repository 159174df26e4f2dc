//! # Spindle Core
//!
//! Domain types and traits for the Spindle advisor pipeline. Every other
//! crate depends on this one; it has no knowledge of concrete backends.
//!
//! ## Bounded Contexts
//!
//! - **Messages**: roles, messages, conversation ids
//! - **Provider**: the model backend adapter and its wire types
//! - **Request**: the request/response values advisors transform
//! - **Advisor**: ordered interceptors and their continuations
//! - **Tool**: tool trait, registry and dispatcher
//! - **Memory**: conversation history storage
//! - **Media**: speech and image generation
//! - **Event**: pipeline events for observers
//! - **Template**: `{key}` placeholder rendering

pub mod advisor;
pub mod error;
pub mod event;
pub mod media;
pub mod memory;
pub mod message;
pub mod provider;
pub mod request;
pub mod template;
pub mod tool;

pub use advisor::{Advisor, CallChain, CallHandler, StreamChain, StreamHandler};
pub use error::{Error, MemoryError, ProviderError, Result, ToolError};
pub use event::{EventBus, PipelineEvent};
pub use media::{ImageModel, ImageOptions, Media, MediaData, SpeechModel, SpeechOptions};
pub use memory::{ChatMemory, DEFAULT_CONVERSATION_ID};
pub use message::{ConversationId, Message, MessageToolCall, Role};
pub use provider::{
    ChatOptions, ChunkStream, FinishReason, Provider, ProviderRequest, ProviderResponse,
    StreamChunk, ToolDefinition, Usage,
};
pub use request::{ChatRequest, ChatResponse, FragmentAggregator};
pub use tool::{FnTool, Tool, ToolCall, ToolRegistry, ToolResult};
