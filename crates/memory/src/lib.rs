//! Conversation memory store implementations for Spindle.

pub mod file_backend;
pub mod in_memory;

pub use file_backend::FileChatMemory;
pub use in_memory::InMemoryChatMemory;

use std::path::PathBuf;
use std::sync::Arc;

use spindle_core::ChatMemory;
use spindle_core::error::MemoryError;

/// Open the backend named `backend` ("in_memory" or "file").
pub async fn open(backend: &str, path: PathBuf) -> Result<Arc<dyn ChatMemory>, MemoryError> {
    match backend {
        "in_memory" => Ok(Arc::new(InMemoryChatMemory::new())),
        "file" => Ok(Arc::new(FileChatMemory::open(path).await?)),
        other => Err(MemoryError::Storage(format!("unknown memory backend: {other}"))),
    }
}
