//! File-based chat memory: persistent JSON-lines storage.
//!
//! Each line is one `{conversation_id, message}` record, in append order.
//! Records are loaded into memory on open; appends are written through as
//! new lines and `clear` rewrites the file.
//!
//! Storage location: `~/.spindle/memory.jsonl` unless configured.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use spindle_core::error::MemoryError;
use spindle_core::memory::ChatMemory;
use spindle_core::message::{ConversationId, Message};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
    conversation_id: ConversationId,
    message: Message,
}

/// A file-backed chat memory using JSONL (one record per line).
pub struct FileChatMemory {
    path: PathBuf,
    records: RwLock<Vec<Record>>,
}

impl FileChatMemory {
    /// Open the store at `path`, loading existing records.
    ///
    /// A missing file starts empty (it is created on first write).
    pub async fn open(path: PathBuf) -> Result<Self, MemoryError> {
        let records = Self::load_from_disk(&path).await?;
        debug!(path = %path.display(), count = records.len(), "File chat memory loaded");
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_from_disk(path: &Path) -> Result<Vec<Record>, MemoryError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(MemoryError::Storage(format!(
                    "Failed to read memory file {}: {e}",
                    path.display()
                )));
            }
        };

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<Record>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted memory record");
                    None
                }
            })
            .collect())
    }

    fn encode(records: &[Record]) -> Result<String, MemoryError> {
        let mut content = String::new();
        for record in records {
            let line = serde_json::to_string(record).map_err(|e| {
                MemoryError::Storage(format!("Failed to serialize memory record: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }
        Ok(content)
    }

    async fn ensure_parent(&self) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MemoryError::Storage(format!("Failed to create memory directory: {e}"))
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl ChatMemory for FileChatMemory {
    fn name(&self) -> &str {
        "file"
    }

    async fn append(&self, conversation: &ConversationId, messages: Vec<Message>) -> Result<(), MemoryError> {
        if messages.is_empty() {
            return Ok(());
        }
        let new_records: Vec<Record> = messages
            .into_iter()
            .map(|message| Record {
                conversation_id: conversation.clone(),
                message,
            })
            .collect();
        let content = Self::encode(&new_records)?;

        // Hold the write lock across the file write so lines land in lock order.
        let mut records = self.records.write().await;
        self.ensure_parent().await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open memory file: {e}")))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to write memory file: {e}")))?;
        file.flush()
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to flush memory file: {e}")))?;

        records.extend(new_records);
        Ok(())
    }

    async fn load(&self, conversation: &ConversationId) -> Result<Vec<Message>, MemoryError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| &r.conversation_id == conversation)
            .map(|r| r.message.clone())
            .collect())
    }

    async fn clear(&self, conversation: &ConversationId) -> Result<(), MemoryError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| &r.conversation_id != conversation);
        if records.len() == before {
            return Ok(());
        }

        self.ensure_parent().await?;
        let content = Self::encode(&records)?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to write memory file: {e}")))?;
        Ok(())
    }

    async fn conversation_ids(&self) -> Result<Vec<ConversationId>, MemoryError> {
        let records = self.records.read().await;
        let mut ids: Vec<ConversationId> = Vec::new();
        for record in records.iter() {
            if !ids.contains(&record.conversation_id) {
                ids.push(record.conversation_id.clone());
            }
        }
        Ok(ids)
    }
}
