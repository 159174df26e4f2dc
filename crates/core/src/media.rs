//! Speech and image generation models.
//!
//! Both are plain request/response adapters that sit next to the chat
//! [`crate::Provider`]; they do not pass through the advisor chain.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Generated media content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    /// MIME type (e.g., "audio/mpeg", "image/png")
    pub mime_type: String,

    pub data: MediaData,
}

/// Raw bytes or a URL where the provider hosts the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MediaData {
    Bytes(Vec<u8>),
    Url(String),
}

impl Media {
    pub fn bytes(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: MediaData::Bytes(bytes),
        }
    }

    pub fn url(mime_type: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: MediaData::Url(url.into()),
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.data {
            MediaData::Bytes(b) => Some(b),
            MediaData::Url(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Output audio format ("mp3", "wav", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// e.g. "1024x1024"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,

    /// Number of images; only the first is returned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
}

/// Text-to-speech backend.
#[async_trait]
pub trait SpeechModel: Send + Sync {
    async fn speak(&self, text: &str, options: &SpeechOptions) -> Result<Media, ProviderError>;
}

/// Prompt-to-image backend.
#[async_trait]
pub trait ImageModel: Send + Sync {
    async fn generate_image(&self, prompt: &str, options: &ImageOptions) -> Result<Media, ProviderError>;
}

/// MIME type for an audio format name.
pub fn audio_mime_type(format: &str) -> &'static str {
    match format {
        "wav" => "audio/wav",
        "opus" => "audio/opus",
        "aac" => "audio/aac",
        "flac" => "audio/flac",
        "pcm" => "audio/pcm",
        _ => "audio/mpeg",
    }
}
