//! Configuration loading, validation, and management for Spindle.
//!
//! Loads configuration from `~/.spindle/config.toml` with environment
//! variable overrides. Validates all settings at load time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.spindle/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// System prompt applied when a call sets none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub advisors: AdvisorsConfig,

    #[serde(default)]
    pub media: MediaConfig,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("system_prompt", &self.system_prompt)
            .field("pipeline", &self.pipeline)
            .field("memory", &self.memory)
            .field("advisors", &self.advisors)
            .field("media", &self.media)
            .finish()
    }
}

/// Tool-loop limits applied to every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum tool rounds per logical call
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,

    /// Deadline for one logical call, in seconds
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

fn default_max_tool_rounds() -> u32 {
    10
}
fn default_call_timeout_secs() -> u64 {
    120
}

impl PipelineConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

/// Conversation memory backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "in_memory" or "file"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// JSONL file for the "file" backend (defaults to `~/.spindle/memory.jsonl`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Replay only this many of the most recent messages into each prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<usize>,
}

fn default_memory_backend() -> String {
    "in_memory".into()
}

const MEMORY_BACKENDS: &[&str] = &["in_memory", "file"];

impl MemoryConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("memory.jsonl"))
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            path: None,
            history_limit: None,
        }
    }
}

/// Built-in advisor switches and orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorsConfig {
    #[serde(default = "default_true")]
    pub logging: bool,

    #[serde(default)]
    pub logging_order: i32,

    #[serde(default = "default_memory_order")]
    pub memory_order: i32,

    /// Words that make the input guard refuse a request
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guard_sensitive_words: Vec<String>,
}

fn default_true() -> bool {
    true
}
fn default_memory_order() -> i32 {
    -1000
}

impl Default for AdvisorsConfig {
    fn default() -> Self {
        Self {
            logging: true,
            logging_order: 0,
            memory_order: default_memory_order(),
            guard_sensitive_words: Vec::new(),
        }
    }
}

/// Speech and image model names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_speech_model")]
    pub speech_model: String,

    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default = "default_image_model")]
    pub image_model: String,
}

fn default_speech_model() -> String {
    "tts-1".into()
}
fn default_voice() -> String {
    "alloy".into()
}
fn default_image_model() -> String {
    "dall-e-3".into()
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            speech_model: default_speech_model(),
            voice: default_voice(),
            image_model: default_image_model(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.spindle/config.toml).
    ///
    /// Environment overrides:
    /// - `SPINDLE_API_KEY`, then `OPENAI_API_KEY` (only when no key is configured)
    /// - `SPINDLE_MODEL`
    /// - `SPINDLE_BASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (injected for tests).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("SPINDLE_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(model) = lookup("SPINDLE_MODEL") {
            self.default_model = model;
        }
        if let Some(base_url) = lookup("SPINDLE_BASE_URL") {
            self.base_url = base_url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".spindle")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.pipeline.max_tool_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.max_tool_rounds must be at least 1".into(),
            ));
        }

        if self.pipeline.call_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.call_timeout_secs must be at least 1".into(),
            ));
        }

        if self.memory.history_limit == Some(0) {
            return Err(ConfigError::ValidationError(
                "memory.history_limit must be at least 1 when set".into(),
            ));
        }

        if !MEMORY_BACKENDS.contains(&self.memory.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown memory backend '{}' (expected one of: {})",
                self.memory.backend,
                MEMORY_BACKENDS.join(", ")
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            system_prompt: None,
            pipeline: PipelineConfig::default(),
            memory: MemoryConfig::default(),
            advisors: AdvisorsConfig::default(),
            media: MediaConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
