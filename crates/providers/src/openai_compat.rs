//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM, Together AI and any other
//! endpoint exposing `/chat/completions`.
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE)
//! - Tool use / function calling, with streamed tool-call deltas assembled
//! - Text to speech (`/audio/speech`) and image generation (`/images/generations`)

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use spindle_core::error::ProviderError;
use spindle_core::media::{ImageModel, ImageOptions, Media, SpeechModel, SpeechOptions, audio_mime_type};
use spindle_core::message::{Message, MessageToolCall, Role};
use spindle_core::provider::{
    ChunkStream, FinishReason, Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage,
};
use tracing::{debug, warn};

use crate::sse::SseDecoder;

const DEFAULT_SPEECH_MODEL: &str = "tts-1";
const DEFAULT_VOICE: &str = "alloy";
const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";

/// An OpenAI-compatible model backend.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    pub fn openai(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    pub fn ollama(base_url: Option<&str>) -> Result<Self, ProviderError> {
        Self::new("ollama", base_url.unwrap_or("http://localhost:11434/v1"), "ollama")
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                    Role::Tool => "tool".into(),
                },
                content: Some(m.content.clone()),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    /// The `/chat/completions` request body.
    fn chat_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });
        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(top_p) = request.top_p {
            body["top_p"] = serde_json::json!(top_p);
        }
        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }
        if !request.stop.is_empty() {
            body["stop"] = serde_json::json!(request.stop);
        }
        if let Some(format) = &request.response_format {
            body["response_format"] = format.clone();
        }
        body
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| network_error(&e))?;

        let status = response.status().as_u16();
        if response.status().is_success() {
            return Ok(response);
        }
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let error_body = response.text().await.unwrap_or_default();
        warn!(provider = %self.name, status, body = %error_body, "Provider returned error");
        Err(status_error(status, retry_after, error_body))
    }
}

fn network_error(e: &reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Map a non-success HTTP status to a provider error.
fn status_error(status: u16, retry_after: Option<u64>, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(5),
        },
        401 | 403 => ProviderError::AuthenticationFailed(if body.is_empty() {
            "Invalid API key or insufficient permissions".into()
        } else {
            body
        }),
        404 => ProviderError::ModelNotFound(body),
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

fn parse_response(api_response: ApiResponse) -> Result<ProviderResponse, ProviderError> {
    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::ApiError {
            status_code: 200,
            message: "No choices in response".into(),
        })?;

    let tool_calls: Vec<MessageToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| MessageToolCall {
            id: tc.id,
            name: tc.function.name,
            arguments: tc.function.arguments,
        })
        .collect();

    let finish_reason = match choice.finish_reason.as_deref() {
        Some(reason) => FinishReason::parse(reason),
        None if !tool_calls.is_empty() => FinishReason::ToolCalls,
        None => FinishReason::Stop,
    };

    Ok(ProviderResponse {
        message: Message::assistant_tool_calls(choice.message.content.unwrap_or_default(), tool_calls),
        usage: api_response.usage.map(Usage::from),
        model: api_response.model,
        finish_reason,
        metadata: serde_json::Map::new(),
    })
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        debug!(provider = %self.name, model = %request.model, "Sending completion request");
        let response = self
            .post("/chat/completions", &Self::chat_body(&request, false))
            .await?;

        let api_response: ApiResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;
        parse_response(api_response)
    }

    /// Lazy: the body is read only as the returned stream is polled, and
    /// dropping the stream closes the connection.
    async fn stream(&self, request: ProviderRequest) -> Result<ChunkStream, ProviderError> {
        debug!(provider = %self.name, model = %request.model, "Sending streaming request");
        let response = self
            .post("/chat/completions", &Self::chat_body(&request, true))
            .await?;
        let mut body = response.bytes_stream();

        Ok(Box::pin(async_stream::stream! {
            let mut decoder = SseDecoder::default();
            while let Some(next) = body.next().await {
                match next {
                    Ok(bytes) => {
                        for chunk in decoder.feed(&bytes) {
                            yield Ok(chunk);
                        }
                        if decoder.is_finished() {
                            break;
                        }
                    }
                    Err(e) => {
                        yield Err(ProviderError::StreamInterrupted(e.to_string()));
                        return;
                    }
                }
            }
            yield Ok(decoder.finish());
        }))
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| network_error(&e))?;

        Ok(response.status().is_success())
    }
}

#[async_trait]
impl SpeechModel for OpenAiCompatProvider {
    async fn speak(&self, text: &str, options: &SpeechOptions) -> Result<Media, ProviderError> {
        let format = options.format.as_deref().unwrap_or("mp3");
        let mut body = serde_json::json!({
            "model": options.model.as_deref().unwrap_or(DEFAULT_SPEECH_MODEL),
            "input": text,
            "voice": options.voice.as_deref().unwrap_or(DEFAULT_VOICE),
            "response_format": format,
        });
        if let Some(speed) = options.speed {
            body["speed"] = serde_json::json!(speed);
        }

        debug!(provider = %self.name, chars = text.len(), "Sending speech request");
        let response = self.post("/audio/speech", &body).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::StreamInterrupted(e.to_string()))?;
        Ok(Media::bytes(audio_mime_type(format), bytes.to_vec()))
    }
}

#[async_trait]
impl ImageModel for OpenAiCompatProvider {
    async fn generate_image(&self, prompt: &str, options: &ImageOptions) -> Result<Media, ProviderError> {
        let mut body = serde_json::json!({
            "model": options.model.as_deref().unwrap_or(DEFAULT_IMAGE_MODEL),
            "prompt": prompt,
            "n": options.n.unwrap_or(1),
        });
        if let Some(size) = &options.size {
            body["size"] = serde_json::json!(size);
        }
        if let Some(quality) = &options.quality {
            body["quality"] = serde_json::json!(quality);
        }

        debug!(provider = %self.name, chars = prompt.len(), "Sending image request");
        let response = self.post("/images/generations", &body).await?;
        let images: ImageResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse image response: {e}"),
        })?;
        parse_image(images)
    }
}

fn parse_image(images: ImageResponse) -> Result<Media, ProviderError> {
    let image = images.data.into_iter().next().ok_or_else(|| ProviderError::ApiError {
        status_code: 200,
        message: "No images in response".into(),
    })?;
    match (image.b64_json, image.url) {
        (Some(encoded), _) => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded.as_bytes())
                .map_err(|e| ProviderError::ApiError {
                    status_code: 200,
                    message: format!("Invalid base64 image: {e}"),
                })?;
            Ok(Media::bytes("image/png", bytes))
        }
        (None, Some(url)) => Ok(Media::url("image/png", url)),
        (None, None) => Err(ProviderError::ApiError {
            status_code: 200,
            message: "Image carries neither data nor url".into(),
        }),
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    url: Option<String>,
}
