//! `ChatClient`: long-lived defaults shared by every prompt.

use std::sync::Arc;
use std::time::Duration;

use spindle_advisors::AdvisorChain;
use spindle_config::{AppConfig, PipelineConfig};
use spindle_core::advisor::Advisor;
use spindle_core::event::EventBus;
use spindle_core::media::{ImageModel, ImageOptions, Media, SpeechModel, SpeechOptions};
use spindle_core::provider::{ChatOptions, Provider};
use spindle_core::tool::ToolRegistry;
use spindle_core::{Error, Result};
use tracing::debug;

use crate::loop_runner::ToolLoop;
use crate::prompt::Prompt;

pub(crate) struct ClientInner {
    pub(crate) provider: Arc<dyn Provider>,
    pub(crate) default_model: String,
    pub(crate) options: ChatOptions,
    pub(crate) system_prompt: Option<String>,
    pub(crate) advisors: AdvisorChain,
    pub(crate) tools: ToolRegistry,
    pub(crate) pipeline: PipelineConfig,
    speech: Option<Arc<dyn SpeechModel>>,
    speech_options: SpeechOptions,
    image: Option<Arc<dyn ImageModel>>,
    image_options: ImageOptions,
    events: Option<Arc<EventBus>>,
}

/// Entry point of the pipeline. Cheap to clone.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<ClientInner>,
}

impl ChatClient {
    pub fn builder(provider: Arc<dyn Provider>) -> ChatClientBuilder {
        ChatClientBuilder::new(provider)
    }

    /// Start a new logical call.
    pub fn prompt(&self) -> Prompt {
        Prompt::new(self.clone())
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.inner.provider
    }

    pub fn default_model(&self) -> &str {
        &self.inner.default_model
    }

    pub fn advisors(&self) -> &AdvisorChain {
        &self.inner.advisors
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.inner.tools
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.inner.pipeline
    }

    pub(crate) fn defaults(&self) -> &ClientInner {
        &self.inner
    }

    pub(crate) fn tool_loop(&self) -> ToolLoop {
        ToolLoop::new(self.inner.provider.clone(), self.inner.default_model.clone())
            .with_max_rounds(self.inner.pipeline.max_tool_rounds)
            .with_timeout(self.inner.pipeline.call_timeout())
            .with_events(self.inner.events.clone())
    }

    /// Text to speech with the client's default speech options.
    pub async fn speak(&self, text: &str) -> Result<Media> {
        self.speak_with(text, &SpeechOptions::default()).await
    }

    /// Text to speech; unset fields fall back to the client defaults.
    pub async fn speak_with(&self, text: &str, options: &SpeechOptions) -> Result<Media> {
        let model = self.inner.speech.as_ref().ok_or_else(|| Error::Config {
            message: "no speech model configured".into(),
        })?;
        let defaults = &self.inner.speech_options;
        let options = SpeechOptions {
            model: options.model.clone().or_else(|| defaults.model.clone()),
            voice: options.voice.clone().or_else(|| defaults.voice.clone()),
            format: options.format.clone().or_else(|| defaults.format.clone()),
            speed: options.speed.or(defaults.speed),
        };
        debug!(chars = text.len(), voice = ?options.voice, "Generating speech");
        Ok(model.speak(text, &options).await?)
    }

    pub async fn generate_image(&self, prompt: &str) -> Result<Media> {
        self.generate_image_with(prompt, &ImageOptions::default()).await
    }

    pub async fn generate_image_with(&self, prompt: &str, options: &ImageOptions) -> Result<Media> {
        let model = self.inner.image.as_ref().ok_or_else(|| Error::Config {
            message: "no image model configured".into(),
        })?;
        let defaults = &self.inner.image_options;
        let options = ImageOptions {
            model: options.model.clone().or_else(|| defaults.model.clone()),
            size: options.size.clone().or_else(|| defaults.size.clone()),
            quality: options.quality.clone().or_else(|| defaults.quality.clone()),
            n: options.n.or(defaults.n),
        };
        debug!(chars = prompt.len(), model = ?options.model, "Generating image");
        Ok(model.generate_image(prompt, &options).await?)
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("provider", &self.inner.provider.name())
            .field("default_model", &self.inner.default_model)
            .field("advisors", &self.inner.advisors.names())
            .field("tools", &self.inner.tools.names())
            .finish()
    }
}

pub struct ChatClientBuilder {
    provider: Arc<dyn Provider>,
    default_model: String,
    options: ChatOptions,
    system_prompt: Option<String>,
    advisors: AdvisorChain,
    tools: ToolRegistry,
    pipeline: PipelineConfig,
    speech: Option<Arc<dyn SpeechModel>>,
    speech_options: SpeechOptions,
    image: Option<Arc<dyn ImageModel>>,
    image_options: ImageOptions,
    events: Option<Arc<EventBus>>,
}

impl ChatClientBuilder {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            default_model: "gpt-4o-mini".into(),
            options: ChatOptions::default(),
            system_prompt: None,
            advisors: AdvisorChain::new(),
            tools: ToolRegistry::new(),
            pipeline: PipelineConfig::default(),
            speech: None,
            speech_options: SpeechOptions::default(),
            image: None,
            image_options: ImageOptions::default(),
            events: None,
        }
    }

    /// Model, sampling defaults, system prompt, pipeline limits and media
    /// defaults from the application config.
    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.default_model = config.default_model.clone();
        self.options = ChatOptions::default()
            .temperature(config.default_temperature)
            .max_tokens(config.default_max_tokens);
        self.system_prompt = config.system_prompt.clone();
        self.pipeline = config.pipeline.clone();
        self.speech_options.model = Some(config.media.speech_model.clone());
        self.speech_options.voice = Some(config.media.voice.clone());
        self.image_options.model = Some(config.media.image_model.clone());
        self
    }

    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn default_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn default_system(mut self, text: impl Into<String>) -> Self {
        self.system_prompt = Some(text.into());
        self
    }

    pub fn default_advisor(mut self, advisor: Arc<dyn Advisor>) -> Self {
        self.advisors.register(advisor);
        self
    }

    pub fn default_advisors(mut self, advisors: AdvisorChain) -> Self {
        self.advisors = self.advisors.merged(&advisors);
        self
    }

    pub fn default_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = self.tools.merged(&tools);
        self
    }

    pub fn max_tool_rounds(mut self, rounds: u32) -> Self {
        self.pipeline.max_tool_rounds = rounds;
        self
    }

    /// Rounded up to whole seconds.
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        self.pipeline.call_timeout_secs = secs.max(1);
        self
    }

    pub fn speech_model(mut self, model: Arc<dyn SpeechModel>) -> Self {
        self.speech = Some(model);
        self
    }

    pub fn speech_options(mut self, options: SpeechOptions) -> Self {
        self.speech_options = options;
        self
    }

    pub fn image_model(mut self, model: Arc<dyn ImageModel>) -> Self {
        self.image = Some(model);
        self
    }

    pub fn image_options(mut self, options: ImageOptions) -> Self {
        self.image_options = options;
        self
    }

    pub fn event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> ChatClient {
        debug!(
            provider = self.provider.name(),
            model = %self.default_model,
            advisors = self.advisors.len(),
            tools = self.tools.len(),
            "Chat client built"
        );
        ChatClient {
            inner: Arc::new(ClientInner {
                provider: self.provider,
                default_model: self.default_model,
                options: self.options,
                system_prompt: self.system_prompt,
                advisors: self.advisors,
                tools: self.tools,
                pipeline: self.pipeline,
                speech: self.speech,
                speech_options: self.speech_options,
                image: self.image,
                image_options: self.image_options,
                events: self.events,
            }),
        }
    }
}
