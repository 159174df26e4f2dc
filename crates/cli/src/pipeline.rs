//! Assembles the chat client every command runs against.
//!
//! Conversation memory is not a client default: only `chat` names a
//! conversation, so it attaches [`Pipeline::memory_advisor`] per call and the
//! one-shot commands never read or extend a stored conversation.

use std::sync::Arc;

use spindle_advisors::{AdvisorChain, MessageChatMemoryAdvisor, SafeGuardAdvisor, SimpleLoggerAdvisor};
use spindle_agent::{ChatClient, ChatClientBuilder};
use spindle_config::AppConfig;
use spindle_core::{Advisor, ChatMemory, Provider};
use spindle_tools::TaskStore;
use tracing::debug;

pub struct Pipeline {
    pub client: ChatClient,
    pub memory_advisor: Arc<dyn Advisor>,
    pub tasks: Arc<TaskStore>,
}

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

pub async fn open_memory(config: &AppConfig) -> Result<Arc<dyn ChatMemory>, Box<dyn std::error::Error>> {
    Ok(spindle_memory::open(&config.memory.backend, config.memory.resolved_path()).await?)
}

/// The built-in advisors the config switches on for every call.
pub fn default_advisors(config: &AppConfig) -> spindle_core::Result<AdvisorChain> {
    let mut chain = AdvisorChain::new();
    if config.advisors.logging {
        chain.register(Arc::new(
            SimpleLoggerAdvisor::builder()
                .order(config.advisors.logging_order)
                .build(),
        ));
    }
    if !config.advisors.guard_sensitive_words.is_empty() {
        chain.register(Arc::new(SafeGuardAdvisor::new(&config.advisors.guard_sensitive_words)?));
    }
    Ok(chain)
}

pub fn memory_advisor(config: &AppConfig, memory: Arc<dyn ChatMemory>) -> Arc<dyn Advisor> {
    let mut advisor = MessageChatMemoryAdvisor::new(memory).with_order(config.advisors.memory_order);
    if let Some(limit) = config.memory.history_limit {
        advisor = advisor.with_history_limit(limit);
    }
    Arc::new(advisor)
}

/// Client defaults from config, without media models.
pub fn client_builder(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    tasks: Arc<TaskStore>,
) -> spindle_core::Result<ChatClientBuilder> {
    Ok(ChatClient::builder(provider)
        .with_config(config)
        .default_advisors(default_advisors(config)?)
        .default_tools(spindle_tools::default_registry(tasks)))
}

pub async fn build(config: &AppConfig) -> Result<Pipeline, Box<dyn std::error::Error>> {
    let provider = spindle_providers::build_from_config(config)?;
    let memory = open_memory(config).await?;
    let tasks = Arc::new(TaskStore::new());

    let client = client_builder(config, provider.clone(), tasks.clone())?
        .speech_model(provider.clone())
        .image_model(provider)
        .build();
    debug!(
        model = client.default_model(),
        advisors = ?client.advisors().names(),
        tools = client.tools().len(),
        "Pipeline assembled"
    );

    Ok(Pipeline {
        client,
        memory_advisor: memory_advisor(config, memory),
        tasks,
    })
}
