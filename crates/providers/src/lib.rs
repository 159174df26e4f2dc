//! Model backend adapters for Spindle.
//!
//! [`OpenAiCompatProvider`] implements the chat [`spindle_core::Provider`]
//! trait plus the speech and image model traits against any
//! OpenAI-compatible endpoint.

pub mod openai_compat;
mod sse;

use std::sync::Arc;

use spindle_config::AppConfig;
use spindle_core::error::ProviderError;
use tracing::debug;

pub use openai_compat::OpenAiCompatProvider;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Build the provider described by the configuration.
///
/// Hosted endpoints need an API key; local ones (`localhost`, `127.0.0.1`)
/// may run without.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<OpenAiCompatProvider>, ProviderError> {
    let base_url = config.base_url.trim_end_matches('/');
    let api_key = config.api_key.clone().unwrap_or_default();
    if api_key.is_empty() && !is_local(base_url) {
        return Err(ProviderError::NotConfigured(
            "no API key; set api_key in config.toml, SPINDLE_API_KEY or OPENAI_API_KEY".into(),
        ));
    }

    let name = if base_url == OPENAI_BASE_URL { "openai" } else { "openai-compat" };
    debug!(provider = name, base_url, "Building provider from config");
    Ok(Arc::new(OpenAiCompatProvider::new(name, base_url, api_key)?))
}

fn is_local(base_url: &str) -> bool {
    let host = base_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(base_url);
    host.starts_with("localhost") || host.starts_with("127.0.0.1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_core::Provider;

    #[test]
    fn hosted_endpoint_requires_a_key() {
        let config = AppConfig::default();
        assert!(matches!(build_from_config(&config), Err(ProviderError::NotConfigured(_))));

        let config = AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        assert_eq!(build_from_config(&config).unwrap().name(), "openai");
    }

    #[test]
    fn local_endpoint_runs_without_a_key() {
        let config = AppConfig {
            base_url: "http://localhost:11434/v1".into(),
            ..AppConfig::default()
        };
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "openai-compat");
        assert_eq!(provider.base_url(), "http://localhost:11434/v1");
    }

    #[test]
    fn local_hosts_are_recognized() {
        assert!(is_local("http://127.0.0.1:8000/v1"));
        assert!(is_local("http://localhost:8080"));
        assert!(!is_local("https://api.together.xyz/v1"));
    }
}
